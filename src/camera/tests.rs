use super::*;
use crate::config::{CameraConfig, FacingMode};
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Backend whose behavior each test can script
#[derive(Default)]
struct MockBackend {
    fail_preferred: bool,
    deny_all: bool,
    unsupported: bool,
    open_delay: Duration,
    opens: AtomicUsize,
    next_id: AtomicU64,
    live: Arc<AtomicUsize>,
}

impl MockBackend {
    fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if self.deny_all || (self.fail_preferred && !constraints.is_unconstrained()) {
            return Err(CameraError::Denied {
                details: "permission refused".to_string(),
            });
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            size: constraints.ideal_resolution.unwrap_or((320, 240)),
            live: AtomicBool::new(true),
            counter: Arc::clone(&self.live),
        }))
    }
}

struct MockStream {
    id: u64,
    size: (u32, u32),
    live: AtomicBool,
    counter: Arc<AtomicUsize>,
}

#[async_trait]
impl VideoStream for MockStream {
    fn id(&self) -> u64 {
        self.id
    }

    async fn wait_for_metadata(&self) -> Result<(u32, u32), CameraError> {
        Ok(self.size)
    }

    fn current_frame(&self) -> Option<FrameData> {
        let (width, height) = self.size;
        let data = vec![128u8; (width * height * 3) as usize];
        Some(FrameData::new(
            self.id,
            SystemTime::now(),
            data,
            width,
            height,
            crate::frame::FrameFormat::Rgb24,
        ))
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

fn test_config() -> CameraConfig {
    CameraConfig {
        ideal_resolution: (64, 64),
        ready_timeout_ms: 1000,
        ..CameraConfig::default()
    }
}

#[tokio::test]
async fn test_acquire_reaches_ready() {
    let backend = Arc::new(MockBackend::default());
    let session = CameraSession::new(backend.clone(), test_config());
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.acquire(FacingMode::User).await.unwrap();
    let dims = session.wait_ready(Duration::from_secs(1)).await.unwrap();
    assert_eq!(dims, (64, 64));
    assert_eq!(session.state(), SessionState::Ready { width: 64, height: 64 });

    let frame = session.read_frame().await.unwrap();
    assert_eq!((frame.width, frame.height), (64, 64));
    assert_eq!(backend.live_streams(), 1);
}

#[tokio::test]
async fn test_repeated_acquire_holds_one_stream() {
    let backend = Arc::new(MockBackend {
        open_delay: Duration::from_millis(20),
        ..MockBackend::default()
    });
    let session = Arc::new(CameraSession::new(backend.clone(), test_config()));

    let attempts: Vec<_> = (0..5)
        .map(|_| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.acquire(FacingMode::User).await })
        })
        .collect();
    for attempt in attempts {
        attempt.await.unwrap().unwrap();
    }

    assert_eq!(backend.opens.load(Ordering::SeqCst), 5);
    assert_eq!(backend.live_streams(), 1);
    session.wait_ready(Duration::from_secs(1)).await.unwrap();

    session.release().await;
    assert_eq!(backend.live_streams(), 0);
}

#[tokio::test]
async fn test_fallback_to_unconstrained() {
    let backend = Arc::new(MockBackend {
        fail_preferred: true,
        ..MockBackend::default()
    });
    let session = CameraSession::new(backend.clone(), test_config());

    session.acquire(FacingMode::Environment).await.unwrap();
    let dims = session.wait_ready(Duration::from_secs(1)).await.unwrap();
    assert_eq!(dims, (320, 240));
    assert_eq!(backend.opens.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_denied_when_both_requests_fail() {
    let backend = Arc::new(MockBackend {
        deny_all: true,
        ..MockBackend::default()
    });
    let session = CameraSession::new(backend.clone(), test_config());

    let err = session.acquire(FacingMode::User).await.unwrap_err();
    assert!(matches!(err, CameraError::Denied { .. }));
    assert!(err.is_retryable());
    assert_eq!(session.state(), SessionState::Error(CameraFault::Denied));
    assert!(session.read_frame().await.is_none());
    assert_eq!(backend.live_streams(), 0);
}

#[tokio::test]
async fn test_unsupported_backend_is_unavailable() {
    let session = CameraSession::new(
        Arc::new(UnsupportedBackend::new("no video devices")),
        test_config(),
    );

    let err = session.acquire(FacingMode::User).await.unwrap_err();
    assert!(matches!(err, CameraError::Unavailable { .. }));
    assert!(!err.is_retryable());
    assert_eq!(session.state(), SessionState::Error(CameraFault::Unavailable));
    assert!(!CameraFault::Unavailable.is_retryable());
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let backend = Arc::new(MockBackend::default());
    let session = CameraSession::new(backend.clone(), test_config());

    // Releasing before anything was acquired is a no-op
    session.release().await;
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.acquire(FacingMode::User).await.unwrap();
    session.wait_ready(Duration::from_secs(1)).await.unwrap();

    session.release().await;
    session.release().await;
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(backend.live_streams(), 0);
    assert!(session.active_stream_id().await.is_none());
    assert!(session.read_frame().await.is_none());
}

#[tokio::test]
async fn test_reacquire_after_release() {
    let backend = Arc::new(MockBackend::default());
    let session = CameraSession::new(backend.clone(), test_config());

    session.acquire(FacingMode::User).await.unwrap();
    session.wait_ready(Duration::from_secs(1)).await.unwrap();
    session.release().await;

    session.acquire(FacingMode::User).await.unwrap();
    session.wait_ready(Duration::from_secs(1)).await.unwrap();
    assert_eq!(backend.live_streams(), 1);
    assert_eq!(session.active_stream_id().await, Some(1));
}

#[tokio::test]
async fn test_synthetic_backend_from_config() {
    let config = CameraConfig {
        backend: crate::config::CameraBackendKind::Synthetic,
        fps: 60,
        ..test_config()
    };
    let session = CameraSession::new(create_backend(&config), config);

    session.acquire(FacingMode::User).await.unwrap();
    let dims = session.wait_ready(Duration::from_secs(2)).await.unwrap();
    assert_eq!(dims, (64, 64));
    assert!(session.read_frame().await.is_some());
    session.release().await;
}
