use super::backend::{CameraBackend, StreamConstraints, VideoStream};
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Resolution used when a request carries no size preference
const DEFAULT_RESOLUTION: (u32, u32) = (640, 480);

/// Camera backend that renders a moving test pattern instead of reading hardware
pub struct SyntheticCamera {
    fps: u32,
    next_stream_id: AtomicU64,
    live_streams: Arc<AtomicUsize>,
}

impl SyntheticCamera {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            next_stream_id: AtomicU64::new(1),
            live_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Streams opened and not yet stopped
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraBackend for SyntheticCamera {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn is_supported(&self) -> bool {
        true
    }

    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        let id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        let (width, height) = constraints.ideal_resolution.unwrap_or(DEFAULT_RESOLUTION);

        info!(
            "Opening synthetic camera stream {} ({}x{} @ {}fps)",
            id, width, height, self.fps
        );

        let stream = SyntheticStream::start(id, width, height, self.fps, Arc::clone(&self.live_streams));
        Ok(Box::new(stream))
    }
}

struct SyntheticStream {
    id: u64,
    latest: Arc<Mutex<Option<FrameData>>>,
    metadata: watch::Receiver<Option<(u32, u32)>>,
    live: Arc<AtomicBool>,
    live_streams: Arc<AtomicUsize>,
    cancellation_token: CancellationToken,
}

impl SyntheticStream {
    fn start(id: u64, width: u32, height: u32, fps: u32, live_streams: Arc<AtomicUsize>) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let (metadata_tx, metadata) = watch::channel(None);
        let cancellation_token = CancellationToken::new();
        live_streams.fetch_add(1, Ordering::SeqCst);

        let task_latest = Arc::clone(&latest);
        let token = cancellation_token.clone();
        tokio::spawn(async move {
            let frame_interval = Duration::from_millis(1000 / fps as u64);
            let mut interval_timer = tokio::time::interval(frame_interval);
            let mut frame_id = 0u64;

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let image = render_test_pattern(width, height, frame_id);
                        *task_latest.lock() = Some(FrameData::from_rgb_image(frame_id, SystemTime::now(), image));
                        if frame_id == 0 {
                            let _ = metadata_tx.send(Some((width, height)));
                        }
                        trace!("Generated synthetic frame {} for stream {}", frame_id, id);
                        frame_id += 1;
                    }
                    _ = token.cancelled() => break,
                }
            }

            debug!("Synthetic stream {} loop stopped after {} frames", id, frame_id);
        });

        Self {
            id,
            latest,
            metadata,
            live: Arc::new(AtomicBool::new(true)),
            live_streams,
            cancellation_token,
        }
    }
}

#[async_trait]
impl VideoStream for SyntheticStream {
    fn id(&self) -> u64 {
        self.id
    }

    async fn wait_for_metadata(&self) -> Result<(u32, u32), CameraError> {
        let mut metadata = self.metadata.clone();
        let dims = metadata
            .wait_for(|m| m.is_some())
            .await
            .map_err(|_| CameraError::CaptureStream {
                details: format!("synthetic stream {} stopped before its first frame", self.id),
            })?;
        (*dims).ok_or_else(|| CameraError::CaptureStream {
            details: "missing dimensions".to_string(),
        })
    }

    fn current_frame(&self) -> Option<FrameData> {
        if !self.is_live() {
            return None;
        }
        self.latest.lock().clone()
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.cancellation_token.cancel();
            self.live_streams.fetch_sub(1, Ordering::SeqCst);
            debug!("Synthetic stream {} stopped", self.id);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Diagonal gradient with a bar that sweeps across as frames advance
fn render_test_pattern(width: u32, height: u32, frame_id: u64) -> RgbImage {
    let bar_x = ((frame_id * 8) % width.max(1) as u64) as u32;
    RgbImage::from_fn(width, height, |x, y| {
        if x.abs_diff(bar_x) < 6 {
            return Rgb([250, 250, 250]);
        }
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgb([r, g, 160])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_synthetic_stream_produces_frames() {
        let camera = SyntheticCamera::new(60);
        let stream = camera
            .open(&StreamConstraints::preferred(crate::config::FacingMode::User, (64, 48)))
            .await
            .unwrap();

        let dims = stream.wait_for_metadata().await.unwrap();
        assert_eq!(dims, (64, 48));

        let frame = stream.current_frame().unwrap();
        assert_eq!((frame.width, frame.height), (64, 48));
        assert!(frame.validate_size());
        assert_eq!(camera.live_streams(), 1);

        stream.stop();
        stream.stop();
        assert!(!stream.is_live());
        assert!(stream.current_frame().is_none());
        assert_eq!(camera.live_streams(), 0);
    }

    #[tokio::test]
    async fn test_unconstrained_uses_default_resolution() {
        let camera = SyntheticCamera::new(60);
        let stream = camera.open(&StreamConstraints::unconstrained()).await.unwrap();
        assert_eq!(stream.wait_for_metadata().await.unwrap(), DEFAULT_RESOLUTION);
        drop(stream);
        assert_eq!(camera.live_streams(), 0);
    }
}
