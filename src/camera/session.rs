use super::backend::{CameraBackend, StreamConstraints, VideoStream};
use crate::config::{CameraConfig, FacingMode};
use crate::error::CameraError;
use crate::events::{BoothEvent, EventBus};
use crate::frame::FrameData;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Lifecycle of the camera hardware stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Requesting,
    Ready { width: u32, height: u32 },
    Error(CameraFault),
    Stopped,
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Requesting => write!(f, "requesting"),
            SessionState::Ready { width, height } => write!(f, "ready ({}x{})", width, height),
            SessionState::Error(fault) => write!(f, "error: {}", fault.message()),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a session ended up in the error state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraFault {
    /// Access was refused; a retry is offered
    Denied,
    /// No capture support; nothing to retry
    Unavailable,
    /// The stream opened but never produced a first frame
    StreamFailed,
}

impl CameraFault {
    /// Text shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            CameraFault::Denied => "Camera access denied.",
            CameraFault::Unavailable => "Camera not supported.",
            CameraFault::StreamFailed => "Camera stopped responding.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, CameraFault::Unavailable)
    }

    fn from_error(err: &CameraError) -> Self {
        match err {
            CameraError::Unavailable { .. } => CameraFault::Unavailable,
            CameraError::MetadataTimeout { .. } | CameraError::CaptureStream { .. } => {
                CameraFault::StreamFailed
            }
            _ => CameraFault::Denied,
        }
    }

    fn to_error(self) -> CameraError {
        match self {
            CameraFault::Denied => CameraError::Denied {
                details: self.message().to_string(),
            },
            CameraFault::Unavailable => CameraError::Unavailable {
                details: self.message().to_string(),
            },
            CameraFault::StreamFailed => CameraError::CaptureStream {
                details: self.message().to_string(),
            },
        }
    }
}

/// Sole owner of the camera hardware stream
pub struct CameraSession {
    backend: Arc<dyn CameraBackend>,
    config: CameraConfig,
    shared: Arc<SessionShared>,
}

struct SessionShared {
    // Held for the whole of an acquire so requests never overlap
    slot: Mutex<Option<Arc<dyn VideoStream>>>,
    // Bumped by every acquire and release; readiness only lands on the generation it was requested for
    generation: parking_lot::Mutex<u64>,
    state_tx: watch::Sender<SessionState>,
    event_bus: Option<Arc<EventBus>>,
}

impl SessionShared {
    fn publish(&self, state: SessionState) {
        self.state_tx.send_replace(state);
        debug!("Camera session state: {}", state);
        if let Some(bus) = &self.event_bus {
            bus.notify(BoothEvent::CameraStateChanged {
                state,
                timestamp: SystemTime::now(),
            });
        }
    }

    /// Start a new generation and publish its first state atomically
    fn advance(&self, state: SessionState) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.publish(state);
        *generation
    }

    /// Publish only if no acquire or release happened since `generation`
    fn publish_if_current(&self, generation: u64, state: SessionState) -> bool {
        let current = self.generation.lock();
        if *current != generation {
            return false;
        }
        self.publish(state);
        true
    }
}

impl CameraSession {
    pub fn new(backend: Arc<dyn CameraBackend>, config: CameraConfig) -> Self {
        Self::with_event_bus(backend, config, None)
    }

    pub fn with_event_bus(
        backend: Arc<dyn CameraBackend>,
        config: CameraConfig,
        event_bus: Option<Arc<EventBus>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Uninitialized);
        Self {
            backend,
            config,
            shared: Arc::new(SessionShared {
                slot: Mutex::new(None),
                generation: parking_lot::Mutex::new(0),
                state_tx,
                event_bus,
            }),
        }
    }

    /// Request the camera, replacing any stream held so far
    ///
    /// The preferred request asks for `facing` at the configured ideal size; if
    /// that fails an unconstrained request follows. Returns once a stream is
    /// assigned; readiness arrives later through [`CameraSession::wait_ready`].
    pub async fn acquire(&self, facing: FacingMode) -> Result<(), CameraError> {
        let mut slot = self.shared.slot.lock().await;

        let generation = self.shared.advance(SessionState::Requesting);
        if let Some(previous) = slot.take() {
            info!("Stopping camera stream {} before a new request", previous.id());
            previous.stop();
        }

        if !self.backend.is_supported() {
            let err = CameraError::Unavailable {
                details: format!("backend '{}' cannot capture video", self.backend.name()),
            };
            error!("Camera unavailable: {}", err);
            self.shared
                .publish_if_current(generation, SessionState::Error(CameraFault::Unavailable));
            return Err(err);
        }

        let preferred = StreamConstraints::preferred(facing, self.config.ideal_resolution);
        info!(
            "Requesting camera from '{}' ({:?}, ideal {}x{})",
            self.backend.name(),
            facing,
            self.config.ideal_resolution.0,
            self.config.ideal_resolution.1
        );

        let stream = match self.backend.open(&preferred).await {
            Ok(stream) => stream,
            Err(first) => {
                warn!("Preferred camera request failed ({}); retrying unconstrained", first);
                match self.backend.open(&StreamConstraints::unconstrained()).await {
                    Ok(stream) => stream,
                    Err(last) => {
                        let err = match last {
                            CameraError::Unavailable { .. } => last,
                            other => CameraError::Denied {
                                details: other.to_string(),
                            },
                        };
                        error!("Camera request failed: {}", err);
                        self.shared.publish_if_current(
                            generation,
                            SessionState::Error(CameraFault::from_error(&err)),
                        );
                        return Err(err);
                    }
                }
            }
        };

        if let Some(previous) = slot.take() {
            previous.stop();
        }
        let stream: Arc<dyn VideoStream> = Arc::from(stream);
        info!("Camera stream {} assigned; waiting for metadata", stream.id());
        *slot = Some(Arc::clone(&stream));
        drop(slot);

        self.spawn_readiness_watch(stream, generation);
        Ok(())
    }

    fn spawn_readiness_watch(&self, stream: Arc<dyn VideoStream>, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let timeout = self.config.ready_timeout();

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, stream.wait_for_metadata()).await {
                Ok(result) => result,
                Err(_) => Err(CameraError::MetadataTimeout { timeout }),
            };

            match outcome {
                Ok((width, height)) if width > 0 && height > 0 && stream.is_live() => {
                    if shared.publish_if_current(generation, SessionState::Ready { width, height }) {
                        info!("Camera stream {} ready ({}x{})", stream.id(), width, height);
                    } else {
                        debug!("Camera stream {} became ready after being superseded", stream.id());
                    }
                }
                Ok((width, height)) => {
                    debug!(
                        "Ignoring metadata {}x{} for camera stream {} (live: {})",
                        width,
                        height,
                        stream.id(),
                        stream.is_live()
                    );
                }
                Err(e) => {
                    if shared.publish_if_current(
                        generation,
                        SessionState::Error(CameraFault::from_error(&e)),
                    ) {
                        error!("Camera stream {} never became ready: {}", stream.id(), e);
                    }
                }
            }
        });
    }

    /// Stop the current stream, if any; safe to call any number of times
    pub async fn release(&self) {
        let mut slot = self.shared.slot.lock().await;
        self.release_locked(&mut slot);
    }

    /// Release only if `still_owner` holds once no acquire is in flight
    ///
    /// The check runs under the stream slot, so an acquire that starts after a
    /// failed check keeps its stream. Returns whether a release happened.
    pub async fn release_if(&self, still_owner: impl FnOnce() -> bool) -> bool {
        let mut slot = self.shared.slot.lock().await;
        if !still_owner() {
            debug!("Camera release skipped; the session changed hands");
            return false;
        }
        self.release_locked(&mut slot);
        true
    }

    fn release_locked(&self, slot: &mut Option<Arc<dyn VideoStream>>) {
        match slot.take() {
            Some(stream) => {
                self.shared.advance(SessionState::Stopped);
                stream.stop();
                info!("Camera stream {} released", stream.id());
            }
            None => {
                *self.shared.generation.lock() += 1;
                debug!("Camera release requested with no active stream");
            }
        }
    }

    /// Wait until the session is ready, failed, or stopped
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(u32, u32), CameraError> {
        let mut receiver = self.shared.state_tx.subscribe();
        let settled = tokio::time::timeout(
            timeout,
            receiver.wait_for(|state| {
                matches!(
                    state,
                    SessionState::Ready { .. } | SessionState::Error(_) | SessionState::Stopped
                )
            }),
        )
        .await
        .map_err(|_| CameraError::MetadataTimeout { timeout })?
        .map_err(|_| CameraError::CaptureStream {
            details: "camera session dropped".to_string(),
        })?;

        match *settled {
            SessionState::Ready { width, height } => Ok((width, height)),
            SessionState::Error(fault) => Err(fault.to_error()),
            _ => Err(CameraError::CaptureStream {
                details: "camera session stopped".to_string(),
            }),
        }
    }

    /// Latest live frame; `None` unless the session is ready
    pub async fn read_frame(&self) -> Option<FrameData> {
        if !self.state().is_ready() {
            return None;
        }
        let slot = self.shared.slot.lock().await;
        let stream = slot.as_ref()?;
        if !stream.is_live() {
            return None;
        }
        stream.current_frame()
    }

    pub fn state(&self) -> SessionState {
        *self.shared.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Identifier of the stream currently held, if any
    pub async fn active_stream_id(&self) -> Option<u64> {
        self.shared.slot.lock().await.as_ref().map(|s| s.id())
    }
}
