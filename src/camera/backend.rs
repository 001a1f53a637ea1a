use crate::config::{CameraBackendKind, CameraConfig, FacingMode};
use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// What a stream request asks the hardware for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Option<FacingMode>,
    pub ideal_resolution: Option<(u32, u32)>,
}

impl StreamConstraints {
    /// Facing direction plus an ideal size
    pub fn preferred(facing: FacingMode, ideal_resolution: (u32, u32)) -> Self {
        Self {
            facing: Some(facing),
            ideal_resolution: Some(ideal_resolution),
        }
    }

    /// Any video at all
    pub fn unconstrained() -> Self {
        Self {
            facing: None,
            ideal_resolution: None,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.facing.is_none() && self.ideal_resolution.is_none()
    }
}

/// Source of camera streams
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Whether this platform can capture video at all
    fn is_supported(&self) -> bool;

    /// Request a stream matching the constraints
    async fn open(&self, constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// One open hardware stream
#[async_trait]
pub trait VideoStream: Send + Sync {
    /// Identifier unique within the backend that opened it
    fn id(&self) -> u64;

    /// Resolves once the first frame dimensions are known
    async fn wait_for_metadata(&self) -> Result<(u32, u32), CameraError>;

    /// Most recent frame, if the stream has produced one
    fn current_frame(&self) -> Option<FrameData>;

    /// Stop every track; calling twice is harmless
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Stand-in used when the configured backend is not compiled in
pub struct UnsupportedBackend {
    reason: String,
}

impl UnsupportedBackend {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CameraBackend for UnsupportedBackend {
    fn name(&self) -> &str {
        "unsupported"
    }

    fn is_supported(&self) -> bool {
        false
    }

    async fn open(&self, _constraints: &StreamConstraints) -> Result<Box<dyn VideoStream>, CameraError> {
        Err(CameraError::Unavailable {
            details: self.reason.clone(),
        })
    }
}

/// Build the backend named in the configuration
pub fn create_backend(config: &CameraConfig) -> Arc<dyn CameraBackend> {
    match config.backend {
        CameraBackendKind::Synthetic => Arc::new(super::SyntheticCamera::new(config.fps)),
        CameraBackendKind::Gstreamer => gstreamer_backend(config),
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn gstreamer_backend(config: &CameraConfig) -> Arc<dyn CameraBackend> {
    match super::gstreamer::GstCameraBackend::new(config.clone()) {
        Ok(backend) => Arc::new(backend),
        Err(e) => {
            warn!("GStreamer camera backend unavailable: {}", e);
            Arc::new(UnsupportedBackend::new(e.to_string()))
        }
    }
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn gstreamer_backend(_config: &CameraConfig) -> Arc<dyn CameraBackend> {
    warn!("GStreamer camera backend is only available on Linux with the camera feature");
    Arc::new(UnsupportedBackend::new(
        "built without the `camera` feature",
    ))
}
