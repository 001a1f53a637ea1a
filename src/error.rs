use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoboothError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Export error: {details}")]
    Export { details: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl PhotoboothError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn export<S: Into<String>>(details: S) -> Self {
        Self::Export {
            details: details.into(),
        }
    }
}

/// Failures while acquiring or reading the camera stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// The user (or the platform on their behalf) refused access
    #[error("Camera access denied: {details}")]
    Denied { details: String },

    /// No capture hardware or capture support is present
    #[error("Camera not supported: {details}")]
    Unavailable { details: String },

    #[error("Camera configuration failed: {details}")]
    Configuration { details: String },

    #[error("Camera stream failed: {details}")]
    CaptureStream { details: String },

    #[error("Camera metadata did not arrive within {timeout:?}")]
    MetadataTimeout { timeout: Duration },
}

impl CameraError {
    /// Whether the user should be offered a manual retry
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CameraError::Unavailable { .. })
    }
}

/// Failures while composing a strip or encoding an animation
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("No frames to compose")]
    EmptyFrameSet,

    #[error("Frame {index} could not be decoded: {details}")]
    FrameDecode { index: usize, details: String },

    #[error("Frame decoding stalled: {loaded}/{total} frames loaded after {timeout_ms}ms")]
    FrameDecodeStall {
        loaded: usize,
        total: usize,
        timeout_ms: u64,
    },

    #[error("Encoding failed: {details}")]
    Encode { details: String },

    #[error("Frame set length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl CompositionError {
    pub fn encode<S: Into<String>>(details: S) -> Self {
        Self::Encode {
            details: details.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

pub type Result<T> = std::result::Result<T, PhotoboothError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_retryable() {
        assert!(CameraError::Denied {
            details: "refused".to_string()
        }
        .is_retryable());
        assert!(!CameraError::Unavailable {
            details: "no device".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_stall_error_display() {
        let err = CompositionError::FrameDecodeStall {
            loaded: 4,
            total: 6,
            timeout_ms: 1500,
        };
        let msg = err.to_string();
        assert!(msg.contains("4/6"));
        assert!(msg.contains("1500ms"));
    }

    #[test]
    fn test_wrapped_camera_error() {
        let err: PhotoboothError = CameraError::Unavailable {
            details: "no backend".to_string(),
        }
        .into();
        assert!(matches!(err, PhotoboothError::Camera(CameraError::Unavailable { .. })));
        assert!(err.to_string().contains("no backend"));
    }
}
