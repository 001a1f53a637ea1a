mod backend;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gstreamer;
mod session;
mod synthetic;
#[cfg(test)]
mod tests;

pub use backend::{create_backend, CameraBackend, StreamConstraints, UnsupportedBackend, VideoStream};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gstreamer::GstCameraBackend;
pub use session::{CameraFault, CameraSession, SessionState};
pub use synthetic::SyntheticCamera;
