mod controller;
mod state;


use std::fmt;
use std::sync::Arc;

pub use controller::PhotoBooth;
pub use state::{BoothSnapshot, CaptureMode, PrintingState};

/// Callback run when the user asks to go back to the start of the experience
pub type RestartHook = Arc<dyn Fn() + Send + Sync>;

/// How the surrounding scene controller drives the booth
#[derive(Clone, Default)]
pub struct SceneHooks {
    /// Bypass the camera, print placeholder photos and save the test strip
    pub test_mode: bool,
    pub on_restart: Option<RestartHook>,
}

impl SceneHooks {
    pub fn new(test_mode: bool) -> Self {
        Self {
            test_mode,
            on_restart: None,
        }
    }

    pub fn with_restart<F>(mut self, on_restart: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_restart = Some(Arc::new(on_restart));
        self
    }
}

impl fmt::Debug for SceneHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneHooks")
            .field("test_mode", &self.test_mode)
            .field("on_restart", &self.on_restart.is_some())
            .finish()
    }
}
