pub mod animation;
pub mod app;
pub mod booth;
pub mod camera;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod frame;
pub mod paint;
pub mod strip;
pub mod stylize;
pub mod typography;

pub use animation::{AnimatedArtifact, AnimationExporter};
pub use app::{BoothApp, ExitReason, KeyCommand};
pub use booth::{BoothSnapshot, CaptureMode, PhotoBooth, PrintingState, SceneHooks};
pub use camera::{CameraBackend, CameraFault, CameraSession, SessionState, SyntheticCamera, VideoStream};
pub use capture::{SequencerEffect, SequencerEvent, SequencerPhase, SequencerState};
pub use config::PhotoboothConfig;
pub use error::{CameraError, CompositionError, PhotoboothError, Result};
pub use events::{BoothEvent, EventBus};
pub use export::{ArtifactKind, DownloadReceipt, ExportAdapter};
pub use frame::{CapturedFrame, FrameData, FrameFormat, FrameVariant, PhotoSet, MAX_PHOTOS};
pub use strip::{CompositeStrip, StripCompositor, StripLayout};
pub use stylize::{pixelate, stylize_frame, stylize_set};
