use crate::camera::{CameraFault, SessionState};
use crate::capture::{SequencerPhase, SequencerState};
use crate::frame::{FrameVariant, PhotoSet};
use crate::strip::CompositeStrip;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which artifacts the booth is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureMode {
    /// Live preview with capture controls
    Camera,
    /// Cycling through the original photos
    PreviewNormal,
    /// Stylization in progress
    Processing,
    /// Cycling through the stylized photos
    PreviewPixel,
}

/// Progress of the printed-strip animation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintingState {
    Idle,
    Generating,
    Animating,
    Done,
}

/// The single record the controller mutates
#[derive(Debug)]
pub(crate) struct BoothState {
    /// Bumped on retake, restart and exit; stale tasks compare against it
    pub epoch: u64,
    pub mode: CaptureMode,
    pub printing: PrintingState,
    pub sequencer: SequencerState,
    pub photos: PhotoSet,
    pub preview_index: usize,
    pub generating_animation: bool,
    pub printed_strip: Option<Arc<CompositeStrip>>,
    pub exited: bool,
}

impl BoothState {
    pub fn new(max_photos: usize, countdown_from: u8) -> Self {
        Self {
            epoch: 0,
            mode: CaptureMode::Camera,
            printing: PrintingState::Idle,
            sequencer: SequencerState::new(max_photos, countdown_from),
            photos: PhotoSet::new(max_photos),
            preview_index: 0,
            generating_animation: false,
            printed_strip: None,
            exited: false,
        }
    }

    /// Throw away the set and everything derived from it
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.mode = CaptureMode::Camera;
        self.printing = PrintingState::Idle;
        self.sequencer = SequencerState::new(self.sequencer.max_photos, self.sequencer.countdown_from);
        self.photos.clear();
        self.preview_index = 0;
        self.generating_animation = false;
        self.printed_strip = None;
    }

    pub fn can_capture(&self, camera: &SessionState) -> bool {
        !self.exited
            && self.mode == CaptureMode::Camera
            && camera.is_ready()
            && self.sequencer.phase == SequencerPhase::Idle
            && !self.photos.is_full()
    }

    pub fn can_stylize(&self) -> bool {
        !self.exited && self.mode == CaptureMode::PreviewNormal && self.photos.is_full()
    }

    /// Retake is hidden while stylizing, while the strip prints and while a GIF is built
    pub fn can_retake(&self) -> bool {
        !self.exited
            && self.mode != CaptureMode::Processing
            && matches!(self.printing, PrintingState::Idle | PrintingState::Done)
            && !self.generating_animation
    }

    pub fn is_previewing(&self) -> bool {
        matches!(self.mode, CaptureMode::PreviewNormal | CaptureMode::PreviewPixel)
    }

    pub fn snapshot(&self, camera: SessionState, test_mode: bool) -> BoothSnapshot {
        let fault = match camera {
            SessionState::Error(fault) if self.mode == CaptureMode::Camera => Some(fault),
            _ => None,
        };

        BoothSnapshot {
            epoch: self.epoch,
            mode: self.mode,
            printing: self.printing,
            camera,
            countdown: self.sequencer.countdown(),
            photos: self.photos.len(),
            max_photos: self.photos.max_photos(),
            stylized: self.photos.stylized().is_some(),
            preview_index: self.preview_index,
            preview_variant: match self.mode {
                CaptureMode::PreviewPixel => Some(FrameVariant::Stylized),
                CaptureMode::PreviewNormal => Some(FrameVariant::Original),
                _ => None,
            },
            generating_animation: self.generating_animation,
            strip_printed: self.printed_strip.is_some(),
            error: fault.map(|f| f.message().to_string()),
            can_retry: !test_mode && fault.map(|f| f.is_retryable()).unwrap_or(false),
            capture_enabled: !test_mode && fault.is_none() && self.can_capture(&camera),
            controls_visible: matches!(self.printing, PrintingState::Idle | PrintingState::Done),
            test_mode,
        }
    }
}

/// Externally observable view of the booth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoothSnapshot {
    pub epoch: u64,
    pub mode: CaptureMode,
    pub printing: PrintingState,
    pub camera: SessionState,
    /// Value on screen while counting down
    pub countdown: Option<u8>,
    pub photos: usize,
    pub max_photos: usize,
    pub stylized: bool,
    pub preview_index: usize,
    pub preview_variant: Option<FrameVariant>,
    pub generating_animation: bool,
    pub strip_printed: bool,
    /// Camera problem shown to the user
    pub error: Option<String>,
    pub can_retry: bool,
    pub capture_enabled: bool,
    /// Download and retake controls are hidden while the strip prints
    pub controls_visible: bool,
    pub test_mode: bool,
}

impl BoothSnapshot {
    pub fn camera_fault(&self) -> Option<CameraFault> {
        match self.camera {
            SessionState::Error(fault) => Some(fault),
            _ => None,
        }
    }
}
