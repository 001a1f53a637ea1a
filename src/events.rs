use crate::booth::{CaptureMode, PrintingState};
use crate::camera::SessionState;
use crate::error::EventBusError;
use crate::frame::FrameVariant;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur while running the photobooth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BoothEvent {
    /// Camera session changed state
    CameraStateChanged {
        state: SessionState,
        timestamp: SystemTime,
    },
    /// Countdown moved to a new value
    CountdownTick { remaining: u8 },
    /// A photo was appended to the set
    PhotoCaptured { index: usize, total: usize },
    /// A snapshot was attempted but produced no frame
    SnapshotSkipped { reason: String },
    /// The set reached its bound and capture ended
    CaptureCompleted { count: usize },
    /// Visible capture mode changed
    ModeChanged { mode: CaptureMode },
    /// Printing animation advanced
    PrintingChanged { state: PrintingState },
    /// A stylized set finished
    StylizeCompleted { count: usize },
    /// An artifact was written for the user
    ArtifactExported {
        filename: String,
        variant: FrameVariant,
        bytes: usize,
    },
    /// The current set was discarded
    RetakeRequested { timestamp: SystemTime },
    /// The user asked to go back to the start of the experience
    RestartRequested { timestamp: SystemTime },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl BoothEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            BoothEvent::CameraStateChanged { state, .. } => format!("Camera {}", state),
            BoothEvent::CountdownTick { remaining } => {
                if *remaining == 0 {
                    "Cheese!".to_string()
                } else {
                    format!("Countdown: {}", remaining)
                }
            }
            BoothEvent::PhotoCaptured { index, total } => {
                format!("Photo {}/{} captured", index, total)
            }
            BoothEvent::SnapshotSkipped { reason } => format!("Snapshot skipped: {}", reason),
            BoothEvent::CaptureCompleted { count } => {
                format!("Capture completed with {} photos", count)
            }
            BoothEvent::ModeChanged { mode } => format!("Mode: {:?}", mode),
            BoothEvent::PrintingChanged { state } => format!("Printing: {:?}", state),
            BoothEvent::StylizeCompleted { count } => format!("{} photos pixelated", count),
            BoothEvent::ArtifactExported {
                filename, bytes, ..
            } => format!("Saved {} ({} bytes)", filename, bytes),
            BoothEvent::RetakeRequested { .. } => "Retake requested".to_string(),
            BoothEvent::RestartRequested { .. } => "Restart requested".to_string(),
            BoothEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            BoothEvent::CameraStateChanged { .. } => "camera_state_changed",
            BoothEvent::CountdownTick { .. } => "countdown_tick",
            BoothEvent::PhotoCaptured { .. } => "photo_captured",
            BoothEvent::SnapshotSkipped { .. } => "snapshot_skipped",
            BoothEvent::CaptureCompleted { .. } => "capture_completed",
            BoothEvent::ModeChanged { .. } => "mode_changed",
            BoothEvent::PrintingChanged { .. } => "printing_changed",
            BoothEvent::StylizeCompleted { .. } => "stylize_completed",
            BoothEvent::ArtifactExported { .. } => "artifact_exported",
            BoothEvent::RetakeRequested { .. } => "retake_requested",
            BoothEvent::RestartRequested { .. } => "restart_requested",
            BoothEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<BoothEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<BoothEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: BoothEvent) -> Result<usize, EventBusError> {
        if self.debug_logging {
            debug!("Publishing event: {}", event.description());
        }

        match &event {
            BoothEvent::PhotoCaptured { index, total } => {
                info!("Photo {}/{} captured", index, total);
            }
            BoothEvent::ArtifactExported { filename, bytes, .. } => {
                info!("Artifact exported: {} ({} bytes)", filename, bytes);
            }
            BoothEvent::SnapshotSkipped { reason } => {
                warn!("Snapshot skipped: {}", reason);
            }
            BoothEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => {
                if self.debug_logging {
                    debug!("Event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Publish without caring whether anyone is listening
    pub fn notify(&self, event: BoothEvent) {
        if let Err(e) = self.publish(event) {
            debug!("Event dropped: {}", e);
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
