use serde::{Deserialize, Serialize};

/// Where the shot loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequencerPhase {
    Idle,
    /// Value currently on screen; 0 is the "cheese" beat right before the shot
    Countdown(u8),
    Snapshot,
    Complete,
}

/// Inputs to the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEvent {
    Trigger,
    Tick,
    SnapshotTaken,
    SnapshotSkipped,
    Reset,
}

/// What the driver must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEffect {
    /// The event did not apply in the current phase
    Ignored,
    CountdownStarted(u8),
    CountdownTick(u8),
    TakeSnapshot,
    /// Photo number `n` was appended and more are needed
    Captured(usize),
    /// Photo number `n` filled the set
    Completed(usize),
    Skipped,
    Reset,
}

/// Countdown-then-snapshot loop as a plain value with a pure transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerState {
    pub phase: SequencerPhase,
    pub captured: usize,
    pub max_photos: usize,
    pub countdown_from: u8,
}

impl SequencerState {
    pub fn new(max_photos: usize, countdown_from: u8) -> Self {
        Self {
            phase: SequencerPhase::Idle,
            captured: 0,
            max_photos,
            countdown_from,
        }
    }

    /// State for a set that was filled without going through the loop
    pub fn completed(max_photos: usize, countdown_from: u8) -> Self {
        Self {
            phase: SequencerPhase::Complete,
            captured: max_photos,
            max_photos,
            countdown_from,
        }
    }

    pub fn step(self, event: SequencerEvent) -> (Self, SequencerEffect) {
        use SequencerEffect as Fx;
        use SequencerPhase as P;

        match (self.phase, event) {
            (_, SequencerEvent::Reset) => (
                Self::new(self.max_photos, self.countdown_from),
                Fx::Reset,
            ),
            (P::Idle, SequencerEvent::Trigger) if self.captured < self.max_photos => (
                Self {
                    phase: P::Countdown(self.countdown_from),
                    ..self
                },
                Fx::CountdownStarted(self.countdown_from),
            ),
            (P::Countdown(0), SequencerEvent::Tick) => (
                Self {
                    phase: P::Snapshot,
                    ..self
                },
                Fx::TakeSnapshot,
            ),
            (P::Countdown(n), SequencerEvent::Tick) => (
                Self {
                    phase: P::Countdown(n - 1),
                    ..self
                },
                Fx::CountdownTick(n - 1),
            ),
            (P::Snapshot, SequencerEvent::SnapshotTaken) => {
                let captured = self.captured + 1;
                if captured >= self.max_photos {
                    (
                        Self {
                            phase: P::Complete,
                            captured,
                            ..self
                        },
                        Fx::Completed(captured),
                    )
                } else {
                    (
                        Self {
                            phase: P::Idle,
                            captured,
                            ..self
                        },
                        Fx::Captured(captured),
                    )
                }
            }
            (P::Snapshot, SequencerEvent::SnapshotSkipped) => (
                Self {
                    phase: P::Idle,
                    ..self
                },
                Fx::Skipped,
            ),
            _ => (self, Fx::Ignored),
        }
    }

    /// Value to show while counting down
    pub fn countdown(&self) -> Option<u8> {
        match self.phase {
            SequencerPhase::Countdown(n) => Some(n),
            _ => None,
        }
    }

    /// True from trigger until the snapshot resolves
    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            SequencerPhase::Countdown(_) | SequencerPhase::Snapshot
        )
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SequencerPhase::Complete
    }
}
