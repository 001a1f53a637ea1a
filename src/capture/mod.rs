mod placeholder;
mod sequencer;
mod snapshot;
#[cfg(test)]
mod tests;

pub use placeholder::{placeholder_frames, render_placeholder};
pub use sequencer::{SequencerEffect, SequencerEvent, SequencerPhase, SequencerState};
pub use snapshot::{square_mirrored, take_snapshot, SkipReason};
