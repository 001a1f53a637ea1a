use super::*;
use crate::frame::{FrameData, FrameFormat, FrameVariant, PhotoSet, CANONICAL_SIZE, MAX_PHOTOS};
use crate::typography::Fonts;
use image::{Rgba, RgbaImage};
use std::time::SystemTime;

fn run_to_snapshot(state: SequencerState) -> SequencerState {
    let (mut state, effect) = state.step(SequencerEvent::Trigger);
    assert_eq!(effect, SequencerEffect::CountdownStarted(3));
    for expected in [2, 1, 0] {
        let (next, effect) = state.step(SequencerEvent::Tick);
        assert_eq!(effect, SequencerEffect::CountdownTick(expected));
        state = next;
    }
    let (state, effect) = state.step(SequencerEvent::Tick);
    assert_eq!(effect, SequencerEffect::TakeSnapshot);
    assert_eq!(state.phase, SequencerPhase::Snapshot);
    state
}

#[test]
fn test_full_sequence_completes_at_max() {
    let mut state = SequencerState::new(MAX_PHOTOS, 3);
    for n in 1..=MAX_PHOTOS {
        let (next, effect) = run_to_snapshot(state).step(SequencerEvent::SnapshotTaken);
        if n < MAX_PHOTOS {
            assert_eq!(effect, SequencerEffect::Captured(n));
            assert_eq!(next.phase, SequencerPhase::Idle);
        } else {
            assert_eq!(effect, SequencerEffect::Completed(n));
            assert!(next.is_complete());
        }
        state = next;
    }
    assert_eq!(state.captured, MAX_PHOTOS);
}

#[test]
fn test_trigger_during_countdown_is_ignored() {
    let (state, _) = SequencerState::new(MAX_PHOTOS, 3).step(SequencerEvent::Trigger);
    let (state, _) = state.step(SequencerEvent::Tick);
    assert_eq!(state.countdown(), Some(2));

    let (after, effect) = state.step(SequencerEvent::Trigger);
    assert_eq!(effect, SequencerEffect::Ignored);
    assert_eq!(after, state);
    assert!(after.is_busy());
}

#[test]
fn test_trigger_when_full_is_ignored() {
    let full = SequencerState::completed(MAX_PHOTOS, 3);
    let (after, effect) = full.step(SequencerEvent::Trigger);
    assert_eq!(effect, SequencerEffect::Ignored);
    assert_eq!(after.captured, MAX_PHOTOS);
    assert_eq!(after.countdown(), None);
}

#[test]
fn test_skipped_snapshot_returns_to_idle_without_counting() {
    let state = run_to_snapshot(SequencerState::new(MAX_PHOTOS, 3));
    let (state, effect) = state.step(SequencerEvent::SnapshotSkipped);
    assert_eq!(effect, SequencerEffect::Skipped);
    assert_eq!(state.phase, SequencerPhase::Idle);
    assert_eq!(state.captured, 0);
}

#[test]
fn test_stray_events_are_ignored() {
    let idle = SequencerState::new(MAX_PHOTOS, 3);
    assert_eq!(idle.step(SequencerEvent::Tick).1, SequencerEffect::Ignored);
    assert_eq!(idle.step(SequencerEvent::SnapshotTaken).1, SequencerEffect::Ignored);
    assert_eq!(idle.step(SequencerEvent::SnapshotSkipped).1, SequencerEffect::Ignored);
}

#[test]
fn test_reset_from_any_phase() {
    let state = run_to_snapshot(SequencerState::new(MAX_PHOTOS, 3));
    let (state, effect) = state.step(SequencerEvent::Reset);
    assert_eq!(effect, SequencerEffect::Reset);
    assert_eq!(state, SequencerState::new(MAX_PHOTOS, 3));

    let (state, _) = SequencerState::completed(MAX_PHOTOS, 3).step(SequencerEvent::Reset);
    assert_eq!(state.captured, 0);
}

#[test]
fn test_zero_countdown_snaps_on_first_tick() {
    let (state, effect) = SequencerState::new(2, 0).step(SequencerEvent::Trigger);
    assert_eq!(effect, SequencerEffect::CountdownStarted(0));
    assert_eq!(state.step(SequencerEvent::Tick).1, SequencerEffect::TakeSnapshot);
}

#[test]
fn test_square_mirrored_crops_centre_and_flips() {
    // 6x4 image: the centre 4x4 square spans x 1..5; mark its left column red
    let mut source = RgbaImage::from_pixel(6, 4, Rgba([0, 0, 255, 255]));
    for y in 0..4 {
        source.put_pixel(1, y, Rgba([255, 0, 0, 255]));
        source.put_pixel(0, y, Rgba([0, 255, 0, 255]));
    }

    let square = square_mirrored(&source, 4).unwrap();
    assert_eq!(square.dimensions(), (4, 4));
    // Mirrored: the left edge of the crop is now on the right, the cropped-off column is gone
    assert_eq!(*square.get_pixel(3, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(*square.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
    assert!(square.pixels().all(|p| p[1] == 0));
}

#[test]
fn test_square_mirrored_rejects_empty() {
    assert!(square_mirrored(&RgbaImage::new(0, 10), 480).is_none());
}

#[test]
fn test_take_snapshot_from_live_frame() {
    let frame = FrameData::new(7, SystemTime::now(), vec![90u8; 64 * 48 * 3], 64, 48, FrameFormat::Rgb24);
    let captured = take_snapshot(Some(&frame), 1, CANONICAL_SIZE).unwrap();
    assert_eq!(captured.index, 1);
    assert_eq!(captured.size, CANONICAL_SIZE);
    assert_eq!(captured.variant, FrameVariant::Original);
    assert_eq!(captured.captured_at, frame.timestamp);

    let decoded = captured.decode().unwrap();
    assert_eq!(decoded.dimensions(), (CANONICAL_SIZE, CANONICAL_SIZE));
}

#[test]
fn test_take_snapshot_skips_without_frame() {
    assert_eq!(take_snapshot(None, 1, CANONICAL_SIZE).unwrap_err(), SkipReason::NotReady);

    let empty = FrameData::new(1, SystemTime::now(), Vec::new(), 0, 0, FrameFormat::Rgb24);
    assert_eq!(take_snapshot(Some(&empty), 1, CANONICAL_SIZE).unwrap_err(), SkipReason::EmptyFrame);

    let short = FrameData::new(1, SystemTime::now(), vec![0; 10], 8, 8, FrameFormat::Rgb24);
    assert!(matches!(take_snapshot(Some(&short), 1, CANONICAL_SIZE), Err(SkipReason::BadFrame(_))));
}

#[test]
fn test_placeholders_are_labeled_and_deterministic() {
    let fonts = Fonts::none();
    let frames = placeholder_frames(MAX_PHOTOS, 96, &fonts).unwrap();
    assert_eq!(frames.len(), MAX_PHOTOS);

    let mut set = PhotoSet::new(MAX_PHOTOS);
    for frame in frames.iter().cloned() {
        set.push(frame).unwrap();
    }
    assert!(set.is_full());

    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, i + 1);
        let image = frame.decode().unwrap();
        assert_eq!(image, render_placeholder(i + 1, 96, &fonts));
        // The label puts white pixels on the dark background
        assert!(image.pixels().any(|p| p[0] == 255));
    }

    // Alternating backgrounds
    assert_eq!(frames[0].decode().unwrap().get_pixel(0, 0)[0], 0x33);
    assert_eq!(frames[1].decode().unwrap().get_pixel(0, 0)[0], 0x11);
    assert_ne!(render_placeholder(1, 96, &fonts), render_placeholder(3, 96, &fonts));
}
