use crate::error::CompositionError;
use crate::frame::{CapturedFrame, FrameData, FrameVariant};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use std::fmt;
use tracing::debug;

/// Why a snapshot produced nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The camera session was not ready or had no frame yet
    NotReady,
    /// The live frame reported zero width or height
    EmptyFrame,
    /// The live frame could not be converted or encoded
    BadFrame(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotReady => write!(f, "camera not ready"),
            SkipReason::EmptyFrame => write!(f, "frame has no pixels"),
            SkipReason::BadFrame(details) => write!(f, "unusable frame: {}", details),
        }
    }
}

/// Centre-crop to a square on the shorter side, mirror, and resize to `size`
pub fn square_mirrored(source: &RgbaImage, size: u32) -> Option<RgbaImage> {
    let (width, height) = source.dimensions();
    if width == 0 || height == 0 || size == 0 {
        return None;
    }

    let side = width.min(height);
    let x_offset = (width - side) / 2;
    let y_offset = (height - side) / 2;

    let square = imageops::crop_imm(source, x_offset, y_offset, side, side).to_image();
    let mirrored = imageops::flip_horizontal(&square);
    if side == size {
        return Some(mirrored);
    }
    Some(imageops::resize(&mirrored, size, size, FilterType::Triangle))
}

/// Turn the current live frame into the next photo of the set
pub fn take_snapshot(
    live: Option<&FrameData>,
    index: usize,
    size: u32,
) -> Result<CapturedFrame, SkipReason> {
    let frame = live.ok_or(SkipReason::NotReady)?;
    if frame.width == 0 || frame.height == 0 {
        return Err(SkipReason::EmptyFrame);
    }

    let source = frame
        .to_rgba_image()
        .ok_or_else(|| SkipReason::BadFrame(format!("{} bytes do not match {}x{}", frame.data.len(), frame.width, frame.height)))?;
    let square = square_mirrored(&source, size).ok_or(SkipReason::EmptyFrame)?;

    debug!(
        "Snapshot {} taken from {}x{} frame {}",
        index, frame.width, frame.height, frame.id
    );

    CapturedFrame::from_image(index, frame.timestamp, &square, FrameVariant::Original)
        .map_err(|e: CompositionError| SkipReason::BadFrame(e.to_string()))
}
