use crate::error::{CompositionError, PhotoboothError};
use image::{ImageFormat, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use std::time::SystemTime;

/// Number of photos in a complete set
pub const MAX_PHOTOS: usize = 6;

/// Edge length of captured square frames
pub const CANONICAL_SIZE: u32 = 480;

/// Pixel layout of a raw camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// RGB24 format - uncompressed RGB data
    Rgb24,
    /// RGBA format - uncompressed RGB data with alpha
    Rgba32,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Rgb24 => 3,
            FrameFormat::Rgba32 => 4,
        }
    }
}

/// A live frame read from the camera stream
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Frame sequence number within its stream
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Wrap an RGB image as a frame
    pub fn from_rgb_image(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(id, timestamp, image.into_raw(), width, height, FrameFormat::Rgb24)
    }

    /// Get the expected frame size in bytes
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.expected_size()
    }

    /// Convert to an RGBA raster; `None` when the buffer does not match the dimensions
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        if self.width == 0 || self.height == 0 || !self.validate_size() {
            return None;
        }

        match self.format {
            FrameFormat::Rgba32 => RgbaImage::from_raw(self.width, self.height, self.data.to_vec()),
            FrameFormat::Rgb24 => {
                let rgb = RgbImage::from_raw(self.width, self.height, self.data.to_vec())?;
                Some(image::DynamicImage::ImageRgb8(rgb).to_rgba8())
            }
        }
    }
}

/// Whether a frame is a camera capture or derived by stylization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameVariant {
    Original,
    Stylized,
}

impl FrameVariant {
    /// Short name used in filenames
    pub fn label(&self) -> &'static str {
        match self {
            FrameVariant::Original => "original",
            FrameVariant::Stylized => "pixel",
        }
    }
}

/// An immutable square photo, stored PNG-encoded like the snapshot it came from
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// 1-based position in capture order
    pub index: usize,
    /// Moment the source photo was taken
    pub captured_at: SystemTime,
    /// Edge length in pixels
    pub size: u32,
    pub variant: FrameVariant,
    encoded: Arc<Vec<u8>>,
}

impl CapturedFrame {
    /// Encode a raster into a frame
    pub fn from_image(
        index: usize,
        captured_at: SystemTime,
        image: &RgbaImage,
        variant: FrameVariant,
    ) -> Result<Self, CompositionError> {
        let mut encoded = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .map_err(|e| CompositionError::encode(format!("frame {}: {}", index, e)))?;

        Ok(Self {
            index,
            captured_at,
            size: image.width(),
            variant,
            encoded: Arc::new(encoded),
        })
    }

    /// Build a frame from already-encoded bytes; nothing is validated until decode
    pub fn from_encoded(
        index: usize,
        captured_at: SystemTime,
        size: u32,
        variant: FrameVariant,
        encoded: Vec<u8>,
    ) -> Self {
        Self {
            index,
            captured_at,
            size,
            variant,
            encoded: Arc::new(encoded),
        }
    }

    /// Encoded image bytes
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// Decode the frame into an RGBA raster
    pub fn decode(&self) -> Result<RgbaImage, CompositionError> {
        image::load_from_memory(&self.encoded)
            .map(|img| img.to_rgba8())
            .map_err(|e| CompositionError::FrameDecode {
                index: self.index,
                details: e.to_string(),
            })
    }

    /// Decode on the blocking pool so the event loop keeps running
    pub async fn decode_async(&self) -> Result<RgbaImage, CompositionError> {
        let frame = self.clone();
        let index = self.index;
        tokio::task::spawn_blocking(move || frame.decode())
            .await
            .map_err(|e| CompositionError::FrameDecode {
                index,
                details: format!("decode task failed: {}", e),
            })?
    }
}

/// The ordered photos of one session plus their optional stylized twins
#[derive(Debug, Clone)]
pub struct PhotoSet {
    max_photos: usize,
    originals: Vec<CapturedFrame>,
    stylized: Option<Vec<CapturedFrame>>,
}

impl PhotoSet {
    pub fn new(max_photos: usize) -> Self {
        Self {
            max_photos,
            originals: Vec::with_capacity(max_photos),
            stylized: None,
        }
    }

    pub fn max_photos(&self) -> usize {
        self.max_photos
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.originals.len() >= self.max_photos
    }

    /// Index the next pushed frame must carry
    pub fn next_index(&self) -> usize {
        self.originals.len() + 1
    }

    /// Append the next original frame in capture order
    pub fn push(&mut self, frame: CapturedFrame) -> crate::error::Result<usize> {
        if self.is_full() {
            return Err(PhotoboothError::component(
                "photo_set".to_string(),
                format!("set already holds {} photos", self.max_photos),
            ));
        }

        if frame.index != self.next_index() || frame.variant != FrameVariant::Original {
            return Err(PhotoboothError::component(
                "photo_set".to_string(),
                format!(
                    "expected original frame {}, got {:?} frame {}",
                    self.next_index(),
                    frame.variant,
                    frame.index
                ),
            ));
        }

        self.originals.push(frame);
        Ok(self.originals.len())
    }

    pub fn originals(&self) -> &[CapturedFrame] {
        &self.originals
    }

    pub fn stylized(&self) -> Option<&[CapturedFrame]> {
        self.stylized.as_deref()
    }

    /// Frames of the requested variant, if that variant exists
    pub fn frames(&self, variant: FrameVariant) -> Option<&[CapturedFrame]> {
        match variant {
            FrameVariant::Original => Some(&self.originals),
            FrameVariant::Stylized => self.stylized(),
        }
    }

    /// Store a stylized set; it must mirror the originals index for index
    pub fn set_stylized(&mut self, frames: Vec<CapturedFrame>) -> Result<(), CompositionError> {
        if frames.len() != self.originals.len() {
            return Err(CompositionError::LengthMismatch {
                expected: self.originals.len(),
                actual: frames.len(),
            });
        }

        for (original, stylized) in self.originals.iter().zip(frames.iter()) {
            if original.index != stylized.index || stylized.variant != FrameVariant::Stylized {
                return Err(CompositionError::encode(format!(
                    "stylized frame {} does not correspond to original {}",
                    stylized.index, original.index
                )));
            }
        }

        self.stylized = Some(frames);
        Ok(())
    }

    /// Drop every frame, original and stylized
    pub fn clear(&mut self) {
        self.originals.clear();
        self.stylized = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(size: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([value, value, value, 255]))
    }

    fn original(index: usize) -> CapturedFrame {
        CapturedFrame::from_image(index, SystemTime::now(), &solid(8, index as u8 * 10), FrameVariant::Original)
            .unwrap()
    }

    #[test]
    fn test_frame_data_to_rgba() {
        let frame = FrameData::new(1, SystemTime::now(), vec![10, 20, 30, 40, 50, 60], 2, 1, FrameFormat::Rgb24);
        let image = frame.to_rgba_image().unwrap();
        assert_eq!(image.get_pixel(1, 0), &Rgba([40, 50, 60, 255]));
    }

    #[test]
    fn test_frame_data_rejects_bad_size() {
        let frame = FrameData::new(1, SystemTime::now(), vec![0; 5], 2, 1, FrameFormat::Rgb24);
        assert!(!frame.validate_size());
        assert!(frame.to_rgba_image().is_none());

        let empty = FrameData::new(1, SystemTime::now(), vec![], 0, 0, FrameFormat::Rgb24);
        assert!(empty.to_rgba_image().is_none());
    }

    #[test]
    fn test_captured_frame_decode() {
        let frame = original(3);
        let decoded = frame.decode().unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([30, 30, 30, 255]));
    }

    #[test]
    fn test_corrupt_frame_reports_index() {
        let frame = CapturedFrame::from_encoded(4, SystemTime::now(), 8, FrameVariant::Original, vec![1, 2, 3]);
        match frame.decode() {
            Err(CompositionError::FrameDecode { index, .. }) => assert_eq!(index, 4),
            other => panic!("unexpected decode result: {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn test_photo_set_bounds_and_order() {
        let mut set = PhotoSet::new(2);
        assert!(set.push(original(2)).is_err());

        assert_eq!(set.push(original(1)).unwrap(), 1);
        assert_eq!(set.push(original(2)).unwrap(), 2);
        assert!(set.is_full());
        assert!(set.push(original(3)).is_err());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_stylized_must_correspond() {
        let mut set = PhotoSet::new(2);
        set.push(original(1)).unwrap();
        set.push(original(2)).unwrap();

        let short = vec![CapturedFrame::from_image(1, SystemTime::now(), &solid(8, 0), FrameVariant::Stylized).unwrap()];
        assert!(matches!(
            set.set_stylized(short),
            Err(CompositionError::LengthMismatch { expected: 2, actual: 1 })
        ));

        let swapped = vec![
            CapturedFrame::from_image(2, SystemTime::now(), &solid(8, 0), FrameVariant::Stylized).unwrap(),
            CapturedFrame::from_image(1, SystemTime::now(), &solid(8, 0), FrameVariant::Stylized).unwrap(),
        ];
        assert!(set.set_stylized(swapped).is_err());
        assert!(set.stylized().is_none());

        let good = vec![
            CapturedFrame::from_image(1, SystemTime::now(), &solid(8, 0), FrameVariant::Stylized).unwrap(),
            CapturedFrame::from_image(2, SystemTime::now(), &solid(8, 0), FrameVariant::Stylized).unwrap(),
        ];
        set.set_stylized(good).unwrap();
        assert_eq!(set.frames(FrameVariant::Stylized).unwrap().len(), 2);

        set.clear();
        assert!(set.is_empty());
        assert!(set.frames(FrameVariant::Stylized).is_none());
    }
}
