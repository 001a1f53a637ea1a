use crate::error::CompositionError;
use crate::frame::{CapturedFrame, FrameVariant};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::{debug, info};

/// Block mosaic: smooth downsample by `factor`, then nearest-neighbour back up
pub fn pixelate(image: &RgbaImage, factor: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let small_w = ((width as f32 * factor).round() as u32).max(1);
    let small_h = ((height as f32 * factor).round() as u32).max(1);

    let small = imageops::resize(image, small_w, small_h, FilterType::Triangle);
    imageops::resize(&small, width, height, FilterType::Nearest)
}

/// Stylize one frame, keeping its index and capture time
pub fn stylize_frame(frame: &CapturedFrame, factor: f32) -> Result<CapturedFrame, CompositionError> {
    let source = frame.decode()?;
    let blocky = pixelate(&source, factor);
    debug!("Pixelated frame {} at factor {}", frame.index, factor);
    CapturedFrame::from_image(frame.index, frame.captured_at, &blocky, FrameVariant::Stylized)
}

/// Stylize a whole set in order; the result is returned only once every frame is done
pub fn stylize_set(frames: &[CapturedFrame], factor: f32) -> Result<Vec<CapturedFrame>, CompositionError> {
    let stylized = frames
        .iter()
        .map(|frame| stylize_frame(frame, factor))
        .collect::<Result<Vec<_>, _>>()?;
    info!("Stylized {} frames", stylized.len());
    Ok(stylized)
}

/// [`stylize_set`] on the blocking pool
pub async fn stylize_set_async(
    frames: Vec<CapturedFrame>,
    factor: f32,
) -> Result<Vec<CapturedFrame>, CompositionError> {
    tokio::task::spawn_blocking(move || stylize_set(&frames, factor))
        .await
        .map_err(|e| CompositionError::encode(format!("stylize task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::SystemTime;

    fn gradient(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            Rgba([(x * 255 / size) as u8, (y * 255 / size) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    /// Number of horizontally adjacent pixel pairs that differ
    fn edges(image: &RgbaImage) -> usize {
        let (w, h) = image.dimensions();
        (0..h)
            .flat_map(|y| (1..w).map(move |x| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y) != image.get_pixel(x - 1, y))
            .count()
    }

    #[test]
    fn test_pixelate_keeps_size_and_is_blocky() {
        let source = gradient(480);
        let blocky = pixelate(&source, 0.12);
        assert_eq!(blocky.dimensions(), (480, 480));

        // 480 * 0.12 = 57.6 -> 58 blocks per row, so at most 57 colour changes per row
        assert!(edges(&blocky) <= 57 * 480);
        assert!(edges(&blocky) < edges(&source));
    }

    #[test]
    fn test_pixelate_is_deterministic() {
        let source = gradient(120);
        assert_eq!(pixelate(&source, 0.12), pixelate(&source, 0.12));
    }

    #[test]
    fn test_pixelate_tiny_factor_collapses_to_one_block() {
        let blocky = pixelate(&gradient(32), 0.001);
        let first = *blocky.get_pixel(0, 0);
        assert!(blocky.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_stylize_set_preserves_order() {
        let frames: Vec<_> = (1..=6)
            .map(|i| {
                let image = RgbaImage::from_pixel(48, 48, Rgba([i as u8 * 40, 0, 0, 255]));
                CapturedFrame::from_image(i, SystemTime::now(), &image, FrameVariant::Original).unwrap()
            })
            .collect();

        let stylized = stylize_set(&frames, 0.12).unwrap();
        assert_eq!(stylized.len(), 6);
        for (original, styled) in frames.iter().zip(&stylized) {
            assert_eq!(original.index, styled.index);
            assert_eq!(original.captured_at, styled.captured_at);
            assert_eq!(styled.variant, FrameVariant::Stylized);
            assert_eq!(styled.decode().unwrap().get_pixel(10, 10)[0], original.index as u8 * 40);
        }
    }

    #[test]
    fn test_stylize_reports_bad_frame() {
        let broken = CapturedFrame::from_encoded(3, SystemTime::now(), 48, FrameVariant::Original, vec![1, 2, 3]);
        let err = stylize_set(&[broken], 0.12).unwrap_err();
        assert!(matches!(err, CompositionError::FrameDecode { index: 3, .. }));
    }
}
