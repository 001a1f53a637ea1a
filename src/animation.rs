use crate::clock::TimestampFormatter;
use crate::config::AnimationConfig;
use crate::error::CompositionError;
use crate::frame::CapturedFrame;
use crate::paint::{hex, with_alpha};
use crate::typography::{draw_text, Fonts, HAlign, VAlign};
use futures::future::{join_all, BoxFuture, FutureExt};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, Rgba, RgbaImage};
use rusttype::Scale;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GIF_MIME: &str = "image/gif";

const CORNER_INSET: f32 = 15.0;
const OVERLAY_SCALE: f32 = 12.0;

/// An encoded looping animation, alive only until it is handed to the exporter
#[derive(Debug, Clone)]
pub struct AnimatedArtifact {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub frame_count: usize,
    pub frame_delay: Duration,
}

/// Turns a photo set into a looping GIF with a date stamp on every frame
#[derive(Clone)]
pub struct AnimationExporter {
    frame_size: u32,
    frame_delay: Duration,
    watermark: String,
    quantizer_speed: i32,
    decode_timeout: Option<Duration>,
    fonts: Fonts,
    timestamps: TimestampFormatter,
}

impl AnimationExporter {
    pub fn new(
        config: &AnimationConfig,
        frame_size: u32,
        decode_timeout: Option<Duration>,
        fonts: Fonts,
        timestamps: TimestampFormatter,
    ) -> Self {
        Self {
            frame_size,
            frame_delay: config.frame_delay(),
            watermark: config.watermark.clone(),
            quantizer_speed: config.quantizer_sample_factor.clamp(1, 30),
            decode_timeout,
            fonts,
            timestamps,
        }
    }

    /// Encode `frames` in order
    ///
    /// Every decode must finish before the first frame is encoded; the encode
    /// pass itself runs on the blocking pool.
    pub async fn encode(&self, frames: &[CapturedFrame]) -> Result<AnimatedArtifact, CompositionError> {
        let decodes = frames.iter().map(|frame| frame.decode_async().boxed()).collect();
        self.encode_decoded(decodes).await
    }

    /// Encode from pending decodes, slot `i` becoming frame `i + 1`
    pub(crate) async fn encode_decoded(
        &self,
        decodes: Vec<BoxFuture<'_, Result<RgbaImage, CompositionError>>>,
    ) -> Result<AnimatedArtifact, CompositionError> {
        if decodes.is_empty() {
            return Err(CompositionError::EmptyFrameSet);
        }

        let total = decodes.len();
        let loaded = AtomicUsize::new(0);
        let barrier = join_all(decodes.into_iter().map(|decode| {
            let loaded = &loaded;
            async move {
                let decoded = decode.await;
                loaded.fetch_add(1, Ordering::SeqCst);
                decoded
            }
        }));

        let decoded = match self.decode_timeout {
            Some(limit) => match tokio::time::timeout(limit, barrier).await {
                Ok(decoded) => decoded,
                Err(_) => {
                    let err = CompositionError::FrameDecodeStall {
                        loaded: loaded.load(Ordering::SeqCst),
                        total,
                        timeout_ms: limit.as_millis() as u64,
                    };
                    warn!("Animation export stalled: {}", err);
                    return Err(err);
                }
            },
            None => barrier.await,
        };
        let images = decoded.into_iter().collect::<Result<Vec<_>, _>>()?;
        debug!("All {} animation frames decoded", images.len());

        let exporter = self.clone();
        let bytes = tokio::task::spawn_blocking(move || exporter.encode_frames(&images))
            .await
            .map_err(|e| CompositionError::encode(format!("animation task failed: {}", e)))??;

        info!(
            "Encoded {}-frame animation ({} bytes, {:?} per frame)",
            total,
            bytes.len(),
            self.frame_delay
        );

        Ok(AnimatedArtifact {
            bytes,
            mime: GIF_MIME,
            frame_count: total,
            frame_delay: self.frame_delay,
        })
    }

    fn encode_frames(&self, images: &[RgbaImage]) -> Result<Vec<u8>, CompositionError> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, self.quantizer_speed);
            encoder
                .set_repeat(Repeat::Infinite)
                .map_err(|e| CompositionError::encode(format!("GIF header: {}", e)))?;

            for (i, image) in images.iter().enumerate() {
                let canvas = self.render_frame(image, &self.timestamps.now_text());
                let frame = Frame::from_parts(canvas, 0, 0, Delay::from_saturating_duration(self.frame_delay));
                encoder
                    .encode_frame(frame)
                    .map_err(|e| CompositionError::encode(format!("GIF frame {}: {}", i + 1, e)))?;
            }
        }
        Ok(bytes)
    }

    /// One animation frame: photo on black plus the burned-in stamp and watermark
    pub fn render_frame(&self, photo: &RgbaImage, stamp: &str) -> RgbaImage {
        let size = self.frame_size;
        let mut canvas = RgbaImage::from_pixel(size, size, Rgba([0, 0, 0, 255]));

        if photo.dimensions() == (size, size) {
            imageops::overlay(&mut canvas, photo, 0, 0);
        } else {
            let scaled = imageops::resize(photo, size, size, FilterType::Triangle);
            imageops::overlay(&mut canvas, &scaled, 0, 0);
        }

        let Some(font) = self.fonts.mono() else {
            return canvas;
        };
        let scale = Scale::uniform(OVERLAY_SCALE);
        let edge = size as f32 - CORNER_INSET;

        let shadow = with_alpha(hex(0x000000), 0.8);
        for (dx, dy) in [(1.0, 1.0), (-1.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_text(&mut canvas, font, scale, shadow, stamp, edge + dx, edge + dy, HAlign::Right, VAlign::Bottom);
        }
        draw_text(&mut canvas, font, scale, hex(0xf97316), stamp, edge, edge, HAlign::Right, VAlign::Bottom);

        draw_text(
            &mut canvas,
            font,
            scale,
            with_alpha(hex(0xffffff), 0.7),
            &self.watermark,
            CORNER_INSET,
            edge,
            HAlign::Left,
            VAlign::Bottom,
        );

        canvas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::typography::text_width;
    use crate::frame::FrameVariant;
    use chrono::{TimeZone, Utc};
    use futures::future;
    use image::codecs::gif::GifDecoder;
    use image::{AnimationDecoder, ImageDecoder};
    use std::io::Cursor;
    use std::sync::Arc;
    use std::time::SystemTime;

    const COLORS: [[u8; 3]; 6] = [
        [220, 20, 20],
        [20, 220, 20],
        [20, 20, 220],
        [220, 220, 20],
        [20, 220, 220],
        [220, 20, 220],
    ];

    fn exporter(fonts: Fonts) -> AnimationExporter {
        exporter_with(fonts, 64, Some(Duration::from_secs(10)))
    }

    fn exporter_with(fonts: Fonts, size: u32, decode_timeout: Option<Duration>) -> AnimationExporter {
        let at = Utc.with_ymd_and_hms(2026, 2, 14, 20, 30, 0).unwrap();
        AnimationExporter::new(
            &AnimationConfig::default(),
            size,
            decode_timeout,
            fonts,
            TimestampFormatter::new(Some("UTC"), Arc::new(FixedClock(at))),
        )
    }

    fn ready_decodes(count: usize) -> Vec<BoxFuture<'static, Result<RgbaImage, CompositionError>>> {
        (0..count)
            .map(|_| future::ready(Ok(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])))).boxed())
            .collect()
    }

    fn frames() -> Vec<CapturedFrame> {
        COLORS
            .iter()
            .enumerate()
            .map(|(i, [r, g, b])| {
                let image = RgbaImage::from_pixel(96, 96, Rgba([*r, *g, *b, 255]));
                CapturedFrame::from_image(i + 1, SystemTime::now(), &image, FrameVariant::Original).unwrap()
            })
            .collect()
    }

    fn close(a: u8, b: u8) -> bool {
        (a as i32 - b as i32).abs() <= 12
    }

    #[tokio::test]
    async fn test_gif_has_every_frame_in_order() {
        let artifact = exporter(Fonts::none()).encode(&frames()).await.unwrap();
        assert_eq!(artifact.mime, "image/gif");
        assert_eq!(artifact.frame_count, 6);
        assert_eq!(artifact.frame_delay, Duration::from_millis(350));
        assert_eq!(&artifact.bytes[..6], b"GIF89a");

        let decoder = GifDecoder::new(Cursor::new(&artifact.bytes)).unwrap();
        assert_eq!(decoder.dimensions(), (64, 64));
        let decoded = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 6);

        for (frame, [r, g, b]) in decoded.iter().zip(COLORS) {
            assert_eq!(frame.delay().numer_denom_ms(), (350, 1));
            let centre = frame.buffer().get_pixel(32, 32);
            assert!(
                close(centre[0], r) && close(centre[1], g) && close(centre[2], b),
                "unexpected colour {:?}",
                centre
            );
        }
    }

    #[tokio::test]
    async fn test_empty_set_is_rejected() {
        let err = exporter(Fonts::none()).encode(&[]).await.unwrap_err();
        assert!(matches!(err, CompositionError::EmptyFrameSet));
    }

    #[tokio::test]
    async fn test_undecodable_frame_fails() {
        let mut set = frames();
        set[2] = CapturedFrame::from_encoded(3, SystemTime::now(), 96, FrameVariant::Original, vec![0; 4]);
        let err = exporter(Fonts::none()).encode(&set).await.unwrap_err();
        assert!(matches!(err, CompositionError::FrameDecode { index: 3, .. }));
    }

    #[test]
    fn test_render_frame_without_fonts_is_just_the_photo() {
        let photo = RgbaImage::from_pixel(64, 64, Rgba([10, 20, 30, 255]));
        let rendered = exporter(Fonts::none()).render_frame(&photo, "14/02/26 20:30");
        assert_eq!(rendered, photo);
    }

    #[tokio::test]
    async fn test_stalled_decode_fails_the_barrier() {
        let exporter = exporter_with(Fonts::none(), 32, Some(Duration::from_millis(50)));
        let mut decodes = ready_decodes(5);
        decodes.push(future::pending().boxed());

        let err = exporter.encode_decoded(decodes).await.unwrap_err();
        assert!(matches!(
            err,
            CompositionError::FrameDecodeStall { loaded: 5, total: 6, timeout_ms: 50 }
        ));
    }

    #[tokio::test]
    async fn test_slow_decode_within_the_limit_is_awaited() {
        let exporter = exporter_with(Fonts::none(), 32, Some(Duration::from_secs(5)));
        let mut decodes = ready_decodes(5);
        decodes.push(
            async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(RgbaImage::from_pixel(8, 8, Rgba([9, 9, 9, 255])))
            }
            .boxed(),
        );

        let artifact = exporter.encode_decoded(decodes).await.unwrap();
        assert_eq!(artifact.frame_count, 6);
        let decoder = GifDecoder::new(Cursor::new(&artifact.bytes)).unwrap();
        assert_eq!(decoder.into_frames().collect_frames().unwrap().len(), 6);
    }

    #[test]
    fn test_stamp_changes_only_the_corner() {
        let fonts = Fonts::bundled();
        let font = fonts.mono().cloned().unwrap();
        let exporter = exporter_with(fonts, 480, None);
        let photo = RgbaImage::from_pixel(480, 480, Rgba([10, 20, 30, 255]));
        let a = exporter.render_frame(&photo, "14/02/26 20:30");
        let b = exporter.render_frame(&photo, "14/02/26 20:31");

        // Stamp box: right and bottom edges on the inset corner, widened by the shadow offsets
        let scale = Scale::uniform(OVERLAY_SCALE);
        let v = font.v_metrics(scale);
        let edge = 480.0 - CORNER_INSET;
        let width = text_width(&font, scale, "14/02/26 20:30").max(text_width(&font, scale, "14/02/26 20:31"));
        let left = (edge - width - 2.0).floor() as u32;
        let top = (edge - (v.ascent - v.descent) - 2.0).floor() as u32;
        let right = edge as u32 + 2;
        let bottom = edge as u32 + 2;
        let inside = |x: u32, y: u32| (left..=right).contains(&x) && (top..=bottom).contains(&y);

        let changed: Vec<_> = a
            .enumerate_pixels()
            .filter(|&(x, y, pixel)| pixel != b.get_pixel(x, y))
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!changed.is_empty());
        for &(x, y) in &changed {
            assert!(inside(x, y), "pixel ({}, {}) changed outside {:?}", x, y, (left, top, right, bottom));
        }

        // The stamp itself is orange, and it sits inside the same box
        let orange = a
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] > 200 && p[2] < 90)
            .map(|(x, y, _)| (x, y))
            .collect::<Vec<_>>();
        assert!(!orange.is_empty());
        assert!(orange.iter().all(|&(x, y)| inside(x, y)));

        // Photo centre untouched
        assert_eq!(a.get_pixel(240, 240), &Rgba([10, 20, 30, 255]));
    }
}
