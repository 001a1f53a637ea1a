use super::background::{paint_gradient, paint_grain};
use super::decorations::{draw_cell, draw_overlays, draw_sidebar, StripTexts};
use super::layout::{CellRect, DecorationAnchors, StripLayout};
use crate::clock::TimestampFormatter;
use crate::config::StripConfig;
use crate::error::CompositionError;
use crate::frame::CapturedFrame;
use crate::typography::Fonts;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use image::{ImageFormat, RgbaImage};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Cursor;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A finished strip plus the geometry it was drawn with
#[derive(Debug, Clone)]
pub struct CompositeStrip {
    pub image: RgbaImage,
    pub layout: StripLayout,
    /// Photo cells in capture order
    pub cells: Vec<CellRect>,
    pub anchors: DecorationAnchors,
    pub timestamp: String,
    /// Capture indices in the order their decodes finished and were drawn
    pub draw_order: Vec<usize>,
}

impl CompositeStrip {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, CompositionError> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CompositionError::encode(format!("strip PNG: {}", e)))?;
        Ok(bytes)
    }
}

/// Lays a photo set out on the decorated strip
pub struct StripCompositor {
    layout: StripLayout,
    texts: StripTexts,
    fonts: Fonts,
    timestamps: TimestampFormatter,
    decode_timeout: Option<Duration>,
    rng: Mutex<StdRng>,
}

impl StripCompositor {
    pub fn new(config: &StripConfig, fonts: Fonts, timestamps: TimestampFormatter) -> Self {
        Self {
            layout: StripLayout::default(),
            texts: StripTexts {
                caption: config.caption.clone(),
                tag: config.tag_text.clone(),
                badge_lines: config.badge_lines.clone(),
            },
            fonts,
            timestamps,
            decode_timeout: config.decode_timeout(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seed the grain so runs are repeatable
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn with_decode_timeout(self, decode_timeout: Option<Duration>) -> Self {
        Self {
            decode_timeout,
            ..self
        }
    }

    pub fn layout(&self) -> &StripLayout {
        &self.layout
    }

    /// Compose `frames` (in capture order) into one strip
    ///
    /// Decodes run concurrently and each photo is drawn as soon as it is
    /// ready. The overlays go on exactly once, after the last photo.
    pub async fn compose(&self, frames: &[CapturedFrame]) -> Result<CompositeStrip, CompositionError> {
        let decodes = frames.iter().map(|frame| frame.decode_async().boxed()).collect();
        self.compose_decoded(decodes).await
    }

    /// Compose from pending decodes, slot `i` holding the photo with index `i + 1`
    pub(crate) async fn compose_decoded(
        &self,
        decodes: Vec<BoxFuture<'_, Result<RgbaImage, CompositionError>>>,
    ) -> Result<CompositeStrip, CompositionError> {
        if decodes.is_empty() {
            return Err(CompositionError::EmptyFrameSet);
        }

        let total = decodes.len();
        let layout = self.layout;
        let (width, height) = layout.canvas_size(total);
        let anchors = layout.anchors(total);
        info!("Composing strip of {} photos ({}x{})", total, width, height);

        let mut canvas = RgbaImage::new(width, height);
        paint_gradient(&mut canvas);
        let grains = paint_grain(&mut canvas, &mut *self.rng.lock());
        debug!("Painted {} grain dots", grains);
        draw_sidebar(&mut canvas, &layout, &anchors, &self.fonts, &self.texts.caption);

        let mut pending: FuturesUnordered<_> = decodes
            .into_iter()
            .enumerate()
            .map(|(slot, decode)| async move { (slot, decode.await) })
            .collect();

        let deadline = self.decode_timeout.map(|t| Instant::now() + t);
        let mut draw_order = Vec::with_capacity(total);

        while draw_order.len() < total {
            let next = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let err = CompositionError::FrameDecodeStall {
                            loaded: draw_order.len(),
                            total,
                            timeout_ms: self.decode_timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
                        };
                        warn!("Strip composition stalled: {}", err);
                        return Err(err);
                    }
                },
                None => pending.next().await,
            };

            let Some((slot, decoded)) = next else {
                break;
            };
            let photo = decoded?;
            let cell = layout.cell(slot);
            draw_cell(&mut canvas, &cell, &photo);
            draw_order.push(cell.index);
            debug!("Drew photo {} ({}/{})", cell.index, draw_order.len(), total);
        }

        if draw_order.len() != total {
            return Err(CompositionError::FrameDecodeStall {
                loaded: draw_order.len(),
                total,
                timeout_ms: 0,
            });
        }

        let timestamp = self.timestamps.now_text();
        draw_overlays(&mut canvas, &anchors, &self.fonts, &self.texts, &timestamp);
        info!("Strip composed at {}", timestamp);

        Ok(CompositeStrip {
            image: canvas,
            layout,
            cells: layout.cells(total),
            anchors,
            timestamp,
            draw_order,
        })
    }
}
