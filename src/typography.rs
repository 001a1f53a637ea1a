use crate::paint::{blended, clear_of};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::fs;
use tracing::{debug, warn};

const SANS_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

const MONO_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSansMono-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationMono-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationMono-Bold.ttf",
    "/usr/share/fonts/truetype/freefont/FreeMonoBold.ttf",
    "/Library/Fonts/Courier New Bold.ttf",
    "C:\\Windows\\Fonts\\courbd.ttf",
];

/// The two typefaces used for burned-in text
#[derive(Clone, Default)]
pub struct Fonts {
    sans: Option<Font<'static>>,
    mono: Option<Font<'static>>,
}

impl Fonts {
    /// Load the configured fonts, trying common system locations after them
    pub fn load(sans_path: &str, mono_path: &str) -> Self {
        let sans = load_first(sans_path, SANS_FALLBACKS, "sans");
        let mono = load_first(mono_path, MONO_FALLBACKS, "monospace");
        Self { sans, mono }
    }

    /// No fonts at all; every text draw becomes a no-op
    pub fn none() -> Self {
        Self::default()
    }

    pub fn sans(&self) -> Option<&Font<'static>> {
        self.sans.as_ref().or(self.mono.as_ref())
    }

    pub fn mono(&self) -> Option<&Font<'static>> {
        self.mono.as_ref().or(self.sans.as_ref())
    }

    pub fn has_any(&self) -> bool {
        self.sans.is_some() || self.mono.is_some()
    }

    /// The DejaVu faces shipped under `assets/fonts`, so rendering tests never depend on the host
    #[cfg(test)]
    pub(crate) fn bundled() -> Self {
        let sans = Font::try_from_bytes(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/assets/fonts/DejaVuSans-Bold.ttf"
        )));
        let mono = Font::try_from_bytes(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/assets/fonts/DejaVuSansMono-Bold.ttf"
        )));
        assert!(sans.is_some() && mono.is_some(), "bundled fonts failed to parse");
        Self { sans, mono }
    }
}

fn load_first(primary: &str, fallbacks: &[&str], kind: &str) -> Option<Font<'static>> {
    let candidates = std::iter::once(primary).chain(fallbacks.iter().copied());
    for path in candidates {
        if path.is_empty() {
            continue;
        }
        match fs::read(path) {
            Ok(data) => match Font::try_from_vec(data) {
                Some(font) => {
                    debug!("Loaded {} font from {}", kind, path);
                    return Some(font);
                }
                None => warn!("Failed to parse font file '{}'", path),
            },
            Err(e) => debug!("Font '{}' not readable: {}", path, e),
        }
    }

    warn!("No {} font could be loaded; that text will be skipped", kind);
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Which line of the text box sits on the given `y`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Alphabetic,
    Bottom,
}

/// Pixel width of a single line of text as drawn
pub fn text_width(font: &Font<'_>, scale: Scale, text: &str) -> f32 {
    text_size(scale, font, text).0.max(0) as f32
}

/// Draw one line of text anchored at `(x, y)`, honouring the colour's alpha
#[allow(clippy::too_many_arguments)]
pub fn draw_text(
    img: &mut RgbaImage,
    font: &Font<'_>,
    scale: Scale,
    color: Rgba<u8>,
    text: &str,
    x: f32,
    y: f32,
    h_align: HAlign,
    v_align: VAlign,
) {
    let v = font.v_metrics(scale);
    let width = text_width(font, scale, text);

    let left = match h_align {
        HAlign::Left => x,
        HAlign::Center => x - width / 2.0,
        HAlign::Right => x - width,
    };
    let baseline = match v_align {
        VAlign::Top => y + v.ascent,
        VAlign::Middle => y + (v.ascent + v.descent) / 2.0,
        VAlign::Alphabetic => y,
        VAlign::Bottom => y + v.descent,
    };
    // draw_text_mut places the top of the line box, one ascent above the baseline
    let top = (baseline - v.ascent).round() as i32;

    blended(img, |canvas| {
        draw_text_mut(canvas, color, left.round() as i32, top, scale, font, text)
    });
}

/// Render a line of text alone on a transparent layer sized to fit it
///
/// Returns the layer and the layer position of the `(h_align, baseline)`
/// anchor, ready for [`crate::paint::draw_layer_rotated`].
pub fn text_layer(
    font: &Font<'_>,
    scale: Scale,
    color: Rgba<u8>,
    text: &str,
    h_align: HAlign,
) -> (RgbaImage, (f32, f32)) {
    let v = font.v_metrics(scale);
    let pad = 2.0;
    let width = text_width(font, scale, text).ceil() + pad * 2.0;
    let height = (v.ascent - v.descent).ceil() + pad * 2.0;

    let mut layer = RgbaImage::from_pixel(width.max(1.0) as u32, height.max(1.0) as u32, clear_of(color));
    let baseline = pad + v.ascent;
    draw_text(
        &mut layer,
        font,
        scale,
        color,
        text,
        pad,
        baseline,
        HAlign::Left,
        VAlign::Alphabetic,
    );

    let anchor_x = match h_align {
        HAlign::Left => pad,
        HAlign::Center => width / 2.0,
        HAlign::Right => width - pad,
    };
    (layer, (anchor_x, baseline))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sans() -> Font<'static> {
        Fonts::bundled().sans().cloned().expect("bundled sans font")
    }

    fn inked(img: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
        img.enumerate_pixels()
            .filter(|(_, _, p)| p[3] > 0)
            .fold(None, |acc, (x, y, _)| match acc {
                None => Some((x, y, x, y)),
                Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
            })
    }

    #[test]
    fn test_missing_fonts_are_tolerated() {
        let fonts = Fonts::none();
        assert!(!fonts.has_any());
        assert!(fonts.sans().is_none());
        assert!(fonts.mono().is_none());
    }

    #[test]
    fn test_unreadable_primary_falls_back_or_skips() {
        let fonts = Fonts::load("/nonexistent/font.ttf", "/nonexistent/mono.ttf");
        // Either a system fallback was found or text is skipped entirely
        assert_eq!(fonts.sans().is_some(), fonts.mono().is_some());
    }

    #[test]
    fn test_bundled_fonts_cover_both_faces() {
        let fonts = Fonts::bundled();
        assert!(fonts.has_any());
        assert!(fonts.sans().is_some());
        assert!(fonts.mono().is_some());
    }

    #[test]
    fn test_width_matches_text_size() {
        let font = sans();
        let scale = Scale::uniform(20.0);
        let (w, _) = text_size(scale, &font, "12/02/26 10:30");
        assert_eq!(text_width(&font, scale, "12/02/26 10:30"), w as f32);
        assert!(text_width(&font, scale, "12/02/26 10:30") > text_width(&font, scale, "10:30"));
        assert_eq!(text_width(&font, scale, ""), 0.0);
    }

    #[test]
    fn test_right_aligned_text_ends_at_anchor() {
        let font = sans();
        let scale = Scale::uniform(20.0);
        let mut img = RgbaImage::new(200, 40);
        draw_text(
            &mut img,
            &font,
            scale,
            Rgba([255, 255, 255, 255]),
            "12/02/26 10:30",
            150.0,
            30.0,
            HAlign::Right,
            VAlign::Alphabetic,
        );

        let (x0, _, x1, y1) = inked(&img).expect("text was drawn");
        assert!(x1 <= 151 && x1 >= 145, "right edge at {}", x1);
        assert!(x0 < 100);
        // Digits sit on the baseline
        assert!(y1 <= 31, "ink below baseline at {}", y1);
    }

    #[test]
    fn test_bottom_alignment_keeps_descenders_inside() {
        let font = sans();
        let scale = Scale::uniform(24.0);
        let mut img = RgbaImage::new(120, 60);
        draw_text(
            &mut img,
            &font,
            scale,
            Rgba([0, 0, 0, 255]),
            "gypsy",
            10.0,
            50.0,
            HAlign::Left,
            VAlign::Bottom,
        );

        let (x0, _, _, y1) = inked(&img).expect("text was drawn");
        assert!(y1 <= 50, "descender below the box at {}", y1);
        assert!(y1 >= 45);
        assert!(x0 >= 10);
    }

    #[test]
    fn test_translucent_text_blends_over_background() {
        let font = sans();
        let scale = Scale::uniform(40.0);
        let mut img = RgbaImage::from_pixel(80, 60, Rgba([0, 0, 0, 255]));
        draw_text(
            &mut img,
            &font,
            scale,
            Rgba([255, 255, 255, 128]),
            "I",
            20.0,
            10.0,
            HAlign::Left,
            VAlign::Top,
        );

        let brightest = img.pixels().map(|p| p[0]).max().unwrap_or(0);
        assert!((120..=136).contains(&brightest), "peak {}", brightest);
        assert!(img.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_text_layer_fits_text() {
        let font = sans();
        let scale = Scale::uniform(28.0);
        let (layer, anchor) = text_layer(&font, scale, Rgba([0, 0, 0, 255]), "Champ & Oui.", HAlign::Right);
        assert!(layer.width() as f32 >= text_width(&font, scale, "Champ & Oui."));
        assert!(anchor.0 > 0.0 && anchor.1 > 0.0);
        assert!(layer.pixels().any(|p| p[3] > 0));

        let (x0, y0, x1, y1) = inked(&layer).expect("text was drawn");
        assert!(x0 > 0 && y0 > 0);
        assert!(x1 < layer.width() - 1 && y1 < layer.height() - 1);
    }
}
