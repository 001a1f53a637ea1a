use crate::paint::{blend_point, blended, hex, with_alpha};
use image::{Rgba, RgbaImage};
use rand::Rng;

const GRADIENT_TOP: u32 = 0xe0f2fe;
const GRADIENT_BOTTOM: u32 = 0x7dd3fc;
const GRAIN_STEP: usize = 3;
const GRAIN_ALPHA: f32 = 0.35;

/// Vertical light-to-darker blue gradient
pub fn paint_gradient(img: &mut RgbaImage) {
    let top = hex(GRADIENT_TOP);
    let bottom = hex(GRADIENT_BOTTOM);
    let height = img.height().max(1) as f32;

    for (_, y, pixel) in img.enumerate_pixels_mut() {
        let t = (y as f32 + 0.5) / height;
        *pixel = lerp(top, bottom, t);
    }
}

/// White grain: a 1.5 px dot every third pixel, each with even odds
pub fn paint_grain<R: Rng + ?Sized>(img: &mut RgbaImage, rng: &mut R) -> usize {
    let white = hex(0xffffff);
    let core = with_alpha(white, GRAIN_ALPHA);
    let edge = with_alpha(white, GRAIN_ALPHA * 0.5);
    let corner = with_alpha(white, GRAIN_ALPHA * 0.25);
    let (width, height) = img.dimensions();

    blended(img, |canvas| {
        let mut dots = 0;
        for x in (0..width as i32).step_by(GRAIN_STEP) {
            for y in (0..height as i32).step_by(GRAIN_STEP) {
                if rng.gen::<f64>() > 0.5 {
                    blend_point(canvas, x, y, core);
                    blend_point(canvas, x + 1, y, edge);
                    blend_point(canvas, x, y + 1, edge);
                    blend_point(canvas, x + 1, y + 1, corner);
                    dots += 1;
                }
            }
        }
        dots
    })
}

fn lerp(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let mix = |c: usize| (a[c] as f32 + (b[c] as f32 - a[c] as f32) * t).round() as u8;
    Rgba([mix(0), mix(1), mix(2), 255])
}
