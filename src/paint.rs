//! Raster primitives shared by the compositor, the exporter and the placeholders
//!
//! Shapes are drawn with `imageproc` onto a [`Blend`] canvas so partially
//! transparent colours composite source-over like a 2D canvas. Rotated
//! decorations are warped with an affine [`Projection`].

use image::imageops;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, Blend, Canvas};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::point::Point;
use imageproc::rect::Rect;

const ARC_STEPS: usize = 8;

/// Opaque colour from a `0xRRGGBB` literal
pub fn hex(rgb: u32) -> Rgba<u8> {
    Rgba([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255])
}

/// Same colour with its alpha replaced
pub fn with_alpha(color: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    Rgba([
        color[0],
        color[1],
        color[2],
        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
    ])
}

/// Same colour, fully transparent; the background for layers drawn in `color`
pub fn clear_of(color: Rgba<u8>) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 0])
}

/// Run `draw` against `img` with source-over blending instead of overwriting
pub fn blended<R>(img: &mut RgbaImage, draw: impl FnOnce(&mut Blend<RgbaImage>) -> R) -> R {
    let mut canvas = Blend(std::mem::take(img));
    let result = draw(&mut canvas);
    *img = canvas.0;
    result
}

/// Blend one pixel if it lies inside the canvas
pub fn blend_point(canvas: &mut Blend<RgbaImage>, x: i32, y: i32, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
        canvas.draw_pixel(x as u32, y as u32, color);
    }
}

/// Outline a rectangle with a band of `thickness` pixels centred on its edge
///
/// The band is four disjoint rectangles, so a translucent colour lands once
/// on every pixel.
pub fn stroke_rect(
    img: &mut RgbaImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    thickness: u32,
    color: Rgba<u8>,
) {
    if thickness == 0 {
        return;
    }
    let half = (thickness / 2) as i32;
    let (ox, oy) = (x - half, y - half);
    let (ow, oh) = (width + thickness, height + thickness);
    let side = oh.saturating_sub(thickness * 2);

    blended(img, |canvas| {
        draw_filled_rect_mut(canvas, Rect::at(ox, oy).of_size(ow, thickness), color);
        draw_filled_rect_mut(canvas, Rect::at(ox, oy + (oh - thickness) as i32).of_size(ow, thickness), color);
        if side > 0 {
            let top = oy + thickness as i32;
            draw_filled_rect_mut(canvas, Rect::at(ox, top).of_size(thickness, side), color);
            draw_filled_rect_mut(canvas, Rect::at(ox + (ow - thickness) as i32, top).of_size(thickness, side), color);
        }
    });
}

/// Geometry of an axis-aligned rounded rectangle in floating point pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
}

impl RoundedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Self {
        let radius = radius.min(width / 2.0).min(height / 2.0).max(0.0);
        Self {
            x,
            y,
            width,
            height,
            radius,
        }
    }

    /// Outline points, clockwise from the top-left arc, moved `inset` pixels inwards
    pub fn outline(&self, inset: f32) -> Vec<(f32, f32)> {
        let r = (self.radius - inset).max(0.0);
        let (left, top) = (self.x + inset, self.y + inset);
        let (right, bottom) = (self.x + self.width - inset, self.y + self.height - inset);

        let corners = [
            ((left + r, top + r), std::f32::consts::PI),
            ((right - r, top + r), 1.5 * std::f32::consts::PI),
            ((right - r, bottom - r), 0.0),
            ((left + r, bottom - r), 0.5 * std::f32::consts::PI),
        ];

        let mut points = Vec::with_capacity(corners.len() * (ARC_STEPS + 1));
        for ((cx, cy), start) in corners {
            for step in 0..=ARC_STEPS {
                let angle = start + std::f32::consts::FRAC_PI_2 * step as f32 / ARC_STEPS as f32;
                points.push((cx + r * angle.cos(), cy + r * angle.sin()));
            }
        }
        points
    }
}

/// Integer polygon for `draw_polygon_mut`: no repeated neighbours, open path
fn polygon(points: &[(f32, f32)]) -> Vec<Point<i32>> {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let p = Point::new(x.round() as i32, y.round() as i32);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    poly
}

/// Fill a rounded rectangle
pub fn fill_rounded_rect(img: &mut RgbaImage, shape: RoundedRect, color: Rgba<u8>) {
    let poly = polygon(&shape.outline(0.0));
    if poly.len() < 3 {
        return;
    }
    blended(img, |canvas| draw_polygon_mut(canvas, &poly, color));
}

/// Outline a rounded rectangle with a band centred on its edge
///
/// The band is traced onto its own layer and composited once, so overlapping
/// segment ends never darken a translucent stroke.
pub fn stroke_rounded_rect(img: &mut RgbaImage, shape: RoundedRect, line_width: f32, color: Rgba<u8>) {
    let passes = line_width.round().max(1.0) as usize;
    let mut ring = RgbaImage::from_pixel(img.width(), img.height(), clear_of(color));

    for pass in 0..passes {
        let inset = pass as f32 - (passes as f32 - 1.0) / 2.0;
        let points = shape.outline(inset);
        for (i, &start) in points.iter().enumerate() {
            let end = points[(i + 1) % points.len()];
            draw_line_segment_mut(&mut ring, start, end, color);
        }
    }

    imageops::overlay(img, &ring, 0, 0);
}

/// Paint `layer` onto `dst` rotated by `angle` radians around `anchor`
///
/// The layer pixel at `origin` lands on `anchor`, like a canvas
/// `translate(anchor)` followed by `rotate(angle)`. Sampling is bilinear;
/// only the window covering the rotated layer is warped.
pub fn draw_layer_rotated(
    dst: &mut RgbaImage,
    layer: &RgbaImage,
    origin: (f32, f32),
    anchor: (f32, f32),
    angle: f32,
) {
    if layer.width() == 0 || layer.height() == 0 {
        return;
    }
    // Bilinear sampling drops the outermost texels, so give the layer a clear frame
    let blank = clear_of(*layer.get_pixel(0, 0));
    let mut framed = RgbaImage::from_pixel(layer.width() + 2, layer.height() + 2, blank);
    imageops::replace(&mut framed, layer, 1, 1);
    let origin = (origin.0 + 1.0, origin.1 + 1.0);

    let placement = Projection::translate(-origin.0, -origin.1)
        .and_then(Projection::rotate(angle))
        .and_then(Projection::translate(anchor.0, anchor.1));

    let (lw, lh) = (framed.width() as f32, framed.height() as f32);
    let mut min = (f32::MAX, f32::MAX);
    let mut max = (f32::MIN, f32::MIN);
    for corner in [(0.0, 0.0), (lw, 0.0), (0.0, lh), (lw, lh)] {
        let (wx, wy) = placement * corner;
        min = (min.0.min(wx), min.1.min(wy));
        max = (max.0.max(wx), max.1.max(wy));
    }

    let x0 = (min.0.floor() as i32).max(0);
    let y0 = (min.1.floor() as i32).max(0);
    let x1 = (max.0.ceil() as i32).min(dst.width() as i32);
    let y1 = (max.1.ceil() as i32).min(dst.height() as i32);
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let into_window = placement.and_then(Projection::translate(-x0 as f32, -y0 as f32));
    let mut window = RgbaImage::new((x1 - x0) as u32, (y1 - y0) as u32);
    warp_into(&framed, &into_window, Interpolation::Bilinear, blank, &mut window);

    imageops::overlay(dst, &window, x0 as i64, y0 as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_half_white_over_black() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        blended(&mut img, |canvas| blend_point(canvas, 0, 0, with_alpha(hex(0xffffff), 0.5)));
        let p = img.get_pixel(0, 0);
        assert!((p[0] as i32 - 128).abs() <= 1);
        assert_eq!(p[3], 255);
    }

    #[test]
    fn test_blend_outside_is_ignored() {
        let mut img = RgbaImage::new(2, 2);
        blended(&mut img, |canvas| {
            blend_point(canvas, -1, 0, hex(0xffffff));
            blend_point(canvas, 2, 2, hex(0xffffff));
        });
        assert!(img.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn test_stroke_rect_leaves_interior() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        stroke_rect(&mut img, 5, 5, 10, 10, 2, hex(0xffffff));
        assert_eq!(img.get_pixel(4, 10)[0], 255);
        assert_eq!(img.get_pixel(10, 10)[0], 0);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn test_translucent_stroke_lands_once_at_corners() {
        let mut img = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255]));
        stroke_rect(&mut img, 5, 5, 10, 10, 1, with_alpha(hex(0xffffff), 0.5));
        assert_eq!(img.get_pixel(5, 5), img.get_pixel(10, 5));
        assert_eq!(img.get_pixel(15, 15), img.get_pixel(5, 10));
        assert_eq!(img.get_pixel(10, 10)[0], 0);
    }

    #[test]
    fn test_rounded_rect_corners_are_cut() {
        let mut img = RgbaImage::new(40, 40);
        fill_rounded_rect(&mut img, RoundedRect::new(0.0, 0.0, 40.0, 40.0, 15.0), hex(0xff0000));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(img.get_pixel(20, 20)[3], 255);
        assert_eq!(img.get_pixel(20, 0)[3], 255);
    }

    #[test]
    fn test_rounded_stroke_is_hollow() {
        let mut img = RgbaImage::new(60, 60);
        stroke_rounded_rect(&mut img, RoundedRect::new(10.0, 10.0, 40.0, 40.0, 10.0), 3.0, hex(0x000000));
        assert_eq!(img.get_pixel(30, 10)[3], 255);
        assert_eq!(img.get_pixel(30, 30)[3], 0);
        assert_eq!(img.get_pixel(10, 10)[3], 0);
    }

    #[test]
    fn test_zero_rotation_is_a_plain_copy() {
        let layer = RgbaImage::from_pixel(4, 4, hex(0x00ff00));
        let mut dst = RgbaImage::new(10, 10);
        draw_layer_rotated(&mut dst, &layer, (0.0, 0.0), (3.0, 3.0), 0.0);
        assert_eq!(*dst.get_pixel(4, 4), hex(0x00ff00));
        assert_eq!(*dst.get_pixel(5, 5), hex(0x00ff00));
        assert_eq!(dst.get_pixel(8, 8)[3], 0);
        assert_eq!(dst.get_pixel(1, 1)[3], 0);
    }

    #[test]
    fn test_quarter_turn_swings_the_layer_upwards() {
        // 20x4 bar anchored at its left end, turned -90 degrees, points up
        let layer = RgbaImage::from_pixel(20, 4, hex(0x0000ff));
        let mut dst = RgbaImage::new(40, 40);
        draw_layer_rotated(&mut dst, &layer, (0.0, 2.0), (20.0, 30.0), -std::f32::consts::FRAC_PI_2);
        assert_eq!(dst.get_pixel(20, 20)[3], 255);
        assert_eq!(dst.get_pixel(30, 30)[3], 0);
        assert_eq!(dst.get_pixel(20, 35)[3], 0);
    }
}
