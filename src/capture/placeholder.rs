use crate::error::CompositionError;
use crate::frame::{CapturedFrame, FrameVariant};
use crate::paint::hex;
use crate::typography::{draw_text, Fonts, HAlign, VAlign};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use rusttype::Scale;
use std::time::SystemTime;
use tracing::info;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

// Segment order: top, upper right, lower right, bottom, lower left, upper left, middle
const DIGIT_SEGMENTS: [[bool; 7]; 10] = [
    [true, true, true, true, true, true, false],
    [false, true, true, false, false, false, false],
    [true, true, false, true, true, false, true],
    [true, true, true, true, false, false, true],
    [false, true, true, false, false, true, true],
    [true, false, true, true, false, true, true],
    [true, false, true, true, true, true, true],
    [true, true, true, false, false, false, false],
    [true, true, true, true, true, true, true],
    [true, true, true, true, false, true, true],
];

/// Labeled stand-in photos used when running without a camera
///
/// Frame `i` (1-based) shows its number in white on an alternating dark
/// background, so strips and animations built from them show their order.
pub fn placeholder_frames(
    count: usize,
    size: u32,
    fonts: &Fonts,
) -> Result<Vec<CapturedFrame>, CompositionError> {
    let captured_at = SystemTime::now();
    let frames = (1..=count)
        .map(|index| {
            let image = render_placeholder(index, size, fonts);
            CapturedFrame::from_image(index, captured_at, &image, FrameVariant::Original)
        })
        .collect::<Result<Vec<_>, _>>()?;

    info!("Generated {} placeholder frames at {}px", frames.len(), size);
    Ok(frames)
}

/// One placeholder raster; identical inputs give identical pixels
pub fn render_placeholder(index: usize, size: u32, fonts: &Fonts) -> RgbaImage {
    // Odd photos (even zero-based slots) get the lighter grey
    let background = if index % 2 == 1 { hex(0x333333) } else { hex(0x111111) };
    let mut image = RgbaImage::from_pixel(size, size, background);
    let centre = size as f32 / 2.0;
    let label = index.to_string();

    match fonts.mono() {
        Some(font) => {
            let unit = size as f32 / 480.0;
            draw_text(
                &mut image,
                font,
                Scale::uniform(80.0 * unit),
                WHITE,
                &label,
                centre,
                centre,
                HAlign::Center,
                VAlign::Middle,
            );
            draw_text(
                &mut image,
                font,
                Scale::uniform(20.0 * unit),
                WHITE,
                "TEST IMAGE",
                centre,
                centre + 60.0 * unit,
                HAlign::Center,
                VAlign::Middle,
            );
        }
        None => draw_segment_number(&mut image, &label, size),
    }

    image
}

fn draw_segment_number(image: &mut RgbaImage, label: &str, size: u32) {
    let digit_h = (size as f32 * 0.19) as i32;
    let digit_w = digit_h / 2 + 4;
    let stroke = (digit_h / 7).max(1);
    let spacing = stroke * 2;

    let digits: Vec<usize> = label
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();
    let total_w = digits.len() as i32 * digit_w + (digits.len() as i32 - 1).max(0) * spacing;
    let mut x = (size as i32 - total_w) / 2;
    let y = (size as i32 - digit_h) / 2;

    for digit in digits {
        draw_segment_digit(image, digit, x, y, digit_w, digit_h, stroke);
        x += digit_w + spacing;
    }
}

fn draw_segment_digit(image: &mut RgbaImage, digit: usize, x: i32, y: i32, w: i32, h: i32, t: i32) {
    let half = h / 2;
    let segments = [
        Rect::at(x, y).of_size(w as u32, t as u32),
        Rect::at(x + w - t, y).of_size(t as u32, (half + t / 2) as u32),
        Rect::at(x + w - t, y + half - t / 2).of_size(t as u32, (half + t / 2) as u32),
        Rect::at(x, y + h - t).of_size(w as u32, t as u32),
        Rect::at(x, y + half - t / 2).of_size(t as u32, (half + t / 2) as u32),
        Rect::at(x, y).of_size(t as u32, (half + t / 2) as u32),
        Rect::at(x, y + half - t / 2).of_size(w as u32, t as u32),
    ];

    for (on, rect) in DIGIT_SEGMENTS[digit % 10].iter().zip(segments) {
        if *on {
            draw_filled_rect_mut(image, rect, WHITE);
        }
    }
}
