use super::layout::{CellRect, DecorationAnchors, SidebarRect, StripLayout};
use crate::paint::{
    draw_layer_rotated, fill_rounded_rect, hex, stroke_rect, stroke_rounded_rect, with_alpha, RoundedRect,
};
use crate::typography::{draw_text, text_layer, text_width, Fonts, HAlign, VAlign};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;
use rusttype::Scale;
use std::f32::consts::FRAC_PI_2;

const NAVY: u32 = 0x1e3a8a;
const WHITE: u32 = 0xffffff;
const BLACK: u32 = 0x000000;
const TAG_FILL: u32 = 0xfef08a;
const BADGE_FILL: u32 = 0xfbcfe8;
const BADGE_INK: u32 = 0xbe185d;

const CELL_BORDER: u32 = 3;
const TAG_HEIGHT: f32 = 50.0;
const BADGE_SIZE: (f32, f32) = (120.0, 90.0);

/// Glyphs running down the sidebar, top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarGlyph {
    Camera,
    Heart,
    Bear,
    Rose,
    Kiss,
    Sparkle,
}

pub const SIDEBAR_GLYPHS: [SidebarGlyph; 6] = [
    SidebarGlyph::Camera,
    SidebarGlyph::Heart,
    SidebarGlyph::Bear,
    SidebarGlyph::Rose,
    SidebarGlyph::Kiss,
    SidebarGlyph::Sparkle,
];

/// Words burned into a strip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripTexts {
    pub caption: String,
    pub tag: String,
    pub badge_lines: Vec<String>,
}

impl Default for StripTexts {
    fn default() -> Self {
        Self {
            caption: "Champ & Oui.".to_string(),
            tag: "Valentine Day".to_string(),
            badge_lines: vec!["For".to_string(), "You".to_string()],
        }
    }
}

/// Bordered panel, glyph column and the rotated caption below it
pub fn draw_sidebar(img: &mut RgbaImage, layout: &StripLayout, anchors: &DecorationAnchors, fonts: &Fonts, caption: &str) {
    let sidebar = layout.sidebar();
    draw_panel(img, &sidebar);

    for (glyph, (cx, cy)) in SIDEBAR_GLYPHS.iter().zip(layout.glyph_centres(SIDEBAR_GLYPHS.len())) {
        draw_glyph(img, *glyph, cx, cy);
    }

    if let Some(font) = fonts.mono() {
        let (layer, origin) = text_layer(font, Scale::uniform(28.0), hex(NAVY), caption, HAlign::Right);
        draw_layer_rotated(img, &layer, origin, anchors.caption, -FRAC_PI_2);
    }
}

fn draw_panel(img: &mut RgbaImage, sidebar: &SidebarRect) {
    draw_filled_rect_mut(
        img,
        Rect::at(sidebar.x, sidebar.y).of_size(sidebar.width, sidebar.height),
        hex(WHITE),
    );
    stroke_rect(img, sidebar.x, sidebar.y, sidebar.width, sidebar.height, 2, hex(NAVY));
}

/// One photo in its white frame with a faint inner stroke
pub fn draw_cell(img: &mut RgbaImage, cell: &CellRect, photo: &RgbaImage) {
    let border = CELL_BORDER as i32;
    draw_filled_rect_mut(
        img,
        Rect::at(cell.x - border, cell.y - border).of_size(cell.size + CELL_BORDER * 2, cell.size + CELL_BORDER * 2),
        hex(WHITE),
    );

    if photo.dimensions() == (cell.size, cell.size) {
        imageops::overlay(img, photo, cell.x as i64, cell.y as i64);
    } else {
        let scaled = imageops::resize(photo, cell.size, cell.size, FilterType::Triangle);
        imageops::overlay(img, &scaled, cell.x as i64, cell.y as i64);
    }

    stroke_rect(img, cell.x, cell.y, cell.size, cell.size, 1, with_alpha(hex(BLACK), 0.1));
}

/// Tag, badge and timestamp, drawn on top of the photos
pub fn draw_overlays(img: &mut RgbaImage, anchors: &DecorationAnchors, fonts: &Fonts, texts: &StripTexts, timestamp: &str) {
    draw_tag(img, anchors, fonts, &texts.tag);
    draw_badge(img, anchors, fonts, &texts.badge_lines);

    if let Some(font) = fonts.mono() {
        draw_text(
            img,
            font,
            Scale::uniform(20.0),
            hex(NAVY),
            timestamp,
            anchors.timestamp.0,
            anchors.timestamp.1,
            HAlign::Right,
            VAlign::Alphabetic,
        );
    }
}

/// Rounded yellow label with a double outline
fn draw_tag(img: &mut RgbaImage, anchors: &DecorationAnchors, fonts: &Fonts, text: &str) {
    let scale = Scale::uniform(24.0);
    let text_w = match fonts.sans() {
        Some(font) => text_width(font, scale, text),
        None => 160.0,
    };
    let tag_w = text_w + 40.0;
    let pad = 4.0;

    let mut layer = RgbaImage::new((tag_w + pad * 2.0).ceil() as u32, (TAG_HEIGHT + pad * 2.0).ceil() as u32);
    let outline = RoundedRect::new(pad, pad, tag_w, TAG_HEIGHT, 25.0);
    fill_rounded_rect(&mut layer, outline, hex(TAG_FILL));
    stroke_rounded_rect(&mut layer, outline, 3.0, hex(BLACK));
    stroke_rounded_rect(
        &mut layer,
        RoundedRect::new(pad + 5.0, pad + 5.0, tag_w - 10.0, TAG_HEIGHT - 10.0, 20.0),
        1.0,
        with_alpha(hex(BLACK), 0.2),
    );

    if let Some(font) = fonts.sans() {
        draw_text(
            &mut layer,
            font,
            scale,
            hex(BLACK),
            text,
            pad + tag_w / 2.0,
            pad + TAG_HEIGHT / 2.0 + 2.0,
            HAlign::Center,
            VAlign::Middle,
        );
    }

    draw_layer_rotated(img, &layer, (pad, pad), anchors.tag, anchors.tag_rotation);
}

/// Pink box with stacked words
fn draw_badge(img: &mut RgbaImage, anchors: &DecorationAnchors, fonts: &Fonts, lines: &[String]) {
    let (badge_w, badge_h) = BADGE_SIZE;
    let pad = 4.0;

    let mut layer = RgbaImage::new((badge_w + pad * 2.0) as u32, (badge_h + pad * 2.0) as u32);
    let outline = RoundedRect::new(pad, pad, badge_w, badge_h, 15.0);
    fill_rounded_rect(&mut layer, outline, hex(BADGE_FILL));
    stroke_rounded_rect(&mut layer, outline, 3.0, hex(BADGE_INK));

    if let Some(font) = fonts.sans() {
        for (i, line) in lines.iter().enumerate() {
            draw_text(
                &mut layer,
                font,
                Scale::uniform(24.0),
                hex(BADGE_INK),
                line,
                pad + badge_w / 2.0,
                pad + badge_h / 2.0 - 12.0 + 30.0 * i as f32,
                HAlign::Center,
                VAlign::Alphabetic,
            );
        }
    }

    draw_layer_rotated(img, &layer, (pad, pad), anchors.badge, anchors.badge_rotation);
}

/// Roughly 24 px pictogram centred on `(cx, cy)`
pub fn draw_glyph(img: &mut RgbaImage, glyph: SidebarGlyph, cx: i32, cy: i32) {
    match glyph {
        SidebarGlyph::Camera => {
            draw_filled_rect_mut(img, Rect::at(cx - 12, cy - 7).of_size(24, 16), hex(0x374151));
            draw_filled_rect_mut(img, Rect::at(cx - 5, cy - 10).of_size(10, 4), hex(0x374151));
            draw_filled_circle_mut(img, (cx, cy + 1), 6, hex(0xe5e7eb));
            draw_filled_circle_mut(img, (cx, cy + 1), 3, hex(0x1f2937));
        }
        SidebarGlyph::Heart => draw_heart(img, cx, cy, 11, hex(0xec4899)),
        SidebarGlyph::Bear => {
            let fur = hex(0xb45309);
            draw_filled_circle_mut(img, (cx - 8, cy - 8), 4, fur);
            draw_filled_circle_mut(img, (cx + 8, cy - 8), 4, fur);
            draw_filled_circle_mut(img, (cx, cy), 10, fur);
            draw_filled_ellipse_mut(img, (cx, cy + 4), 5, 4, hex(0xfde68a));
            draw_filled_circle_mut(img, (cx - 4, cy - 3), 1, hex(BLACK));
            draw_filled_circle_mut(img, (cx + 4, cy - 3), 1, hex(BLACK));
            draw_filled_circle_mut(img, (cx, cy + 3), 1, hex(BLACK));
        }
        SidebarGlyph::Rose => {
            draw_filled_rect_mut(img, Rect::at(cx - 1, cy).of_size(3, 12), hex(0x15803d));
            draw_filled_ellipse_mut(img, (cx + 5, cy + 6), 4, 2, hex(0x16a34a));
            draw_filled_circle_mut(img, (cx, cy - 4), 8, hex(0xdc2626));
            draw_filled_circle_mut(img, (cx, cy - 4), 4, hex(0x991b1b));
        }
        SidebarGlyph::Kiss => {
            draw_heart(img, cx - 5, cy - 5, 6, hex(0xf43f5e));
            draw_filled_ellipse_mut(img, (cx + 3, cy + 5), 9, 4, hex(0xe11d48));
            draw_filled_rect_mut(img, Rect::at(cx - 6, cy + 5).of_size(18, 1), hex(0x881337));
        }
        SidebarGlyph::Sparkle => {
            draw_star(img, cx, cy, 12, 3, hex(0xfacc15));
            draw_star(img, cx + 8, cy - 8, 5, 1, hex(0xfde047));
        }
    }
}

fn draw_heart(img: &mut RgbaImage, cx: i32, cy: i32, size: i32, color: Rgba<u8>) {
    let lobe = (size / 2).max(1);
    draw_filled_circle_mut(img, (cx - lobe, cy - lobe / 2), lobe, color);
    draw_filled_circle_mut(img, (cx + lobe, cy - lobe / 2), lobe, color);
    draw_polygon_mut(
        img,
        &[
            Point::new(cx - size, cy - lobe / 2 + 1),
            Point::new(cx + size, cy - lobe / 2 + 1),
            Point::new(cx, cy + size),
        ],
        color,
    );
}

/// Four-pointed star with tips `outer` and waist `inner` away from the centre
fn draw_star(img: &mut RgbaImage, cx: i32, cy: i32, outer: i32, inner: i32, color: Rgba<u8>) {
    draw_polygon_mut(
        img,
        &[
            Point::new(cx, cy - outer),
            Point::new(cx + inner, cy - inner),
            Point::new(cx + outer, cy),
            Point::new(cx + inner, cy + inner),
            Point::new(cx, cy + outer),
            Point::new(cx - inner, cy + inner),
            Point::new(cx - outer, cy),
            Point::new(cx - inner, cy - inner),
        ],
        color,
    );
}
