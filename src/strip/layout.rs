use serde::Serialize;

/// Fixed grid geometry of a printed strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StripLayout {
    pub cell_size: u32,
    pub gap: u32,
    /// Reserved for the sidebar and its caption
    pub margin_left: u32,
    pub margin_top: u32,
    pub margin_bottom: u32,
    pub margin_right: u32,
    pub columns: u32,
}

impl Default for StripLayout {
    fn default() -> Self {
        Self {
            cell_size: 300,
            gap: 15,
            margin_left: 100,
            margin_top: 90,
            margin_bottom: 120,
            margin_right: 40,
            columns: 2,
        }
    }
}

/// Where one photo lands; `index` is the 1-based capture index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellRect {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub size: u32,
}

/// Left panel holding the glyph column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SidebarRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Fixed positions of the overlays drawn after the photos
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecorationAnchors {
    /// Top-left of the tag before rotation
    pub tag: (f32, f32),
    pub tag_rotation: f32,
    /// Top-left of the badge before rotation
    pub badge: (f32, f32),
    pub badge_rotation: f32,
    /// Right end of the timestamp baseline
    pub timestamp: (f32, f32),
    /// Right end of the caption baseline, before the -90 degree turn
    pub caption: (f32, f32),
}

impl StripLayout {
    pub fn rows(&self, frame_count: usize) -> u32 {
        (frame_count as u32).div_ceil(self.columns.max(1))
    }

    /// Canvas size for `frame_count` photos
    pub fn canvas_size(&self, frame_count: usize) -> (u32, u32) {
        let cols = self.columns;
        let rows = self.rows(frame_count);
        let width = self.margin_left + self.cell_size * cols + self.gap * cols.saturating_sub(1) + self.margin_right;
        let height =
            self.margin_top + self.cell_size * rows + self.gap * rows.saturating_sub(1) + self.margin_bottom;
        (width, height)
    }

    /// Cell for the photo at zero-based `slot`
    pub fn cell(&self, slot: usize) -> CellRect {
        let cols = self.columns.max(1) as usize;
        let col = (slot % cols) as i32;
        let row = (slot / cols) as i32;
        let stride = (self.cell_size + self.gap) as i32;
        CellRect {
            index: slot + 1,
            x: self.margin_left as i32 + col * stride,
            y: self.margin_top as i32 + row * stride,
            size: self.cell_size,
        }
    }

    pub fn cells(&self, frame_count: usize) -> Vec<CellRect> {
        (0..frame_count).map(|slot| self.cell(slot)).collect()
    }

    pub fn sidebar(&self) -> SidebarRect {
        SidebarRect {
            x: 25,
            y: self.margin_top as i32,
            width: 50,
            height: self.cell_size * 2,
        }
    }

    /// Centres of the sidebar glyphs that fit inside the panel
    pub fn glyph_centres(&self, glyph_count: usize) -> Vec<(i32, i32)> {
        let sidebar = self.sidebar();
        let centre_x = sidebar.x + sidebar.width as i32 / 2;
        let limit = sidebar.y + sidebar.height as i32 - 10;
        (0..glyph_count as i32)
            .map(|i| (centre_x, sidebar.y + 35 + i * 50))
            .filter(|&(_, y)| y < limit)
            .collect()
    }

    pub fn anchors(&self, frame_count: usize) -> DecorationAnchors {
        let (width, height) = self.canvas_size(frame_count);
        let sidebar = self.sidebar();
        DecorationAnchors {
            tag: (540.0, 70.0),
            tag_rotation: 0.08,
            badge: (80.0, 660.0),
            badge_rotation: -0.15,
            timestamp: (width as f32 - 40.0, height as f32 - 40.0),
            caption: (
                sidebar.x as f32 + sidebar.width as f32 / 2.0,
                (sidebar.y + sidebar.height as i32 + 60) as f32,
            ),
        }
    }
}
