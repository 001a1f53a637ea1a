mod background;
mod compositor;
mod decorations;
mod layout;

pub use compositor::{CompositeStrip, StripCompositor};
pub use decorations::{SidebarGlyph, StripTexts, SIDEBAR_GLYPHS};
pub use layout::{CellRect, DecorationAnchors, SidebarRect, StripLayout};
