//! Drawing target the face paints onto

use crate::types::Icon;

/// RGBA colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    /// Secondary text, 70% white
    pub const TEXT_70: Color = Color([179, 179, 179, 255]);
    /// Face background in interactive mode
    pub const BACKGROUND: Color = Color([3, 169, 244, 255]);
}

/// Pixel-space rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Square of side `size` at the origin
    pub fn square(size: f32) -> Self {
        Self::new(0.0, 0.0, size, size)
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Style for a text or line draw call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    /// Text size in pixels; stroke width for lines
    pub size: f32,
    pub anti_alias: bool,
}

impl Paint {
    pub fn new(color: Color, size: f32, anti_alias: bool) -> Self {
        Self { color, size, anti_alias }
    }
}

/// Host canvas.
///
/// Calls are made from within [`WatchFace::on_draw`](super::WatchFace::on_draw)
/// and must not block.
pub trait Surface {
    /// Fill the whole surface
    fn fill(&mut self, color: Color);

    /// Advance width of `text` at `paint`'s size
    fn measure_text(&self, text: &str, paint: &Paint) -> f32;

    /// Draw `text` with its baseline starting at (`x`, `y`)
    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint);

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), paint: &Paint);

    /// Draw `icon` scaled into `dest`
    fn draw_icon(&mut self, icon: &Icon, dest: Rect);
}
