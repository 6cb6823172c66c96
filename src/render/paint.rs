//! Pure paint routine: time, date, divider, weather row

use chrono::{DateTime, FixedOffset};

use super::surface::{Color, Paint, Rect, Surface};
use crate::types::RenderState;

/// Device and mode flags that change how the face is drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceStyle {
    pub ambient: bool,
    /// Display supports fewer bits per pixel in ambient mode
    pub low_bit_ambient: bool,
    pub burn_in_protection: bool,
    pub is_round: bool,
}

impl FaceStyle {
    /// Low-bit panels cannot show blended edges in ambient mode
    pub fn anti_alias(&self) -> bool {
        !(self.ambient && self.low_bit_ambient)
    }

    fn background(&self) -> Color {
        if self.ambient { Color::BLACK } else { Color::BACKGROUND }
    }

    fn show_icon(&self) -> bool {
        !(self.ambient && self.burn_in_protection)
    }
}

/// Fixed metrics of the face layout, in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub y_offset: f32,
    pub line_height: f32,
    pub time_size: f32,
    pub time_size_round: f32,
    pub small_size: f32,
    pub divider_leg: f32,
    pub icon_size: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            y_offset: 80.0,
            line_height: 32.0,
            time_size: 40.0,
            time_size_round: 45.0,
            small_size: 20.0,
            divider_leg: 30.0,
            icon_size: 40.0,
        }
    }
}

/// Everything one paint needs, captured before drawing starts
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub local_time: DateTime<FixedOffset>,
    pub state: &'a RenderState,
    pub style: FaceStyle,
    pub no_data_label: &'a str,
}

/// `HH:MM`, 24-hour
pub fn format_time(local_time: &DateTime<FixedOffset>) -> String {
    local_time.format("%H:%M").to_string()
}

/// e.g. `SUN, OCT 18 2026`
pub fn format_date(local_time: &DateTime<FixedOffset>) -> String {
    local_time.format("%a, %b %d %Y").to_string().to_uppercase()
}

/// Draw one frame. Reads only `frame`; never blocks.
pub fn paint(surface: &mut dyn Surface, bounds: Rect, frame: &Frame<'_>, layout: &Layout) {
    let style = frame.style;
    let anti_alias = style.anti_alias();
    let mid = bounds.center_x();
    let mut y = bounds.y + layout.y_offset;

    let time_size = if style.is_round { layout.time_size_round } else { layout.time_size };
    let primary = Paint::new(Color::WHITE, time_size, anti_alias);
    let secondary = Paint::new(Color::TEXT_70, layout.small_size, anti_alias);
    let weather = Paint::new(Color::WHITE, layout.small_size, anti_alias);

    surface.fill(style.background());

    let time = format_time(&frame.local_time);
    draw_centered(surface, &time, mid, y, &primary);
    y += layout.line_height;

    let date = format_date(&frame.local_time);
    draw_centered(surface, &date, mid, y, &secondary);
    y += layout.line_height;

    let divider = Paint::new(Color::TEXT_70, 1.0, anti_alias);
    surface.draw_line((mid - layout.divider_leg, y), (mid + layout.divider_leg, y), &divider);
    y += layout.line_height;

    let state = frame.state;
    let text_y = y + 10.0;
    match state.icon() {
        Some(icon) if style.show_icon() => {
            let half = layout.icon_size / 2.0;
            let dest = Rect::new(mid - 60.0, y - half, layout.icon_size, layout.icon_size);
            surface.draw_icon(icon, dest);
            surface.draw_text(state.display_text(), mid - 20.0, text_y, &weather);
        }
        _ if state.has_data() => draw_centered(surface, state.display_text(), mid, text_y, &weather),
        _ => draw_centered(surface, frame.no_data_label, mid, text_y, &weather),
    }
}

fn draw_centered(surface: &mut dyn Surface, text: &str, mid: f32, y: f32, paint: &Paint) {
    let width = surface.measure_text(text, paint);
    surface.draw_text(text, mid - width / 2.0, y, paint);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DrawOp, RecordingSurface, fixture_local_time, solid_icon};

    fn draw(state: &RenderState, style: FaceStyle) -> RecordingSurface {
        let mut surface = RecordingSurface::default();
        let frame = Frame {
            local_time: fixture_local_time(),
            state,
            style,
            no_data_label: "Set Location in app",
        };
        paint(&mut surface, Rect::square(320.0), &frame, &Layout::default());
        surface
    }

    #[test]
    fn formats_time_and_uppercased_date() {
        let t = fixture_local_time();
        assert_eq!(format_time(&t), "09:05");
        assert_eq!(format_date(&t), "SUN, OCT 18 2026");
    }

    #[test]
    fn no_data_paints_the_prompt() {
        let surface = draw(&RenderState::no_data(), FaceStyle::default());
        assert_eq!(surface.texts(), vec!["09:05", "SUN, OCT 18 2026", "Set Location in app"]);
        assert_eq!(surface.icons(), 0);
        assert_eq!(surface.ops()[0], DrawOp::Fill(Color::BACKGROUND));
    }

    #[test]
    fn icon_and_text_are_painted_together() {
        let state = RenderState::new("24°/13°", Some(solid_icon(48, [255, 193, 7, 255])));
        let surface = draw(&state, FaceStyle::default());
        assert_eq!(surface.texts().last().copied(), Some("24°/13°"));
        assert_eq!(surface.icons(), 1);
    }

    #[test]
    fn text_without_icon_is_centered() {
        let surface = draw(&RenderState::new("75°/60°", None), FaceStyle::default());
        let op = surface.ops().last().cloned().unwrap();
        let DrawOp::Text { text, x, .. } = op else { panic!("expected text, got {op:?}") };
        assert_eq!(text, "75°/60°");
        let width = RecordingSurface::default().measure_text("75°/60°", &Paint::new(Color::WHITE, 20.0, true));
        assert_eq!(x, 160.0 - width / 2.0);
    }

    #[test]
    fn low_bit_ambient_disables_anti_alias() {
        let style = FaceStyle { ambient: true, low_bit_ambient: true, ..FaceStyle::default() };
        let surface = draw(&RenderState::no_data(), style);
        assert_eq!(surface.ops()[0], DrawOp::Fill(Color::BLACK));
        assert!(surface.paints().iter().all(|p| !p.anti_alias));

        let interactive = draw(&RenderState::no_data(), FaceStyle { low_bit_ambient: true, ..FaceStyle::default() });
        assert!(interactive.paints().iter().all(|p| p.anti_alias));
    }

    #[test]
    fn round_screens_use_larger_time_text() {
        let surface = draw(&RenderState::no_data(), FaceStyle { is_round: true, ..FaceStyle::default() });
        assert_eq!(surface.paints()[0].size, Layout::default().time_size_round);
    }

    #[test]
    fn burn_in_protection_hides_icon_in_ambient() {
        let state = RenderState::new("24°/13°", Some(solid_icon(48, [255, 193, 7, 255])));
        let style = FaceStyle { ambient: true, burn_in_protection: true, ..FaceStyle::default() };
        let surface = draw(&state, style);
        assert_eq!(surface.icons(), 0);
        assert_eq!(surface.texts().last().copied(), Some("24°/13°"));
    }
}
