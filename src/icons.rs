//! Condition icon lookup and PNG encoding

use std::collections::HashMap;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, Rgba, RgbaImage};
use parking_lot::Mutex;
use tracing::trace;

use crate::Result;
use crate::types::WeatherCondition;

/// Produces the small PNG pushed alongside a snapshot.
pub trait IconSource: Send + Sync + 'static {
    fn icon_png(&self, condition: WeatherCondition) -> Result<Arc<[u8]>>;
}

/// Procedurally drawn condition glyphs.
///
/// Each condition gets a disc in its own colour, with a band across the lower half
/// for precipitation. Encoded icons are memoized per condition.
#[derive(Debug)]
pub struct GlyphIcons {
    size: u32,
    encoded: Mutex<HashMap<WeatherCondition, Arc<[u8]>>>,
}

impl Default for GlyphIcons {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl GlyphIcons {
    pub const DEFAULT_SIZE: u32 = 48;

    pub fn new(size: u32) -> Self {
        Self { size: size.max(8), encoded: Mutex::new(HashMap::new()) }
    }

    /// Icon edge length in pixels
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Draw the glyph for `condition` without encoding it
    pub fn render(&self, condition: WeatherCondition) -> RgbaImage {
        let (disc, band) = palette(condition);
        let size = self.size as f32;
        let center = size / 2.0;
        let radius = size * 0.42;

        RgbaImage::from_fn(self.size, self.size, |x, y| {
            let dx = x as f32 + 0.5 - center;
            let dy = y as f32 + 0.5 - center;
            if dx * dx + dy * dy > radius * radius {
                return Rgba([0, 0, 0, 0]);
            }
            match band {
                Some(band) if (y as f32) > center && (y / 3) % 2 == 0 => band,
                _ => disc,
            }
        })
    }
}

impl IconSource for GlyphIcons {
    fn icon_png(&self, condition: WeatherCondition) -> Result<Arc<[u8]>> {
        if let Some(cached) = self.encoded.lock().get(&condition) {
            return Ok(Arc::clone(cached));
        }

        let bytes: Arc<[u8]> = encode_png(&self.render(condition))?.into();
        trace!(condition = condition.as_str(), bytes = bytes.len(), "Encoded condition icon");
        self.encoded.lock().insert(condition, Arc::clone(&bytes));
        Ok(bytes)
    }
}

/// Encode an RGBA image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

fn palette(condition: WeatherCondition) -> (Rgba<u8>, Option<Rgba<u8>>) {
    const RAIN: Rgba<u8> = Rgba([66, 133, 244, 255]);
    const SNOW: Rgba<u8> = Rgba([240, 244, 255, 255]);
    match condition {
        WeatherCondition::Clear => (Rgba([255, 193, 7, 255]), None),
        WeatherCondition::LightClouds => (Rgba([255, 213, 79, 255]), Some(Rgba([207, 216, 220, 255]))),
        WeatherCondition::Clouds => (Rgba([176, 190, 197, 255]), None),
        WeatherCondition::Fog => (Rgba([144, 164, 174, 255]), Some(Rgba([207, 216, 220, 255]))),
        WeatherCondition::LightRain => (Rgba([176, 190, 197, 255]), Some(RAIN)),
        WeatherCondition::Rain => (Rgba([120, 144, 156, 255]), Some(RAIN)),
        WeatherCondition::Snow => (Rgba([176, 190, 197, 255]), Some(SNOW)),
        WeatherCondition::Storm => (Rgba([84, 110, 122, 255]), Some(Rgba([255, 235, 59, 255]))),
    }
}
