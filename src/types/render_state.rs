//! Render-ready state read by the paint routine

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use image::io::{Limits, Reader};
use image::{ImageFormat, RgbaImage};

use crate::{Result, SyncError};

/// Default cap on decoded icon width and height
pub const MAX_ICON_DIMENSION: u32 = 512;

/// Display text shown before any snapshot has been committed
pub const NO_DATA: &str = "no data";

/// Decoded condition icon.
///
/// Cloning shares the pixel buffer.
#[derive(Clone)]
pub struct Icon {
    image: Arc<RgbaImage>,
}

impl Icon {
    /// Decode PNG bytes into an RGBA icon, capped at [`MAX_ICON_DIMENSION`]
    pub fn decode_png(bytes: &[u8]) -> Result<Self> {
        Self::decode_png_limited(bytes, MAX_ICON_DIMENSION)
    }

    /// Decode PNG bytes, rejecting images wider or taller than `max_dimension`.
    ///
    /// Dimensions are checked from the header before pixel buffers are allocated.
    pub fn decode_png_limited(bytes: &[u8], max_dimension: u32) -> Result<Self> {
        let mut limits = Limits::default();
        limits.max_image_width = Some(max_dimension);
        limits.max_image_height = Some(max_dimension);
        // Worst case is 16-bit RGBA
        limits.max_alloc = Some(u64::from(max_dimension) * u64::from(max_dimension) * 8);

        let mut reader = Reader::with_format(Cursor::new(bytes), ImageFormat::Png);
        reader.limits(limits);
        let decoded = reader.decode().map_err(|e| SyncError::AssetResolution {
            reason: "icon bytes are not a decodable PNG within the size limits".to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(Self::from_image(decoded.to_rgba8()))
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image: Arc::new(image) }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Underlying pixel buffer
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl PartialEq for Icon {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image) || *self.image == *other.image
    }
}

impl fmt::Debug for Icon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Icon").field("width", &self.width()).field("height", &self.height()).finish()
    }
}

/// What the face shows for weather.
///
/// Text and icon always come from the same commit; the cache never exposes a
/// state mixing fields of two different pushes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    display_text: String,
    icon: Option<Icon>,
    sent_at_millis: Option<i64>,
}

impl RenderState {
    /// Initial state before the first sync
    pub fn no_data() -> Self {
        Self { display_text: NO_DATA.to_string(), icon: None, sent_at_millis: None }
    }

    pub fn new(display_text: impl Into<String>, icon: Option<Icon>) -> Self {
        Self { display_text: display_text.into(), icon, sent_at_millis: None }
    }

    /// Attach the producer timestamp carried by the push
    pub fn with_sent_at(mut self, sent_at_millis: Option<i64>) -> Self {
        self.sent_at_millis = sent_at_millis;
        self
    }

    /// `"high/low"` or [`NO_DATA`]
    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn icon(&self) -> Option<&Icon> {
        self.icon.as_ref()
    }

    pub fn sent_at_millis(&self) -> Option<i64> {
        self.sent_at_millis
    }

    /// Whether any snapshot text has been committed
    pub fn has_data(&self) -> bool {
        self.display_text != NO_DATA
    }

    /// Same icon, new text. Used for text-only degraded commits.
    pub(crate) fn with_text(&self, display_text: String, sent_at_millis: Option<i64>) -> Self {
        Self { display_text, icon: self.icon.clone(), sent_at_millis }
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::no_data()
    }
}

/// Compose the display line from formatted high and low
pub fn compose_display_text(high: &str, low: &str) -> String {
    format!("{}/{}", high, low)
}
