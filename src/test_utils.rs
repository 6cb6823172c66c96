//! Fixtures and fakes shared by unit tests, integration tests and benches
//!
//! Everything here is deterministic: a controllable clock, an in-memory asset
//! resolver, a surface that records draw calls, and pre-wired sessions on a
//! [`LocalHub`].

#![cfg(any(test, feature = "benchmark"))]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::builder::SnapshotBuilder;
use crate::cache::RenderCache;
use crate::clock::Clock;
use crate::config::TransportConfig;
use crate::icons::{GlyphIcons, IconSource};
use crate::render::{Color, Paint, Rect, Surface};
use crate::session::{ConsumerSession, ProducerSession};
use crate::store::MemoryWeatherStore;
use crate::transport::AssetResolver;
use crate::transports::{LocalHub, LocalTransport};
use crate::types::{
    Asset, AssetRef, Icon, PushMessage, TemperatureUnit, WEATHER_DATA_HIGH, WEATHER_DATA_ICON,
    WEATHER_DATA_LOW, WEATHER_DATA_PATH, WEATHER_DATA_TIME, WeatherCondition,
};
use crate::{Result, SyncError};

/// 2026-10-18T12:00:00Z
pub const FIXTURE_NOON_MILLIS: i64 = 1_792_324_800_000;

/// The calendar day all fixtures live on
pub fn fixture_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid fixture date")
}

/// 2026-10-18 09:05 at UTC+0
pub fn fixture_local_time() -> DateTime<FixedOffset> {
    let utc = FixedOffset::east_opt(0).expect("zero offset");
    utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 0).single().expect("valid fixture time")
}

/// Clock under test control.
///
/// Either fixed (moved only by [`advance_millis`](Self::advance_millis)) or
/// following tokio's clock from a base, so paused-time tests see wall-clock
/// millis move with `tokio::time::sleep`.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
    offset_secs: AtomicI32,
    anchor: Option<tokio::time::Instant>,
}

impl ManualClock {
    pub fn new(millis: i64) -> Self {
        Self { millis: AtomicI64::new(millis), offset_secs: AtomicI32::new(0), anchor: None }
    }

    pub fn at_fixture_noon() -> Self {
        Self::new(FIXTURE_NOON_MILLIS)
    }

    /// Starts at `base_millis` and advances with `tokio::time::Instant`
    pub fn following_tokio(base_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(base_millis),
            offset_secs: AtomicI32::new(0),
            anchor: Some(tokio::time::Instant::now()),
        }
    }

    pub fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set_offset_hours(&self, hours: i32) {
        self.offset_secs.store(hours * 3600, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        let elapsed = self.anchor.map(|anchor| anchor.elapsed().as_millis() as i64).unwrap_or(0);
        self.millis.load(Ordering::SeqCst) + elapsed
    }

    fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.offset_secs.load(Ordering::SeqCst)).expect("offset within a day")
    }
}

/// PNG bytes of the clear-sky glyph
pub fn fixture_icon_png() -> Vec<u8> {
    GlyphIcons::default().icon_png(WeatherCondition::Clear).expect("glyph encodes").to_vec()
}

/// Square single-colour icon; the size doubles as an identity in tests
pub fn solid_icon(size: u32, rgba: [u8; 4]) -> Icon {
    Icon::from_image(RgbaImage::from_pixel(size, size, Rgba(rgba)))
}

/// Outbound weather item carrying the fixture icon
pub fn weather_push(high: &str, low: &str, sent_at_millis: i64) -> PushMessage<Asset> {
    PushMessage::new(WEATHER_DATA_PATH)
        .put_asset(WEATHER_DATA_ICON, Asset::from_bytes(fixture_icon_png()))
        .put_text(WEATHER_DATA_HIGH, high)
        .put_text(WEATHER_DATA_LOW, low)
        .put_long(WEATHER_DATA_TIME, sent_at_millis)
        .set_urgent()
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "condition not reached within 2s");
}

/// In-memory asset table
#[derive(Debug, Default)]
pub struct MapResolver {
    assets: Mutex<HashMap<u64, Arc<[u8]>>>,
    next_key: AtomicU64,
}

impl MapResolver {
    pub fn insert(&self, bytes: Vec<u8>) -> AssetRef {
        let key = self.next_key.fetch_add(1, Ordering::SeqCst) + 1;
        self.assets.lock().insert(key, bytes.into());
        AssetRef::new(key, 0)
    }
}

#[async_trait::async_trait]
impl AssetResolver for MapResolver {
    async fn resolve_asset(&self, asset: &AssetRef, _timeout: Duration) -> Result<Arc<[u8]>> {
        self.assets
            .lock()
            .get(&asset.key())
            .cloned()
            .ok_or_else(|| SyncError::asset_resolution(format!("unknown asset key {}", asset.key())))
    }
}

/// One recorded draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill(Color),
    Text { text: String, x: f32, y: f32, paint: Paint },
    Line { from: (f32, f32), to: (f32, f32), paint: Paint },
    Icon { width: u32, height: u32, dest: Rect },
}

/// Surface that records instead of rasterizing.
///
/// Text advance is half the text size per character.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    ops: Vec<DrawOp>,
}

impl RecordingSurface {
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn icons(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, DrawOp::Icon { .. })).count()
    }

    /// Paints of text and line calls, in draw order
    pub fn paints(&self) -> Vec<Paint> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { paint, .. } | DrawOp::Line { paint, .. } => Some(*paint),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl Surface for RecordingSurface {
    fn fill(&mut self, color: Color) {
        self.ops.push(DrawOp::Fill(color));
    }

    fn measure_text(&self, text: &str, paint: &Paint) -> f32 {
        text.chars().count() as f32 * paint.size * 0.5
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint) {
        self.ops.push(DrawOp::Text { text: text.to_string(), x, y, paint: *paint });
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), paint: &Paint) {
        self.ops.push(DrawOp::Line { from, to, paint: *paint });
    }

    fn draw_icon(&mut self, icon: &Icon, dest: Rect) {
        self.ops.push(DrawOp::Icon { width: icon.width(), height: icon.height(), dest });
    }
}

/// Producer session on a fresh hub with an empty store
pub struct ProducerFixture {
    pub hub: LocalHub,
    pub producer: ProducerSession<LocalTransport>,
    pub store: Arc<MemoryWeatherStore>,
    pub clock: Arc<ManualClock>,
}

pub fn producer_fixture() -> ProducerFixture {
    let hub = LocalHub::new();
    let store = Arc::new(MemoryWeatherStore::new());
    let clock = Arc::new(ManualClock::at_fixture_noon());
    let builder = SnapshotBuilder::new(
        store.clone(),
        Arc::new(GlyphIcons::default()),
        clock.clone(),
        TemperatureUnit::Metric,
    );
    let producer = ProducerSession::new(hub.endpoint("phone"), builder, &TransportConfig::default());
    ProducerFixture { hub, producer, store, clock }
}

/// Consumer session ("watch") plus a bare "phone" endpoint on the same hub
pub struct ConsumerFixture {
    pub hub: LocalHub,
    pub phone: LocalTransport,
    pub consumer: ConsumerSession<LocalTransport>,
    pub cache: RenderCache,
}

pub fn consumer_fixture(config: TransportConfig) -> ConsumerFixture {
    let hub = LocalHub::new();
    let phone = hub.endpoint("phone");
    let cache = RenderCache::new();
    let consumer = ConsumerSession::new(hub.endpoint("watch"), cache.clone(), &config);
    ConsumerFixture { hub, phone, consumer, cache }
}
