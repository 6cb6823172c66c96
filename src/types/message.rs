//! Wire entities exchanged over the sync transport

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Logical address of weather snapshots
pub const WEATHER_DATA_PATH: &str = "/WEATHER_DATA_PATH";
/// Icon asset field
pub const WEATHER_DATA_ICON: &str = "WEATHER_DATA_ICON";
/// Formatted daily high field
pub const WEATHER_DATA_HIGH: &str = "WEATHER_DATA_HIGH";
/// Formatted daily low field
pub const WEATHER_DATA_LOW: &str = "WEATHER_DATA_LOW";
/// Producer wall-clock timestamp field (millis)
pub const WEATHER_DATA_TIME: &str = "Time";

/// Binary asset attached by the producer.
///
/// Cloning is cheap; the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct Asset {
    data: Arc<[u8]>,
}

impl Asset {
    /// Wrap raw bytes as an asset
    pub fn from_bytes(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Asset payload
    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Asset").field("len", &self.data.len()).finish()
    }
}

/// Opaque handle to an asset, valid only on the connection that delivered it.
///
/// The `epoch` identifies that connection; transports reject references whose epoch
/// no longer matches the live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetRef {
    key: u64,
    epoch: u64,
}

impl AssetRef {
    /// Create a reference. Only transports should mint these.
    pub fn new(key: u64, epoch: u64) -> Self {
        Self { key, epoch }
    }

    /// Transport-side asset key
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Connection epoch the reference was issued on
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// A single field value in a data map
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<A> {
    Text(String),
    Asset(A),
    Long(i64),
}

impl<A> FieldValue<A> {
    /// Value as text, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Value as an asset, if it is one
    pub fn as_asset(&self) -> Option<&A> {
        match self {
            FieldValue::Asset(a) => Some(a),
            _ => None,
        }
    }

    /// Value as a long, if it is one
    pub fn as_long(&self) -> Option<i64> {
        match self {
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Asset(_) => "asset",
            FieldValue::Long(_) => "long",
        }
    }
}

/// Addressed key/value item.
///
/// Producers build `PushMessage<Asset>` (the default outbound form); transports
/// deliver `PushMessage<AssetRef>` to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage<A = Asset> {
    path: String,
    fields: BTreeMap<String, FieldValue<A>>,
    urgent: bool,
}

impl<A> PushMessage<A> {
    /// Create an empty, non-urgent message for `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), fields: BTreeMap::new(), urgent: false }
    }

    /// Logical address
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether delivery should bypass battery batching
    pub fn is_urgent(&self) -> bool {
        self.urgent
    }

    /// Mark the message urgent
    pub fn set_urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    pub fn put_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), FieldValue::Text(value.into()));
        self
    }

    pub fn put_asset(mut self, key: impl Into<String>, asset: A) -> Self {
        self.fields.insert(key.into(), FieldValue::Asset(asset));
        self
    }

    pub fn put_long(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.insert(key.into(), FieldValue::Long(value));
        self
    }

    /// Raw field lookup
    pub fn get(&self, key: &str) -> Option<&FieldValue<A>> {
        self.fields.get(key)
    }

    /// Text field lookup; `None` when absent or of another type
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    /// Asset field lookup; `None` when absent or of another type
    pub fn asset(&self, key: &str) -> Option<&A> {
        self.get(key).and_then(FieldValue::as_asset)
    }

    /// Long field lookup; `None` when absent or of another type
    pub fn long(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(FieldValue::as_long)
    }

    /// Type name of a present field, for diagnostics
    pub fn field_kind(&self, key: &str) -> Option<&'static str> {
        self.get(key).map(FieldValue::kind)
    }

    /// Iterate over fields in key order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue<A>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rebuild the message with a different asset representation.
    ///
    /// Transports use this to swap inline assets for references on delivery.
    pub fn map_assets<B>(self, mut f: impl FnMut(A) -> B) -> PushMessage<B> {
        let fields = self
            .fields
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    FieldValue::Text(s) => FieldValue::Text(s),
                    FieldValue::Long(n) => FieldValue::Long(n),
                    FieldValue::Asset(a) => FieldValue::Asset(f(a)),
                };
                (k, v)
            })
            .collect();
        PushMessage { path: self.path, fields, urgent: self.urgent }
    }
}

/// Kind of change a delivered event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEventKind {
    Changed,
    Deleted,
}

/// One delivered item, tagged with its address
#[derive(Debug, Clone)]
pub struct DataEvent {
    pub kind: DataEventKind,
    pub item: PushMessage<AssetRef>,
}

impl DataEvent {
    pub fn changed(item: PushMessage<AssetRef>) -> Self {
        Self { kind: DataEventKind::Changed, item }
    }

    pub fn deleted(item: PushMessage<AssetRef>) -> Self {
        Self { kind: DataEventKind::Deleted, item }
    }

    /// Address of the underlying item
    pub fn path(&self) -> &str {
        self.item.path()
    }
}
