//! Transport implementations

mod local;

pub use local::{AssetGate, LocalHub, LocalTransport, SentMessage};
