//! Connection-lifecycle session managers
//!
//! Both sides share one state machine ([`transition`]); each session holds its
//! state in a watch channel so the at-most-one-connection check and the state
//! change happen atomically.
//!
//! - [`ProducerSession`] runs connect, push once, disconnect cycles
//! - [`ConsumerSession`] keeps a listening connection until torn down

mod consumer;
mod producer;
mod state;

pub use consumer::ConsumerSession;
pub use producer::{ProducerSession, SyncOutcome};
pub use state::{Role, SessionEvent, SessionState, transition};
