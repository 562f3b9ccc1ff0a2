//! The `broker` module holds the shared state of the system: who publishes,
//! which topics exist, and which subscribers belong to them, plus the
//! background sweep that retires dead subscribers.

pub mod registry;
pub mod sweep;
pub mod topic;

pub use registry::{PublisherId, Registry, SubscriberHandle, SubscriberId};
pub use sweep::spawn_sweeper;
