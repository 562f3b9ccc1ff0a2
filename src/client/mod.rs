//! The `client` module is the subscriber side of the transport.
//!
//! `SubscriberClient` connects to the broker, learns its subscriber id from
//! the first frame and then yields every message pushed to it. The CLI's
//! `subscribe` command and the end-to-end tests are built on it.

pub mod subscriber_client;
pub use subscriber_client::SubscriberClient;
