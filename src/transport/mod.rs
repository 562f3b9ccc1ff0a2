//! The `transport` module carries messages between the broker and its
//! subscribers over TCP.
//!
//! It implements the opening handshake that upgrades a raw socket, the frame
//! encoding used to push text to subscribers, the per-connection send path
//! with its liveness probe, and the accept loop that ties them to the
//! registry.

pub mod connection;
pub mod frame;
pub mod handshake;
pub mod listener;

pub use connection::{ConnectionState, SubscriberConnection};
pub use listener::{TransportLimits, Listener};

#[cfg(test)]
mod tests;
