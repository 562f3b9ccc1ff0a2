//! # pubsock
//!
//! `pubsock` is a minimal, in-memory publish/subscribe broker. Publishers
//! create named topics and push text into them through an HTTP management
//! API; subscribers hold a raw socket, upgraded with the WebSocket opening
//! handshake, over which the broker pushes each message as a text frame.
//!
//! ## Core Modules
//!
//! - `broker`: the registry of publishers, topics and subscribers, and the
//!   liveness sweep that retires dead subscribers.
//! - `transport`: handshake, frame encoding, subscriber connections and the
//!   accept loop.
//! - `api`: the HTTP management adapter over the registry.
//! - `client`: a subscriber client, used by the CLI and tests.
//! - `config`: loading settings from files and environment.
//! - `utils`: error types and logging setup.
//!
//! Nothing is persisted: topics, subscriptions and ids live as long as the
//! process does.

pub mod api;
pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;
