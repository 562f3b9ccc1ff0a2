//! The `utils` module provides the pieces shared by every other module of
//! `pubsock`: the error taxonomy and logging setup.

pub mod error;
pub mod logging;
