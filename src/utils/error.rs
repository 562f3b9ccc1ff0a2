//! Error types used within `pubsock`.
//!
//! Registry operations fail with a [`RegistryError`]; transport faults
//! (handshake, socket writes) are reported as [`TransportError`] and never
//! leave the connection task that hit them. Every error can be classified
//! into an [`ErrorKind`].

use std::io;

use thiserror::Error;

use crate::broker::registry::{PublisherId, SubscriberId};

/// Coarse classification of every failure the broker can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    OwnershipViolation,
    InvalidInput,
    ConnectionFault,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("publisher {0} is not registered")]
    UnknownPublisher(PublisherId),

    #[error("subscriber {0} is not registered")]
    UnknownSubscriber(SubscriberId),

    #[error("topic '{0}' does not exist")]
    UnknownTopic(String),

    #[error("topic name must not be empty")]
    EmptyTopicName,

    #[error("topic '{0}' already exists")]
    DuplicateTopic(String),

    #[error("subscriber {subscriber} is already subscribed to '{topic}'")]
    AlreadySubscribed {
        subscriber: SubscriberId,
        topic: String,
    },

    #[error("subscriber {subscriber} is not subscribed to '{topic}'")]
    NotSubscribed {
        subscriber: SubscriberId,
        topic: String,
    },

    #[error("publisher {publisher} does not own topic '{topic}'")]
    NotOwner { publisher: PublisherId, topic: String },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::UnknownPublisher(_)
            | RegistryError::UnknownSubscriber(_)
            | RegistryError::UnknownTopic(_)
            | RegistryError::NotSubscribed { .. } => ErrorKind::NotFound,
            RegistryError::DuplicateTopic(_) | RegistryError::AlreadySubscribed { .. } => {
                ErrorKind::Duplicate
            }
            RegistryError::NotOwner { .. } => ErrorKind::OwnershipViolation,
            RegistryError::EmptyTopicName => ErrorKind::InvalidInput,
        }
    }
}

/// Failure while upgrading a raw socket to a framed channel.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("connection closed before a complete request header arrived")]
    Incomplete,

    #[error("malformed upgrade request: {0}")]
    Malformed(#[from] httparse::Error),

    #[error("upgrade request has no Sec-WebSocket-Key header")]
    MissingKey,

    #[error("handshake timed out")]
    Timeout,

    #[error("socket error during handshake: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("connection is closed")]
    Closed,

    #[error("send queue is full ({0} frames pending)")]
    Backlogged(usize),

    #[error("write did not complete within {0:?}")]
    WriteTimeout(std::time::Duration),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ConnectionFault
    }
}

/// Failure on the subscriber side of the transport.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("connection closed before a subscriber id was announced")]
    MissingId,

    #[error("broker announced an invalid subscriber id: {0:?}")]
    InvalidId(String),
}
