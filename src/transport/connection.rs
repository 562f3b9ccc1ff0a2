//! Subscriber connections
//!
//! After a successful handshake a socket is split in two. The write half is
//! moved into a writer task that drains a bounded per-connection queue of
//! encoded frames; the read half stays with the [`SubscriberConnection`] so
//! the sweep can probe it. Sends only enqueue, so they never block the caller.
//!
//! A peer that stops reading cannot grow the broker's memory: once its queue
//! is full, or a single write stalls past the write timeout, the connection
//! is marked dead and the next sweep retires it.
//!
//! The writer task exits when every sender is gone (the registry dropped the
//! subscriber), after a close frame, or on the first write failure. Its exit
//! drops the write half, which shuts the socket down.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broker::registry::{SubscriberHandle, SubscriberId};
use crate::transport::frame::{close_frame, encode_text_frame};
use crate::transport::listener::TransportLimits;
use crate::utils::error::TransportError;

/// Lifecycle of one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Handshaking,
    Open,
    Dead,
}

enum Outbound {
    Frame(Vec<u8>),
    Close,
}

#[derive(Debug)]
pub struct SubscriberConnection {
    peer: SocketAddr,
    reader: OwnedReadHalf,
    outbound: Sender<Outbound>,
    dead: Arc<AtomicBool>,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outbound::Frame(bytes) => write!(f, "Frame({} bytes)", bytes.len()),
            Outbound::Close => f.write_str("Close"),
        }
    }
}

impl SubscriberConnection {
    /// Wrap a socket that has completed the handshake and start its writer.
    pub fn open(
        stream: TcpStream,
        peer: SocketAddr,
        limits: &TransportLimits,
    ) -> (Self, JoinHandle<()>) {
        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(limits.send_queue_capacity.max(1));
        let dead = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(write_loop(
            writer,
            rx,
            peer,
            dead.clone(),
            limits.write_timeout,
        ));
        let conn = Self {
            peer,
            reader,
            outbound: tx,
            dead,
        };
        (conn, task)
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        if self.dead.load(Ordering::Acquire) || self.outbound.is_closed() {
            ConnectionState::Dead
        } else {
            ConnectionState::Open
        }
    }

    /// Queue `message` as a text frame.
    ///
    /// A full queue means the peer has stopped keeping up; the connection is
    /// marked dead and the message is dropped.
    pub fn try_send(&self, message: &str) -> Result<(), TransportError> {
        if self.dead.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        match self
            .outbound
            .try_send(Outbound::Frame(encode_text_frame(message)))
        {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dead.store(true, Ordering::Release);
                Err(TransportError::Backlogged(self.outbound.max_capacity()))
            }
            Err(TrySendError::Closed(_)) => Err(TransportError::Closed),
        }
    }

    fn probe(&self) -> bool {
        if self.state() == ConnectionState::Dead {
            return false;
        }

        // Subscribers send nothing after the handshake, so anything read
        // here is discarded.
        let mut scratch = [0u8; 512];
        match self.reader.try_read(&mut scratch) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(e) => {
                debug!("Liveness probe for {} failed: {e}", self.peer);
                false
            }
        }
    }
}

impl SubscriberHandle for SubscriberConnection {
    fn send(&self, message: &str) {
        if let Err(e) = self.try_send(message) {
            warn!("Failed to send to {} ({:?}): {e}", self.peer, e.kind());
        }
    }

    /// Heuristic: a socket that reads as end-of-stream, errors, or whose
    /// writer has failed or fallen behind is dead. An idle but healthy peer
    /// and a half-closed one that keeps its read side open look the same to
    /// this probe.
    fn is_alive(&self) -> bool {
        self.probe()
    }

    fn close(&self) {
        if let Err(e) = self.outbound.try_send(Outbound::Close) {
            debug!("Could not queue close frame for {}: {e}", self.peer);
        }
    }

    fn registered(&self, id: SubscriberId) {
        self.send(&id.to_string());
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: Receiver<Outbound>,
    peer: SocketAddr,
    dead: Arc<AtomicBool>,
    write_timeout: Duration,
) {
    while let Some(out) = rx.recv().await {
        let (frame, closing) = match out {
            Outbound::Frame(frame) => (frame, false),
            Outbound::Close => (close_frame(), true),
        };

        let result = match tokio::time::timeout(write_timeout, writer.write_all(&frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::from(e)),
            Err(_) => Err(TransportError::WriteTimeout(write_timeout)),
        };

        if let Err(err) = result {
            if closing {
                debug!("Failed to send close frame to {peer}: {err}");
            } else {
                warn!("Failed to send message to {peer} ({:?}): {err}", err.kind());
            }
            dead.store(true, Ordering::Release);
            break;
        }
        if closing {
            break;
        }
    }

    rx.close();
    dead.store(true, Ordering::Release);
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {peer} failed: {e}");
    }
    debug!("Send loop closed for {peer}");
}
