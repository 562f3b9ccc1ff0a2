//! Subscriber listener
//!
//! Accepts TCP connections and gives each one its own task, which:
//! - runs the opening handshake, bounded by the configured buffer size and
//!   timeout
//! - wraps the upgraded socket in a `SubscriberConnection`
//! - registers it with the `Registry`, which has the connection queue the
//!   assigned subscriber id as the client's first frame
//!
//! A failing client only ever takes down its own task.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::broker::registry::{Registry, SubscriberId};
use crate::config::BrokerSettings;
use crate::transport::connection::{ConnectionState, SubscriberConnection};
use crate::transport::handshake;
use crate::utils::error::{HandshakeError, TransportError};

/// Per-connection limits: how long and how much the handshake may take, and
/// how far the writer may fall behind once the connection is open.
#[derive(Debug, Clone, Copy)]
pub struct TransportLimits {
    pub buffer_size: usize,
    pub timeout: Duration,
    pub send_queue_capacity: usize,
    pub write_timeout: Duration,
}

impl From<&BrokerSettings> for TransportLimits {
    fn from(settings: &BrokerSettings) -> Self {
        Self {
            buffer_size: settings.handshake_buffer_size,
            timeout: settings.handshake_timeout(),
            send_queue_capacity: settings.send_queue_capacity,
            write_timeout: settings.write_timeout(),
        }
    }
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self::from(&crate::config::Settings::default().broker)
    }
}

pub struct Listener {
    inner: TcpListener,
    limits: TransportLimits,
}

impl Listener {
    pub async fn bind(addr: &str, limits: TransportLimits) -> io::Result<Self> {
        let inner = TcpListener::bind(addr).await?;
        Ok(Self { inner, limits })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self, registry: Arc<Registry>) {
        if let Ok(addr) = self.local_addr() {
            info!("Subscriber transport listening on ws://{addr}");
        }

        loop {
            match self.inner.accept().await {
                Ok((stream, peer)) => {
                    debug!("{peer}: {:?}", ConnectionState::Connecting);
                    let registry = registry.clone();
                    let limits = self.limits;
                    tokio::spawn(async move {
                        if let Err(e) = accept_subscriber(stream, peer, registry, limits).await {
                            warn!("Dropping connection from {peer}: {e}");
                        }
                    });
                }
                Err(e) => {
                    // Usually a transient resource limit (e.g. out of fds).
                    warn!("Failed to accept connection: {e}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn accept_subscriber(
    mut stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<Registry>,
    limits: TransportLimits,
) -> Result<SubscriberId, TransportError> {
    debug!("{peer}: {:?}", ConnectionState::Handshaking);
    tokio::time::timeout(
        limits.timeout,
        handshake::perform(&mut stream, limits.buffer_size),
    )
    .await
    .map_err(|_| HandshakeError::Timeout)??;

    let (conn, _writer) = SubscriberConnection::open(stream, peer, &limits);
    let conn = Arc::new(conn);
    debug!("{peer}: {:?}", conn.state());

    let id = registry.register_subscriber(conn);
    info!("Subscriber {id} connected from {peer}");
    Ok(id)
}
