use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::error::ProtocolError;
use tungstenite::protocol::Message as WsMessage;

use crate::broker::registry::SubscriberId;
use crate::utils::error::ClientError;

/// A connected subscriber.
///
/// The broker announces the subscriber id as the first text frame; `connect`
/// waits for it, so a returned client always knows its id.
pub struct SubscriberClient {
    id: SubscriberId,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl SubscriberClient {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (mut stream, _response) = connect_async(url).await?;

        let first = next_text(&mut stream).await?.ok_or(ClientError::MissingId)?;
        let id = first
            .trim()
            .parse::<SubscriberId>()
            .map_err(|_| ClientError::InvalidId(first.clone()))?;

        Ok(Self { id, stream })
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// The next message pushed by the broker, or `None` once the broker has
    /// closed the connection.
    pub async fn next_message(&mut self) -> Result<Option<String>, ClientError> {
        next_text(&mut self.stream).await
    }

    pub async fn close(mut self) -> Result<(), ClientError> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(e) if is_disconnect(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn next_text(
    stream: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> Result<Option<String>, ClientError> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => return Ok(Some(text.as_str().to_string())),
            Ok(WsMessage::Close(_)) => return Ok(None),
            Ok(_) => continue,
            Err(e) if is_disconnect(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(None)
}

fn is_disconnect(e: &tungstenite::Error) -> bool {
    matches!(
        e,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}
