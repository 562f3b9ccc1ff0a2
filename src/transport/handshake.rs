//! Opening handshake
//!
//! Promotes a freshly accepted socket to a framed push channel: read the
//! client's HTTP upgrade request, derive `Sec-WebSocket-Accept` from its
//! `Sec-WebSocket-Key`, and answer with `101 Switching Protocols`.

use base64::{Engine, prelude::BASE64_STANDARD};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::utils::error::HandshakeError;

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_HEADERS: usize = 32;

/// `base64(SHA1(key + GUID))`.
pub fn accept_key(key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(key.as_bytes());
    sha1.update(GUID.as_bytes());
    BASE64_STANDARD.encode(sha1.finalize())
}

/// Offset just past the `\r\n\r\n` ending the header block, if present.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Pull the `Sec-WebSocket-Key` value out of a complete request header.
pub fn extract_key(request: &[u8]) -> Result<String, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    if req.parse(request)?.is_partial() {
        return Err(HandshakeError::Incomplete);
    }

    req.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("sec-websocket-key"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(HandshakeError::MissingKey)
}

pub fn response_for_key(key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(key)
    )
}

/// The full `101` response for a raw upgrade request.
pub fn build_response(request: &[u8]) -> Result<Vec<u8>, HandshakeError> {
    let key = extract_key(request)?;
    Ok(response_for_key(&key).into_bytes())
}

/// Run the handshake on `stream`, reading into a buffer of at most
/// `buffer_size` bytes. A client that has not sent a full header by the time
/// the buffer is full, or that hangs up first, fails the handshake.
pub async fn perform<S>(stream: &mut S, buffer_size: usize) -> Result<(), HandshakeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut filled = 0;

    let header_end = loop {
        if filled == buf.len() {
            return Err(HandshakeError::Incomplete);
        }
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(HandshakeError::Incomplete);
        }
        filled += n;
        if let Some(end) = find_header_end(&buf[..filled]) {
            break end;
        }
    };

    let response = build_response(&buf[..header_end])?;
    stream.write_all(&response).await?;
    stream.flush().await?;
    Ok(())
}
