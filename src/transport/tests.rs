use super::connection::{ConnectionState, SubscriberConnection};
use super::frame::{Opcode, close_frame, encode_frame, encode_text_frame};
use super::handshake::{accept_key, build_response, extract_key, find_header_end, perform};
use super::listener::{TransportLimits, Listener};
use crate::broker::registry::{Registry, SubscriberHandle};
use crate::client::SubscriberClient;
use crate::utils::error::{HandshakeError, TransportError};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;

const SAMPLE_REQUEST: &str = "GET /chat HTTP/1.1\r\n\
Host: server.example.com\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\r\n";

#[test]
fn test_small_frame_has_two_byte_header() {
    let payload = "a".repeat(100);
    let frame = encode_text_frame(&payload);
    assert_eq!(frame.len(), 102);
    assert_eq!(&frame[..2], &[0x81, 100]);
    assert_eq!(&frame[2..], payload.as_bytes());
}

#[test]
fn test_medium_frame_uses_16_bit_length() {
    let payload = "b".repeat(130);
    let frame = encode_text_frame(&payload);
    assert_eq!(&frame[..4], &[0x81, 126, 0x00, 0x82]);
    assert_eq!(&frame[4..], payload.as_bytes());
}

#[test]
fn test_large_frame_uses_64_bit_length() {
    let payload = vec![b'c'; 70000];
    let frame = encode_frame(Opcode::Text, &payload);
    assert_eq!(frame[0], 0x81);
    assert_eq!(frame[1], 127);
    assert_eq!(&frame[2..10], &70000u64.to_be_bytes());
    assert_eq!(frame.len(), 10 + 70000);
}

#[test]
fn test_length_boundaries() {
    assert_eq!(encode_frame(Opcode::Text, &[0; 125])[1], 125);
    assert_eq!(encode_frame(Opcode::Text, &[0; 126])[1..4], [126, 0x00, 0x7E]);
    assert_eq!(encode_frame(Opcode::Text, &vec![0; 65535])[1..4], [126, 0xFF, 0xFF]);
    assert_eq!(encode_frame(Opcode::Text, &vec![0; 65536])[1], 127);
}

#[test]
fn test_length_counts_bytes_not_chars() {
    let frame = encode_text_frame("héllo");
    assert_eq!(frame[1], 6);
}

#[test]
fn test_close_frame() {
    assert_eq!(close_frame(), vec![0x88, 0x00]);
}

#[test]
fn test_accept_key_known_answer() {
    assert_eq!(
        accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
        "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
    );
}

#[test]
fn test_accept_key_matches_tungstenite() {
    for key in ["x3JJHMbDL1EzLkh9GBhXDw==", "AQIDBAUGBwgJCgsMDQ4PEC=="] {
        assert_eq!(
            accept_key(key),
            tungstenite::handshake::derive_accept_key(key.as_bytes())
        );
    }
}

#[test]
fn test_find_header_end() {
    assert_eq!(find_header_end(b"GET / HTTP/1.1\r\n\r\nrest"), Some(18));
    assert_eq!(find_header_end(b"GET / HTTP/1.1\r\nHost: x\r\n"), None);
}

#[test]
fn test_extract_key() {
    assert_eq!(
        extract_key(SAMPLE_REQUEST.as_bytes()).unwrap(),
        "dGhlIHNhbXBsZSBub25jZQ=="
    );

    let lower = SAMPLE_REQUEST.replace("Sec-WebSocket-Key", "sec-websocket-key");
    assert_eq!(
        extract_key(lower.as_bytes()).unwrap(),
        "dGhlIHNhbXBsZSBub25jZQ=="
    );
}

#[test]
fn test_extract_key_failures() {
    let no_key = "GET / HTTP/1.1\r\nHost: x\r\n\r\n";
    assert!(matches!(
        extract_key(no_key.as_bytes()),
        Err(HandshakeError::MissingKey)
    ));

    let partial = "GET / HTTP/1.1\r\nHost: x\r\n";
    assert!(matches!(
        extract_key(partial.as_bytes()),
        Err(HandshakeError::Incomplete)
    ));

    assert!(matches!(
        extract_key(b"\x00\x01garbage\r\n\r\n"),
        Err(HandshakeError::Malformed(_))
    ));
}

#[test]
fn test_build_response() {
    let response = build_response(SAMPLE_REQUEST.as_bytes()).unwrap();
    assert_eq!(
        String::from_utf8(response).unwrap(),
        "HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
    );
}

#[tokio::test]
async fn test_perform_over_split_reads() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    let task = tokio::spawn(async move { perform(&mut server, 1024).await });

    let (head, tail) = SAMPLE_REQUEST.split_at(20);
    client.write_all(head.as_bytes()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    client.write_all(tail.as_bytes()).await.unwrap();

    task.await.unwrap().unwrap();
    let mut response = vec![0u8; 256];
    let n = client.read(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response[..n]);
    assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
}

#[tokio::test]
async fn test_perform_rejects_oversized_header() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    let task = tokio::spawn(async move { perform(&mut server, 32).await });
    client.write_all(SAMPLE_REQUEST.as_bytes()).await.unwrap();
    assert!(matches!(
        task.await.unwrap(),
        Err(HandshakeError::Incomplete)
    ));
}

#[tokio::test]
async fn test_perform_rejects_early_hangup() {
    let (mut client, mut server) = tokio::io::duplex(4096);
    let task = tokio::spawn(async move { perform(&mut server, 1024).await });
    client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
    drop(client);
    assert!(matches!(
        task.await.unwrap(),
        Err(HandshakeError::Incomplete)
    ));
}

async fn spawn_listener(limits: TransportLimits) -> (String, Arc<Registry>) {
    let registry = Arc::new(Registry::new());
    let listener = Listener::bind("127.0.0.1:0", limits).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(listener.run(registry.clone()));
    (format!("ws://{addr}"), registry)
}

/// Polls `check` until it holds or a second has passed.
async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_listener_pushes_id_then_messages() {
    let (url, registry) = spawn_listener(TransportLimits::default()).await;
    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .expect("WebSocket handshake failed");

    match ws.next().await.unwrap().unwrap() {
        WsMessage::Text(text) => assert_eq!(text.as_str(), "0"),
        other => panic!("Expected id frame, got {other:?}"),
    }

    let p = registry.register_publisher();
    registry.create_topic(p, "news").unwrap();
    registry.subscribe(0, "news").unwrap();
    registry.publish(p, "news", "hello").unwrap();

    let big = "z".repeat(70000);
    registry.publish(p, "news", &big).unwrap();

    match ws.next().await.unwrap().unwrap() {
        WsMessage::Text(text) => assert_eq!(text.as_str(), "[news]: hello"),
        other => panic!("Expected text frame, got {other:?}"),
    }
    match ws.next().await.unwrap().unwrap() {
        WsMessage::Text(text) => assert_eq!(text.as_str(), format!("[news]: {big}")),
        other => panic!("Expected text frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_handshake_registers_nothing() {
    let (url, registry) = spawn_listener(TransportLimits::default()).await;
    let addr = url.trim_start_matches("ws://");

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();

    // The server hangs up without a response.
    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("server did not hang up")
        .unwrap_or(0);
    assert_eq!(n, 0);
    assert_eq!(registry.subscriber_count(), 0);

    // The next client still gets the first id.
    let client = SubscriberClient::connect(&url).await.unwrap();
    assert_eq!(client.id(), 0);
}

#[tokio::test]
async fn test_silent_client_times_out() {
    let limits = TransportLimits {
        buffer_size: 1024,
        timeout: Duration::from_millis(50),
        ..TransportLimits::default()
    };
    let (url, registry) = spawn_listener(limits).await;
    let mut stream = TcpStream::connect(url.trim_start_matches("ws://"))
        .await
        .unwrap();

    let mut buf = [0u8; 16];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("server did not hang up")
        .unwrap_or(0);
    assert_eq!(n, 0);
    assert_eq!(registry.subscriber_count(), 0);
}

#[tokio::test]
async fn test_sweep_retires_disconnected_client() {
    let (url, registry) = spawn_listener(TransportLimits::default()).await;
    let p = registry.register_publisher();
    registry.create_topic(p, "t").unwrap();

    let stays = SubscriberClient::connect(&url).await.unwrap();
    let leaves = SubscriberClient::connect(&url).await.unwrap();
    registry.subscribe(stays.id(), "t").unwrap();
    registry.subscribe(leaves.id(), "t").unwrap();
    assert_eq!(registry.purge_dead(), 0);

    let gone = leaves.id();
    drop(leaves);

    assert!(eventually(|| registry.purge_dead() == 1).await);
    assert!(!registry.is_subscriber_registered(gone));
    assert_eq!(registry.members_of("t"), Some(vec![stays.id()]));
    assert!(registry.is_subscriber_registered(stays.id()));
}

#[tokio::test]
async fn test_remove_subscriber_closes_connection() {
    let (url, registry) = spawn_listener(TransportLimits::default()).await;
    let mut client = SubscriberClient::connect(&url).await.unwrap();

    registry.remove_subscriber(client.id()).unwrap();

    let next = tokio::time::timeout(Duration::from_secs(2), client.next_message())
        .await
        .expect("connection was not closed");
    assert!(next.unwrap().is_none());
}

#[tokio::test]
async fn test_connection_state_and_send_after_peer_loss() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let peer = TcpStream::connect(addr).await.unwrap();
    let (stream, peer_addr) = server.accept().await.unwrap();

    let limits = TransportLimits::default();
    let (conn, writer) = SubscriberConnection::open(stream, peer_addr, &limits);
    assert_eq!(conn.peer(), peer_addr);
    assert_eq!(conn.state(), ConnectionState::Open);
    assert!(conn.is_alive());

    drop(peer);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!conn.is_alive());

    // Sending to a dead peer is logged, never surfaced.
    for _ in 0..10 {
        conn.send("anyone there?");
    }
    drop(conn);
    tokio::time::timeout(Duration::from_secs(2), writer)
        .await
        .expect("writer task did not finish")
        .unwrap();
}

#[tokio::test]
async fn test_stalled_reader_is_marked_dead_and_swept() {
    let limits = TransportLimits {
        send_queue_capacity: 4,
        write_timeout: Duration::from_millis(200),
        ..TransportLimits::default()
    };
    let (url, registry) = spawn_listener(limits).await;

    // Complete the handshake by hand, then never read again.
    let mut stream = TcpStream::connect(url.trim_start_matches("ws://"))
        .await
        .unwrap();
    stream.write_all(SAMPLE_REQUEST.as_bytes()).await.unwrap();
    let mut buf = [0u8; 256];
    let n = stream.read(&mut buf).await.unwrap();
    assert!(buf[..n].starts_with(b"HTTP/1.1 101"));
    assert!(eventually(|| registry.is_subscriber_registered(0)).await);

    let p = registry.register_publisher();
    registry.create_topic(p, "firehose").unwrap();
    registry.subscribe(0, "firehose").unwrap();

    let chunk = "x".repeat(1 << 20);
    for _ in 0..64 {
        registry.publish(p, "firehose", &chunk).unwrap();
        tokio::task::yield_now().await;
    }

    assert!(eventually(|| registry.purge_dead() == 1).await);
    assert!(!registry.is_subscriber_registered(0));
    assert_eq!(registry.members_of("firehose"), Some(vec![]));
    drop(stream);
}

#[tokio::test]
async fn test_full_send_queue_rejects_further_frames() {
    let server = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr().unwrap();
    let _peer = TcpStream::connect(addr).await.unwrap();
    let (stream, peer_addr) = server.accept().await.unwrap();

    let limits = TransportLimits {
        send_queue_capacity: 2,
        write_timeout: Duration::from_secs(30),
        ..TransportLimits::default()
    };
    let (conn, _writer) = SubscriberConnection::open(stream, peer_addr, &limits);

    // The peer never reads: the socket fills, the writer parks and the
    // queue backs up. Nothing beyond the queue is buffered.
    let chunk = "y".repeat(1 << 20);
    let mut backlogged = false;
    for _ in 0..64 {
        match conn.try_send(&chunk) {
            Ok(()) => tokio::task::yield_now().await,
            Err(TransportError::Backlogged(capacity)) => {
                assert_eq!(capacity, 2);
                backlogged = true;
                break;
            }
            Err(other) => panic!("Expected a full queue, got {other}"),
        }
    }
    assert!(backlogged);
    assert_eq!(conn.state(), ConnectionState::Dead);
    assert!(!conn.is_alive());
    assert!(matches!(conn.try_send("late"), Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_id_frame_precedes_deliveries_to_a_guessed_id() {
    let (url, registry) = spawn_listener(TransportLimits::default()).await;
    let p = registry.register_publisher();
    registry.create_topic(p, "race").unwrap();

    // Subscribe and publish to id 0 as soon as it exists.
    let racer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            while registry.subscribe(0, "race").is_err() {
                tokio::task::yield_now().await;
            }
            registry.publish(p, "race", "early").unwrap();
        })
    };

    let (mut ws, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    racer.await.unwrap();

    match ws.next().await.unwrap().unwrap() {
        WsMessage::Text(text) => assert_eq!(text.as_str(), "0"),
        other => panic!("Expected id frame, got {other:?}"),
    }
    match ws.next().await.unwrap().unwrap() {
        WsMessage::Text(text) => assert_eq!(text.as_str(), "[race]: early"),
        other => panic!("Expected text frame, got {other:?}"),
    }
}
