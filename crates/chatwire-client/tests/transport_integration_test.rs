//! Integration tests for the WebSocket transport driver.
//!
//! Runs a loopback tungstenite server and exercises the full driver path:
//! real sockets, real close handshakes, real reconnect timers.

#![cfg(feature = "transport")]

use std::time::Duration;

use chatwire_client::{
    ConnectionConfig, Endpoint, InboundEvent, SessionEvent,
    transport::{ChatHandle, spawn},
};
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};
use tokio_tungstenite::{
    WebSocketStream, accept_async,
    tungstenite::{
        Message, Utf8Bytes,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

const EVENT_WAIT: Duration = Duration::from_secs(5);

/// Short retry delay so reconnect tests stay fast.
fn test_config() -> ConnectionConfig {
    ConnectionConfig { retry_delay: Duration::from_millis(100), max_retries: None }
}

async fn start_client(listener: &TcpListener) -> (ChatHandle, mpsc::Receiver<SessionEvent>) {
    let addr = listener.local_addr().unwrap();
    let endpoint = Endpoint::new(addr.to_string(), false);
    spawn(endpoint, test_config())
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = timeout(EVENT_WAIT, listener.accept()).await.unwrap().unwrap();
    accept_async(stream).await.unwrap()
}

async fn next_event(events: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
    timeout(EVENT_WAIT, events.recv()).await.unwrap().expect("event stream ended")
}

#[tokio::test]
async fn batched_delivery_arrives_in_order_then_clean_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, mut events) = start_client(&listener).await;

    handle.connect("bob").await.unwrap();
    let mut server = accept_ws(&listener).await;

    assert_eq!(next_event(&mut events).await, SessionEvent::Opened);

    // Two frames in one transport delivery.
    let payload = concat!(
        r#"{"type":"join","username":"bob","content":"bob joined"}"#,
        "\n",
        r#"{"type":"chat","username":"carol","content":"hi","timestamp":"2024-01-01T00:00:00Z"}"#,
    );
    server.send(Message::text(payload)).await.unwrap();

    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Inbound(InboundEvent::PresenceJoin { identity, .. }) if identity == "bob"
    ));
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Inbound(InboundEvent::ChatMessage { identity, content, .. })
            if identity == "carol" && content == "hi"
    ));

    // Server closes cleanly: no reconnect expected.
    server
        .close(Some(CloseFrame { code: CloseCode::Normal, reason: Utf8Bytes::from_static("") }))
        .await
        .unwrap();
    while server.next().await.is_some() {}

    assert_eq!(next_event(&mut events).await, SessionEvent::Closed {
        code: 1000,
        was_clean: true,
    });
}

#[tokio::test]
async fn sent_messages_reach_the_server_as_chat_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, mut events) = start_client(&listener).await;

    handle.connect("alice").await.unwrap();
    let mut server = accept_ws(&listener).await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Opened);

    handle.send("  hello there  ").await.unwrap();

    let message = timeout(EVENT_WAIT, server.next()).await.unwrap().unwrap().unwrap();
    let frame = message.into_text().unwrap();
    assert!(frame.as_str().contains(r#""type":"chat""#));
    assert!(frame.as_str().contains(r#""username":"alice""#));
    // Content arrives trimmed.
    assert!(frame.as_str().contains(r#""content":"hello there""#));

    handle.disconnect();

    // Driver initiates the close handshake with the normal code.
    loop {
        match timeout(EVENT_WAIT, server.next()).await.unwrap() {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 1000);
                break;
            },
            Some(Ok(_)) => {},
            Some(Err(_)) | None => panic!("expected a close frame"),
        }
    }
}

#[tokio::test]
async fn abrupt_server_drop_triggers_automatic_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, mut events) = start_client(&listener).await;

    handle.connect("alice").await.unwrap();
    let server = accept_ws(&listener).await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Opened);

    // Kill the connection without a close handshake.
    drop(server);

    match next_event(&mut events).await {
        SessionEvent::Closed { was_clean, .. } => assert!(!was_clean),
        other => panic!("expected unclean Closed, got {other:?}"),
    }

    // The driver retries on its own after the configured delay.
    let mut server = accept_ws(&listener).await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Opened);

    // And the resumed session is fully functional.
    handle.send("back again").await.unwrap();
    let message = timeout(EVENT_WAIT, server.next()).await.unwrap().unwrap().unwrap();
    assert!(message.into_text().unwrap().as_str().contains("back again"));
}

#[tokio::test]
async fn synchronous_errors_surface_through_the_handle() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (handle, mut events) = start_client(&listener).await;

    // Invalid identity, before any transport exists.
    assert!(handle.connect("   ").await.is_err());

    // Send before open.
    assert!(handle.send("hi").await.is_err());

    handle.connect("alice").await.unwrap();
    let _server = accept_ws(&listener).await;
    assert_eq!(next_event(&mut events).await, SessionEvent::Opened);

    // Empty content is rejected by the codec even while open.
    assert!(handle.send("   ").await.is_err());
}
