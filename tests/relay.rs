//! End-to-end tests over real WebSocket connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use chat_relay::{
    serve, ChatMessage, ConnectionRegistry, InMemoryIdentityStore, MessageRouter, MessageStatus,
    MessageType, RelayConfig,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_relay() -> SocketAddr {
    start_relay_with(RelayConfig::default()).await
}

async fn start_relay_with(config: RelayConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = RelayConfig {
        addr: addr.to_string(),
        ..config
    };
    let router = Arc::new(MessageRouter::new(
        ConnectionRegistry::new_shared(),
        Arc::new(InMemoryIdentityStore::new()),
        config.policy,
    ));

    tokio::spawn(serve(listener, router, Arc::new(config)));
    addr
}

async fn connect(addr: SocketAddr, username: &str) -> Client {
    let url = format!("ws://{}/chat?username={}", addr, username);
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

async fn next_message(ws: &mut Client) -> ChatMessage {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");

        if let Message::Text(text) = frame {
            return ChatMessage::from_json(&text).unwrap();
        }
    }
}

/// Wait until the server has dropped the connection
async fn wait_closed(ws: &mut Client) {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("connection was not closed");

        match frame {
            None | Some(Err(_)) => return,
            Some(Ok(_)) => continue,
        }
    }
}

async fn send_json(ws: &mut Client, json: &str) {
    ws.send(Message::Text(json.to_string().into())).await.unwrap();
}

#[tokio::test]
async fn test_public_chat_and_leave() {
    let addr = start_relay().await;

    let mut alice = connect(addr, "alice").await;
    assert_eq!(next_message(&mut alice).await.content, "alice joined the chat room");

    let mut bob = connect(addr, "bob").await;
    assert_eq!(next_message(&mut bob).await.content, "bob joined the chat room");
    assert_eq!(next_message(&mut alice).await.content, "bob joined the chat room");

    send_json(
        &mut alice,
        r#"{"roomId":"public","senderId":"alice","content":"hi","type":"TEXT","status":"SENDING"}"#,
    )
    .await;

    for ws in [&mut alice, &mut bob] {
        let msg = next_message(ws).await;
        assert_eq!(msg.kind, MessageType::Text);
        assert_eq!(msg.content, "hi");
        assert_eq!(msg.status, MessageStatus::Sent);
        assert!(msg.id.is_some());
        assert!(msg.timestamp.is_some());
    }

    alice.close(None).await.unwrap();

    let left = next_message(&mut bob).await;
    assert_eq!(left.kind, MessageType::SystemNotification);
    assert!(left.content.contains("alice"));
    assert!(left.content.contains("left"));
}

#[tokio::test]
async fn test_private_room_and_presence() {
    let addr = start_relay().await;

    let mut alice = connect(addr, "alice").await;
    next_message(&mut alice).await;
    let mut bob = connect(addr, "bob").await;
    next_message(&mut bob).await;
    next_message(&mut alice).await;
    let mut carol = connect(addr, "carol").await;
    next_message(&mut carol).await;
    next_message(&mut alice).await;
    next_message(&mut bob).await;

    send_json(&mut alice, r#"{"roomId":"alice-bob","content":"just us"}"#).await;
    assert_eq!(next_message(&mut alice).await.content, "just us");
    assert_eq!(next_message(&mut bob).await.content, "just us");

    // carol's next message is the presence reply, not the private one
    send_json(&mut carol, r#"{"roomId":"system","content":"bob","type":"CHECK_USER"}"#).await;
    let reply = next_message(&mut carol).await;
    assert_eq!(reply.kind, MessageType::UserResponse);
    assert_eq!(reply.content, "true");
}

#[tokio::test]
async fn test_invalid_frame_gets_error_notice() {
    let addr = start_relay().await;

    let mut alice = connect(addr, "alice").await;
    next_message(&mut alice).await;

    send_json(&mut alice, "this is not json").await;
    let notice = next_message(&mut alice).await;
    assert_eq!(notice.kind, MessageType::SystemNotification);
    assert!(notice.content.starts_with("Invalid message format"));

    // Connection keeps working afterwards
    send_json(&mut alice, r#"{"content":"still here"}"#).await;
    assert_eq!(next_message(&mut alice).await.content, "still here");
}

#[tokio::test]
async fn test_anonymous_register_and_login() {
    let addr = start_relay().await;

    let url = format!("ws://{}/chat", addr);
    let (mut anon, _) = connect_async(url).await.unwrap();
    let joined = next_message(&mut anon).await;
    assert!(joined.content.starts_with("anonymous-"));

    send_json(&mut anon, r#"{"roomId":"auth","content":"dave:pw","type":"REGISTER"}"#).await;
    let reply = next_message(&mut anon).await;
    assert_eq!(reply.kind, MessageType::AuthResponse);
    assert_eq!(reply.content, "REGISTRATION_SUCCESS");

    send_json(&mut anon, r#"{"roomId":"auth","content":"dave:pw","type":"LOGIN"}"#).await;
    assert_eq!(next_message(&mut anon).await.content, "LOGIN_SUCCESS");

    send_json(&mut anon, r#"{"roomId":"auth","content":"dave:nope","type":"LOGIN"}"#).await;
    assert_eq!(next_message(&mut anon).await.content, "LOGIN_FAILED");
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let addr = start_relay_with(RelayConfig {
        idle_timeout: Duration::from_millis(200),
        ..RelayConfig::default()
    })
    .await;

    let mut alice = connect(addr, "alice").await;
    assert_eq!(next_message(&mut alice).await.content, "alice joined the chat room");

    wait_closed(&mut alice).await;
}

#[tokio::test]
async fn test_oversized_frame_disconnects_sender() {
    let addr = start_relay_with(RelayConfig {
        max_message_bytes: 1024,
        ..RelayConfig::default()
    })
    .await;

    let mut alice = connect(addr, "alice").await;
    next_message(&mut alice).await;
    let mut bob = connect(addr, "bob").await;
    next_message(&mut bob).await;
    next_message(&mut alice).await;

    let oversized = format!(r#"{{"roomId":"public","content":"{}"}}"#, "x".repeat(2048));
    send_json(&mut alice, &oversized).await;

    // bob never sees the payload, only alice leaving
    let left = next_message(&mut bob).await;
    assert_eq!(left.kind, MessageType::SystemNotification);
    assert_eq!(left.content, "alice left the chat room");

    wait_closed(&mut alice).await;
}

#[tokio::test]
async fn test_stale_socket_close_keeps_reconnected_user_online() {
    let addr = start_relay().await;

    let mut old_alice = connect(addr, "alice").await;
    next_message(&mut old_alice).await;
    let mut bob = connect(addr, "bob").await;
    next_message(&mut bob).await;
    next_message(&mut old_alice).await;

    let mut new_alice = connect(addr, "alice").await;
    assert_eq!(next_message(&mut new_alice).await.content, "alice joined the chat room");
    assert_eq!(next_message(&mut bob).await.content, "alice joined the chat room");

    old_alice.close(None).await.unwrap();
    wait_closed(&mut old_alice).await;

    // No leave notice precedes the presence reply
    send_json(&mut bob, r#"{"roomId":"system","content":"alice","type":"CHECK_USER"}"#).await;
    let reply = next_message(&mut bob).await;
    assert_eq!(reply.kind, MessageType::UserResponse);
    assert_eq!(reply.content, "true");

    send_json(&mut bob, r#"{"roomId":"alice-bob","content":"still there?"}"#).await;
    assert_eq!(next_message(&mut new_alice).await.content, "still there?");
    assert_eq!(next_message(&mut bob).await.content, "still there?");
}
