//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, identity
//! extraction, and bidirectional communication with the MessageRouter.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::connection::Connection;
use crate::error::RelayError;
use crate::message::ChatMessage;
use crate::router::MessageRouter;
use crate::types::Username;

/// Accept connections forever, spawning a handler task for each
pub async fn serve(listener: TcpListener, router: Arc<MessageRouter>, config: Arc<RelayConfig>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let router = router.clone();
                let config = config.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, router, config).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, binds the connection under the
/// `username` query parameter (or an anonymous name), and pumps frames
/// until either side goes away.
pub async fn handle_connection(
    stream: TcpStream,
    router: Arc<MessageRouter>,
    config: Arc<RelayConfig>,
) -> Result<(), RelayError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, capturing the requested username
    let mut requested: Option<String> = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        requested = username_from_query(req.uri().query());
        Ok(resp)
    };

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_bytes);
    ws_config.max_frame_size = Some(config.max_message_bytes);

    let ws_stream =
        tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config)).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let username = Username::or_anonymous(requested.as_deref());
    info!("Client {} connected from {}", username, peer_addr);

    // Bounded queue for router -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ChatMessage>(config.outbound_queue);
    let connection = Arc::new(Connection::new(username.clone(), msg_tx));
    let connection_id = connection.id();

    router.on_connect(connection.clone());

    // Spawn read task (WebSocket -> MessageRouter)
    let read_router = router.clone();
    let read_conn = connection.clone();
    let idle_timeout = config.idle_timeout;
    let mut read_task = tokio::spawn(async move {
        let name = read_conn.username().clone();
        loop {
            let msg_result = match tokio::time::timeout(idle_timeout, ws_receiver.next()).await {
                Ok(Some(msg_result)) => msg_result,
                Ok(None) => break,
                Err(_) => {
                    info!("Client {} idle for {:?}, closing", name, idle_timeout);
                    break;
                }
            };

            match msg_result {
                Ok(Message::Text(text)) => match read_router.handle_frame(&read_conn, &text) {
                    Ok(outcome) => {
                        debug!("Routed message from {}: {:?}", name, outcome);
                    }
                    Err(e) => {
                        warn!("Invalid message from {}: {}", name, e);
                        let reply = read_router.error_reply(&e);
                        if let Err(e) = read_conn.deliver(reply) {
                            debug!("Could not send error notice to {}: {}", name, e);
                        }
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Client {} sent close frame", name);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Pong is handled automatically by tungstenite
                    debug!("Ping from {}", name);
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", name);
                }
                Ok(_) => {
                    // Binary or raw frames - ignore
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", name, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", name);
    });

    // Spawn write task (ChatMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match msg.to_json() {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for client");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete. The write task drains what is
    // left once the last handle to this connection is dropped.
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", username);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", username);
            read_task.abort();
        }
    }

    router.on_disconnect(&username, connection_id);
    info!("Client {} disconnected", username);

    Ok(())
}

/// Extract the percent-decoded `username` parameter from a request query string
fn username_from_query(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, value)| key == "username" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}
