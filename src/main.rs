//! Chat relay - Entry Point
//!
//! Loads configuration, builds the shared router, and accepts connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_relay::{
    serve, ConnectionRegistry, InMemoryIdentityStore, MessageRouter, RelayConfig, RelayError,
};

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_relay=info")),
        )
        .init();

    let mut config = RelayConfig::from_env()?;

    // Bind address from command line overrides the environment
    if let Some(addr) = env::args().nth(1) {
        config.addr = addr;
    }

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Chat relay listening on {}", config.addr);
    info!(
        send_welcome = config.policy.send_welcome,
        join_message_type = ?config.policy.join_message_type,
        outbound_queue = config.outbound_queue,
        "Configuration loaded"
    );

    let router = Arc::new(MessageRouter::new(
        ConnectionRegistry::new_shared(),
        Arc::new(InMemoryIdentityStore::new()),
        config.policy,
    ));

    serve(listener, router, Arc::new(config)).await;

    Ok(())
}
