//! WebSocket Chat Relay Library
//!
//! Clients connect with a username and exchange JSON chat messages, either
//! broadcast to everyone in the `"public"` room or routed to the members
//! of a private room named `userA-userB`.
//!
//! # Features
//! - Username binding from the `username` query parameter
//! - Public broadcast and pairwise private delivery
//! - Join/leave notifications
//! - Presence checks (`CHECK_USER`)
//! - Contact-added notifications
//! - In-process registration and login
//!
//! # Architecture
//! Shared state instead of a central actor:
//! - `ConnectionRegistry` maps usernames to handles (DashMap, per-key atomic)
//! - `MessageRouter` is called directly from every connection task
//! - Each connection has a bounded outbound queue drained by its own writer
//!   task, so a slow reader never stalls other senders
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chat_relay::{serve, ConnectionRegistry, InMemoryIdentityStore, MessageRouter, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RelayConfig::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     let router = Arc::new(MessageRouter::new(
//!         ConnectionRegistry::new_shared(),
//!         Arc::new(InMemoryIdentityStore::new()),
//!         config.policy,
//!     ));
//!
//!     serve(listener, router, Arc::new(config)).await;
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod identity;
pub mod message;
pub mod registry;
pub mod router;
pub mod types;

// Re-export main types for convenience
pub use config::RelayConfig;
pub use connection::Connection;
pub use error::{AuthError, ConfigError, DeliveryError, RelayError, RouteError};
pub use handler::{handle_connection, serve};
pub use identity::{Credentials, IdentityStore, InMemoryIdentityStore};
pub use message::{ChatMessage, MessageStatus, MessageType};
pub use registry::ConnectionRegistry;
pub use router::{MessageRouter, RouteOutcome, RouterPolicy, SuppressReason};
pub use types::{ConnectionId, MessageIdGenerator, RoomId, Username};
