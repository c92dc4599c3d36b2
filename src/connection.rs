//! Connection handle definition
//!
//! Represents one live connection as seen by the router: who it is bound to
//! and the bounded queue its writer task drains.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::DeliveryError;
use crate::message::ChatMessage;
use crate::types::{ConnectionId, Username};

/// Delivery handle for a connected client
///
/// Sending never waits: a full queue means a slow reader, and that
/// message is dropped for that recipient only.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this physical connection
    id: ConnectionId,
    /// Identity this connection is bound to
    username: Username,
    /// Router → writer task message queue
    sender: mpsc::Sender<ChatMessage>,
}

impl Connection {
    /// Create a new connection handle with the given identity and queue
    pub fn new(username: Username, sender: mpsc::Sender<ChatMessage>) -> Self {
        Self {
            id: ConnectionId::new(),
            username,
            sender,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    /// Check whether the writer task is still receiving
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue a message for this client
    ///
    /// Returns an error if the connection is gone or its queue is full.
    pub fn deliver(&self, msg: ChatMessage) -> Result<(), DeliveryError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::ChannelClosed,
        })
    }
}
