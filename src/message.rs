//! Message envelope definitions
//!
//! Every frame in both directions is a `ChatMessage` JSON object with
//! camelCase field names and SCREAMING_SNAKE_CASE enum values.
//! Unknown fields are ignored so newer clients keep working.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::types::PUBLIC_ROOM;

/// Sender id used for router-originated messages
pub const SYSTEM_SENDER: &str = "System";

/// Content a client sends right after connecting; carries no payload
pub const JOIN_MARKER: &str = "joined";

pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
pub const REGISTRATION_SUCCESS: &str = "REGISTRATION_SUCCESS";
pub const USERNAME_EXISTS: &str = "USERNAME_EXISTS";
pub const REGISTRATION_FAILED: &str = "REGISTRATION_FAILED";

/// Kind of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Plain text message
    #[default]
    Text,
    /// Image payload (content is an encoded image)
    Image,
    /// Ask whether a user is online
    CheckUser,
    /// Reply to `CheckUser`, content `"true"`/`"false"`
    UserResponse,
    /// Sender added the user named in content as a contact
    ContactAdded,
    /// Router-generated notice
    SystemNotification,
    /// Login with `username:secret`
    Login,
    /// Registration with `username:secret`
    Register,
    /// Reply to `Login`/`Register`
    AuthResponse,
}

/// Delivery status of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    /// Client-side default before the router accepts it
    #[default]
    Sending,
    /// Accepted by the router for delivery
    Sent,
    /// Delivery failed
    Failed,
}

/// The message envelope exchanged with clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default = "default_room_id")]
    pub room_id: String,
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub status: MessageStatus,
}

fn default_room_id() -> String {
    PUBLIC_ROOM.to_string()
}

impl ChatMessage {
    /// Create a message without id or timestamp (the router stamps those)
    pub fn new(
        kind: MessageType,
        room_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            content: content.into(),
            timestamp: None,
            kind,
            status: MessageStatus::Sending,
        }
    }

    /// Router-originated message in the public room
    pub fn system(kind: MessageType, content: impl Into<String>) -> Self {
        Self::new(kind, PUBLIC_ROOM, SYSTEM_SENDER, content)
    }

    /// Decode a JSON text frame
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// `AUTH_RESPONSE` content for a failed registration
pub fn registration_failure_content(err: &AuthError) -> &'static str {
    match err {
        AuthError::UsernameExists => USERNAME_EXISTS,
        _ => REGISTRATION_FAILED,
    }
}
