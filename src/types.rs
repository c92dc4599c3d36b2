//! Basic type definitions for the chat relay
//!
//! Provides newtype wrappers for type safety:
//! - `Username`: the identity a connection is bound to
//! - `ConnectionId`: UUID-based identifier for one physical connection
//! - `RoomId`: either the public room or a `-`-joined participant list
//! - `MessageIdGenerator`: strictly increasing message ids

use std::sync::atomic::{AtomicI64, Ordering};

use uuid::Uuid;

/// Room id of the shared broadcast room
pub const PUBLIC_ROOM: &str = "public";

/// Separator between participants of a private room id
pub const ROOM_SEPARATOR: char = '-';

/// Username a connection is bound to (newtype pattern)
///
/// Any non-empty string is a valid identity. Used as the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    /// Create a username from a caller-supplied string
    ///
    /// Returns None for empty or whitespace-only input.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            None
        } else {
            Some(Self(name))
        }
    }

    /// Generate an anonymous username (`anonymous-` plus 6 alphanumerics)
    pub fn anonymous() -> Self {
        use rand::Rng;
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        Self(format!("anonymous-{}", suffix))
    }

    /// Use the supplied name, falling back to an anonymous one
    pub fn or_anonymous(name: Option<&str>) -> Self {
        name.and_then(Self::new).unwrap_or_else(Self::anonymous)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::borrow::Borrow<str> for Username {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Unique connection identifier (newtype pattern)
///
/// Distinguishes two connections bound under the same username, so a
/// stale connection closing late cannot unbind its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Routing scope of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomId {
    /// Broadcast to every online connection
    Public,
    /// Deliver to each named participant
    Private(Vec<String>),
}

impl RoomId {
    /// Parse a wire room id
    ///
    /// Anything other than `"public"` is split on `-`; empty segments are dropped.
    pub fn parse(room_id: &str) -> Self {
        if room_id == PUBLIC_ROOM {
            return Self::Public;
        }

        let participants = room_id
            .split(ROOM_SEPARATOR)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        Self::Private(participants)
    }
}

/// Monotonic message id source
///
/// Ids are epoch milliseconds, bumped by one whenever two messages land
/// in the same millisecond.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    last: AtomicI64,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id, strictly greater than every id handed out before
    pub fn next_id(&self) -> i64 {
        let now = now_millis();
        let mut next = now;
        // fetch_update only fails if the closure returns None
        let _ = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                next = now.max(last + 1);
                Some(next)
            });
        next
    }
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
