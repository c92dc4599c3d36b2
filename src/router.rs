//! Message router
//!
//! Decides where each inbound message goes: auth replies, presence
//! replies, contact notifications, public broadcast or pairwise private
//! delivery. Shared by every connection task; the only state it touches
//! across calls is the registry and the identity store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::{AuthError, RouteError};
use crate::identity::{Credentials, IdentityStore};
use crate::message::{
    registration_failure_content, ChatMessage, MessageStatus, MessageType, JOIN_MARKER,
    LOGIN_FAILED, LOGIN_SUCCESS, REGISTRATION_SUCCESS, SYSTEM_SENDER,
};
use crate::registry::ConnectionRegistry;
use crate::types::{now_millis, ConnectionId, MessageIdGenerator, RoomId, Username, PUBLIC_ROOM};

/// Connect-time behavior that differs between deployments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterPolicy {
    /// Send a private welcome message to each new connection
    pub send_welcome: bool,
    /// Type of the "joined" broadcast (`Text` or `SystemNotification`)
    pub join_message_type: MessageType,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            send_welcome: false,
            join_message_type: MessageType::SystemNotification,
        }
    }
}

/// Why a message was dropped without delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Content was the bare `"joined"` marker
    JoinMarker,
    /// Clients may not originate system notifications
    SystemNotification,
}

/// Result of routing one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued for this many recipients
    Delivered { recipients: usize },
    /// Answered to the source only (presence check)
    Replied,
    /// Login or registration accepted
    AuthSucceeded,
    /// Login or registration refused; the source got an `AUTH_RESPONSE`
    AuthFailed(AuthError),
    /// Dropped on purpose
    Suppressed(SuppressReason),
}

/// The routing engine
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    identities: Arc<dyn IdentityStore>,
    policy: RouterPolicy,
    ids: MessageIdGenerator,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        identities: Arc<dyn IdentityStore>,
        policy: RouterPolicy,
    ) -> Self {
        Self {
            registry,
            identities,
            policy,
            ids: MessageIdGenerator::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Bind a new connection and announce it
    pub fn on_connect(&self, connection: Arc<Connection>) {
        let username = connection.username().clone();

        if let Some(previous) = self.registry.bind(connection.clone()) {
            info!(
                "Client {} reconnected, replacing connection {}",
                username,
                previous.id()
            );
        } else {
            info!("Client {} connected", username);
        }

        let joined = self.stamp(ChatMessage::system(
            self.policy.join_message_type,
            format!("{} joined the chat room", username),
        ));
        self.broadcast(&joined);

        if self.policy.send_welcome {
            let welcome = self.stamp(ChatMessage::system(
                MessageType::Text,
                format!("Welcome to the chat room, {}!", username),
            ));
            self.send_to(&connection, welcome);
        }

        debug!("Online clients: {}", self.registry.online_count());
    }

    /// Unbind a closed connection and announce the departure
    ///
    /// Nothing happens if `username` has since been rebound to another
    /// connection. Returns true if the connection was unbound.
    pub fn on_disconnect(&self, username: &Username, connection_id: ConnectionId) -> bool {
        if !self.registry.unbind_connection(username.as_str(), connection_id) {
            debug!(
                "Connection {} for {} already replaced, skipping leave notice",
                connection_id, username
            );
            return false;
        }

        info!("Client {} disconnected", username);

        let left = self.stamp(ChatMessage::system(
            MessageType::SystemNotification,
            format!("{} left the chat room", username),
        ));
        self.broadcast(&left);

        debug!("Online clients: {}", self.registry.online_count());
        true
    }

    /// Decode and route one text frame from `source`
    pub fn handle_frame(&self, source: &Connection, raw: &str) -> Result<RouteOutcome, RouteError> {
        let msg = ChatMessage::from_json(raw)?;
        Ok(self.route(source, msg))
    }

    /// Error notice for the source of a frame that could not be routed
    pub fn error_reply(&self, err: &RouteError) -> ChatMessage {
        self.stamp(ChatMessage::system(
            MessageType::SystemNotification,
            err.to_string(),
        ))
    }

    /// Route one decoded message from `source`
    pub fn route(&self, source: &Connection, mut msg: ChatMessage) -> RouteOutcome {
        match msg.kind {
            MessageType::Login => return self.handle_login(source, &msg),
            MessageType::Register => return self.handle_register(source, &msg),
            _ => {}
        }

        if msg.content == JOIN_MARKER {
            debug!("Join marker from {}", source.username());
            return RouteOutcome::Suppressed(SuppressReason::JoinMarker);
        }

        if msg.kind == MessageType::SystemNotification {
            warn!("Dropping client-sent system notification from {}", source.username());
            return RouteOutcome::Suppressed(SuppressReason::SystemNotification);
        }

        if msg.kind == MessageType::CheckUser {
            return self.handle_check_user(source, &msg);
        }

        if msg.sender_id.is_empty() {
            msg.sender_id = source.username().to_string();
        }

        let mut recipients = 0;
        if msg.kind == MessageType::ContactAdded {
            recipients += self.handle_contact_added(&msg);

            // Contact adds never fan out to the public room
            if RoomId::parse(&msg.room_id) == RoomId::Public {
                return RouteOutcome::Delivered { recipients };
            }
        }

        recipients += self.deliver(msg);
        RouteOutcome::Delivered { recipients }
    }

    fn handle_login(&self, source: &Connection, msg: &ChatMessage) -> RouteOutcome {
        let result = Credentials::parse(&msg.content)
            .and_then(|creds| {
                self.identities
                    .verify_login(&creds.username, &creds.secret)
                    .map(|()| creds)
            });

        match result {
            Ok(creds) => {
                info!("Login succeeded for {}", creds.username);
                self.reply_auth(source, msg, LOGIN_SUCCESS);
                RouteOutcome::AuthSucceeded
            }
            Err(err) => {
                info!("Login failed from {}: {}", source.username(), err);
                self.reply_auth(source, msg, LOGIN_FAILED);
                RouteOutcome::AuthFailed(err)
            }
        }
    }

    fn handle_register(&self, source: &Connection, msg: &ChatMessage) -> RouteOutcome {
        let result = Credentials::parse(&msg.content).and_then(|creds| {
            // Online names are taken even if never registered
            if self.registry.is_online(&creds.username) {
                return Err(AuthError::UsernameExists);
            }
            self.identities
                .register(&creds.username, &creds.secret)
                .map(|()| creds)
        });

        match result {
            Ok(creds) => {
                info!("Registered user {}", creds.username);
                self.reply_auth(source, msg, REGISTRATION_SUCCESS);
                RouteOutcome::AuthSucceeded
            }
            Err(err) => {
                info!("Registration failed from {}: {}", source.username(), err);
                self.reply_auth(source, msg, registration_failure_content(&err));
                RouteOutcome::AuthFailed(err)
            }
        }
    }

    fn reply_auth(&self, source: &Connection, msg: &ChatMessage, content: &str) {
        let reply = self.stamp(ChatMessage::new(
            MessageType::AuthResponse,
            msg.room_id.clone(),
            SYSTEM_SENDER,
            content,
        ));
        self.send_to(source, reply);
    }

    fn handle_check_user(&self, source: &Connection, msg: &ChatMessage) -> RouteOutcome {
        let target = msg.content.trim();
        let online = self.registry.is_online(target);
        debug!("{} checked presence of {}: {}", source.username(), target, online);

        let reply = self.stamp(ChatMessage::new(
            MessageType::UserResponse,
            msg.room_id.clone(),
            SYSTEM_SENDER,
            online.to_string(),
        ));
        self.send_to(source, reply);
        RouteOutcome::Replied
    }

    /// Notify the added user and confirm to the adder
    ///
    /// Returns the number of deliveries made.
    fn handle_contact_added(&self, msg: &ChatMessage) -> usize {
        let adder = msg.sender_id.as_str();
        let target = msg.content.trim();
        let mut delivered = 0;

        match self.registry.resolve(target) {
            Some(conn) => {
                let notice = self.stamp(ChatMessage::new(
                    MessageType::ContactAdded,
                    PUBLIC_ROOM,
                    adder,
                    target,
                ));
                if self.send_to(&conn, notice) {
                    delivered += 1;
                }
            }
            None => {
                info!("Contact {} added by {} is offline", target, adder);
            }
        }

        if let Some(conn) = self.registry.resolve(adder) {
            let confirmation = self.stamp(ChatMessage::system(
                MessageType::SystemNotification,
                format!("{} has been added to your contacts", target),
            ));
            if self.send_to(&conn, confirmation) {
                delivered += 1;
            }
        }

        delivered
    }

    /// Deliver a client message by room id
    fn deliver(&self, mut msg: ChatMessage) -> usize {
        msg.id.get_or_insert_with(|| self.ids.next_id());
        msg.timestamp.get_or_insert_with(now_millis);
        msg.status = MessageStatus::Sent;

        match RoomId::parse(&msg.room_id) {
            RoomId::Public => self.broadcast(&msg),
            RoomId::Private(participants) => {
                let mut seen: Vec<&str> = Vec::with_capacity(participants.len());
                let mut delivered = 0;

                for participant in &participants {
                    if seen.contains(&participant.as_str()) {
                        continue;
                    }
                    seen.push(participant);

                    match self.registry.resolve(participant) {
                        Some(conn) => {
                            if self.send_to(&conn, msg.clone()) {
                                delivered += 1;
                            }
                        }
                        None => debug!("Participant {} of {} is offline", participant, msg.room_id),
                    }
                }

                delivered
            }
        }
    }

    /// Queue `msg` for every open connection; returns the number reached
    fn broadcast(&self, msg: &ChatMessage) -> usize {
        let mut delivered = 0;

        for conn in self.registry.all_handles() {
            if !conn.is_open() {
                debug!("Skipping closed connection for {}", conn.username());
                continue;
            }
            if self.send_to(&conn, msg.clone()) {
                delivered += 1;
            }
        }

        delivered
    }

    fn send_to(&self, conn: &Connection, msg: ChatMessage) -> bool {
        match conn.deliver(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!(recipient = %conn.username(), error = %e, "Delivery failed");
                false
            }
        }
    }

    /// Assign a fresh id and timestamp and mark as sent
    fn stamp(&self, mut msg: ChatMessage) -> ChatMessage {
        msg.id = Some(self.ids.next_id());
        msg.timestamp = Some(now_millis());
        msg.status = MessageStatus::Sent;
        msg
    }
}
