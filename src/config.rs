//! Relay configuration
//!
//! Loaded from environment variables, with an optional `.env` file.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::message::MessageType;
use crate::router::RouterPolicy;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Default capacity of each connection's outbound queue
pub const DEFAULT_OUTBOUND_QUEUE: usize = 64;

/// Default max inbound message size (8 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 8 * 1024 * 1024;

/// Default inbound idle timeout (15 minutes)
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 15 * 60;

/// Runtime settings for the relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address
    pub addr: String,
    /// Connect-time router behavior
    pub policy: RouterPolicy,
    /// Per-connection outbound queue capacity
    pub outbound_queue: usize,
    /// Max inbound WebSocket message size in bytes
    pub max_message_bytes: usize,
    /// Disconnect after this long without an inbound frame
    pub idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            policy: RouterPolicy::default(),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

impl RelayConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults; set but unparseable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let join_message_type = match lookup("RELAY_JOIN_MESSAGE_TYPE") {
            Some(value) => parse_join_type(&value)?,
            None => defaults.policy.join_message_type,
        };

        let send_welcome = match lookup("RELAY_SEND_WELCOME") {
            Some(value) => parse_bool("RELAY_SEND_WELCOME", &value)?,
            None => defaults.policy.send_welcome,
        };

        let outbound_queue: usize = parse_or("RELAY_OUTBOUND_QUEUE", &lookup, defaults.outbound_queue)?;
        if outbound_queue == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RELAY_OUTBOUND_QUEUE",
                value: "0".to_string(),
            });
        }

        let idle_secs = parse_or(
            "RELAY_IDLE_TIMEOUT_SECS",
            &lookup,
            defaults.idle_timeout.as_secs(),
        )?;

        Ok(Self {
            addr: lookup("RELAY_ADDR").unwrap_or(defaults.addr),
            policy: RouterPolicy {
                send_welcome,
                join_message_type,
            },
            outbound_queue,
            max_message_bytes: parse_or(
                "RELAY_MAX_MESSAGE_BYTES",
                &lookup,
                defaults.max_message_bytes,
            )?,
            idle_timeout: Duration::from_secs(idle_secs),
        })
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_join_type(value: &str) -> Result<MessageType, ConfigError> {
    match value.trim().to_uppercase().as_str() {
        "TEXT" => Ok(MessageType::Text),
        "SYSTEM_NOTIFICATION" => Ok(MessageType::SystemNotification),
        _ => Err(ConfigError::InvalidValue {
            key: "RELAY_JOIN_MESSAGE_TYPE",
            value: value.to_string(),
        }),
    }
}
