//! Identity store
//!
//! Registered username/secret pairs for the in-process login scheme.
//! Secrets are kept as given and live only as long as the process; the
//! router talks to the `IdentityStore` trait so a hashing store can be
//! dropped in without touching routing.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::AuthError;

/// Credential backend used by the router for `LOGIN` and `REGISTER`
pub trait IdentityStore: Send + Sync {
    /// Register a new user
    ///
    /// Fails with `UsernameExists` if the name is already registered.
    fn register(&self, username: &str, secret: &str) -> Result<(), AuthError>;

    /// Check a username/secret pair
    fn verify_login(&self, username: &str, secret: &str) -> Result<(), AuthError>;
}

/// `username:secret` pair parsed from an auth message's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    /// Parse `username:secret`
    ///
    /// Splits on the first `:`, so the secret may itself contain colons.
    pub fn parse(content: &str) -> Result<Self, AuthError> {
        let (username, secret) = content
            .split_once(':')
            .ok_or(AuthError::MalformedCredentials)?;

        if username.trim().is_empty() {
            return Err(AuthError::MalformedCredentials);
        }

        Ok(Self {
            username: username.to_string(),
            secret: secret.to_string(),
        })
    }
}

/// Process-lifetime identity store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    users: DashMap<String, String>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for InMemoryIdentityStore {
    fn register(&self, username: &str, secret: &str) -> Result<(), AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Rejected("secret must not be empty".to_string()));
        }

        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AuthError::UsernameExists),
            Entry::Vacant(entry) => {
                entry.insert(secret.to_string());
                Ok(())
            }
        }
    }

    fn verify_login(&self, username: &str, secret: &str) -> Result<(), AuthError> {
        match self.users.get(username) {
            Some(stored) if stored.value() == secret => Ok(()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }
}
