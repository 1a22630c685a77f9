//! Session context: the durable token store and the ephemeral attempt store.
//!
//! A [`Session`] is handed to every consumer explicitly; nothing in this
//! crate reaches for global storage.

use std::sync::Arc;

use super::storage::{KeyValueStore, MemoryStorage};
use crate::oauth::TokenSet;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const TOKEN_EXPIRY_KEY: &str = "token_expiry";
pub const CODE_VERIFIER_KEY: &str = "code_verifier";

/// Current access/refresh token and absolute expiry, in durable storage.
///
/// Holds no refresh logic; refreshing is an explicit caller action.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Store a complete token set, replacing any previous one.
    pub fn set(&self, tokens: &TokenSet) {
        match &tokens.refresh_token {
            Some(refresh) => self.storage.set_item(REFRESH_TOKEN_KEY, refresh),
            None => self.storage.remove_item(REFRESH_TOKEN_KEY),
        }
        self.storage
            .set_item(TOKEN_EXPIRY_KEY, &tokens.expires_at.to_string());
        // Written last: readers treat the access token as the commit marker.
        self.storage.set_item(ACCESS_TOKEN_KEY, &tokens.access_token);
    }

    /// The stored token set, if a complete one is present.
    pub fn get(&self) -> Option<TokenSet> {
        let access_token = self
            .storage
            .get_item(ACCESS_TOKEN_KEY)
            .filter(|t| !t.is_empty())?;
        let expires_at = self.storage.get_item(TOKEN_EXPIRY_KEY)?.parse().ok()?;
        let refresh_token = self
            .storage
            .get_item(REFRESH_TOKEN_KEY)
            .filter(|t| !t.is_empty());

        Some(TokenSet {
            access_token,
            refresh_token,
            expires_at,
        })
    }

    pub fn clear(&self) {
        self.storage.remove_item(ACCESS_TOKEN_KEY);
        self.storage.remove_item(REFRESH_TOKEN_KEY);
        self.storage.remove_item(TOKEN_EXPIRY_KEY);
    }
}

/// The in-flight authorization attempt, in tab-scoped storage.
#[derive(Clone)]
pub struct AttemptStore {
    storage: Arc<dyn KeyValueStore>,
}

impl AttemptStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Record the verifier for a new attempt. Overwrites any earlier attempt.
    pub fn put_verifier(&self, verifier: &str) {
        self.storage.set_item(CODE_VERIFIER_KEY, verifier);
    }

    /// Read and evict the verifier. A second call returns `None`.
    pub fn take_verifier(&self) -> Option<String> {
        let verifier = self.storage.get_item(CODE_VERIFIER_KEY);
        self.storage.remove_item(CODE_VERIFIER_KEY);
        verifier.filter(|v| !v.is_empty())
    }

    pub fn clear(&self) {
        self.storage.remove_item(CODE_VERIFIER_KEY);
    }
}

/// Per-session context passed to the initiator, the callback handler and
/// API consumers.
#[derive(Clone)]
pub struct Session {
    pub tokens: TokenStore,
    pub attempts: AttemptStore,
}

impl Session {
    /// `durable` survives reloads (per origin); `ephemeral` is cleared with the tab.
    pub fn new(durable: Arc<dyn KeyValueStore>, ephemeral: Arc<dyn KeyValueStore>) -> Self {
        Self {
            tokens: TokenStore::new(durable),
            attempts: AttemptStore::new(ephemeral),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), Arc::new(MemoryStorage::new()))
    }
}
