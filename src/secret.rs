//! Login key and token management
//!
//! A key is issued at login and carries the secret it was issued with, so it
//! can be exchanged later for a fresh login. Tokens are derived from a key
//! and identify the user on every request.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Secret type recorded for password logins
pub const SECRET_TYPE_PASSWORD: &str = "password";
/// Secret type recorded for WeChat logins
pub const SECRET_TYPE_OPEN_ID: &str = "openId";

/// Issued login key
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub identifier: String,
    pub key: String,
    #[serde(skip)]
    pub secret: String,
    #[serde(skip)]
    pub secret_type: String,
    /// Unix milliseconds
    pub generate_time: i64,
}

/// Issued access token
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub identifier: String,
    pub token: String,
    #[serde(skip)]
    pub source_key: String,
    /// Unix milliseconds
    pub generate_time: i64,
}

/// Storage backend for keys and tokens
pub trait SecretStore: Send + Sync {
    fn save_key(&self, info: KeyInfo) -> KeyInfo;
    fn key_info(&self, key: &str) -> Option<KeyInfo>;
    fn remove_key(&self, key: &str) -> Option<KeyInfo>;
    fn save_token(&self, info: TokenInfo) -> TokenInfo;
    fn token_info(&self, token: &str) -> Option<TokenInfo>;
    fn remove_token(&self, token: &str) -> Option<TokenInfo>;
    /// Remove every token derived from `key`, returning how many were dropped
    fn remove_tokens_by_key(&self, key: &str) -> usize;
    /// Remove all keys and tokens of one identifier
    fn remove_identifier(&self, identifier: &str);
    /// Drop keys generated before `key_cutoff` and tokens generated before
    /// `token_cutoff` (unix milliseconds)
    fn clear_expired(&self, key_cutoff: i64, token_cutoff: i64) -> (usize, usize);
}

/// Process-local secret store
#[derive(Default)]
pub struct InMemorySecretStore {
    keys: DashMap<String, KeyInfo>,
    tokens: DashMap<String, TokenInfo>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn save_key(&self, info: KeyInfo) -> KeyInfo {
        self.keys.insert(info.key.clone(), info.clone());
        info
    }

    fn key_info(&self, key: &str) -> Option<KeyInfo> {
        self.keys.get(key).map(|k| k.clone())
    }

    fn remove_key(&self, key: &str) -> Option<KeyInfo> {
        self.keys.remove(key).map(|(_, info)| info)
    }

    fn save_token(&self, info: TokenInfo) -> TokenInfo {
        self.tokens.insert(info.token.clone(), info.clone());
        info
    }

    fn token_info(&self, token: &str) -> Option<TokenInfo> {
        self.tokens.get(token).map(|t| t.clone())
    }

    fn remove_token(&self, token: &str) -> Option<TokenInfo> {
        self.tokens.remove(token).map(|(_, info)| info)
    }

    fn remove_tokens_by_key(&self, key: &str) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, t| t.source_key != key);
        before.saturating_sub(self.tokens.len())
    }

    fn remove_identifier(&self, identifier: &str) {
        self.keys.retain(|_, k| k.identifier != identifier);
        self.tokens.retain(|_, t| t.identifier != identifier);
    }

    fn clear_expired(&self, key_cutoff: i64, token_cutoff: i64) -> (usize, usize) {
        let keys_before = self.keys.len();
        self.keys.retain(|_, k| k.generate_time >= key_cutoff);
        let tokens_before = self.tokens.len();
        self.tokens.retain(|_, t| t.generate_time >= token_cutoff);
        (
            keys_before.saturating_sub(self.keys.len()),
            tokens_before.saturating_sub(self.tokens.len()),
        )
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Issues, validates and revokes login keys and tokens
#[derive(Clone)]
pub struct SecretManager {
    store: Arc<dyn SecretStore>,
    key_expire: Duration,
    token_expire: Duration,
}

impl SecretManager {
    pub fn new(store: Arc<dyn SecretStore>, key_expire: Duration, token_expire: Duration) -> Self {
        Self {
            store,
            key_expire,
            token_expire,
        }
    }

    /// Key lifetime in seconds
    pub fn key_expired_in(&self) -> u64 {
        self.key_expire.as_secs()
    }

    /// Token lifetime in seconds
    pub fn token_expired_in(&self) -> u64 {
        self.token_expire.as_secs()
    }

    fn is_timeout(generate_time: i64, expire: Duration) -> bool {
        now_millis() - generate_time > expire.as_millis() as i64
    }

    /// Issue a new key for `identifier`
    pub fn generate_key(&self, identifier: &str, secret: &str, secret_type: &str) -> KeyInfo {
        let key = format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        );
        self.store.save_key(KeyInfo {
            identifier: identifier.to_string(),
            key,
            secret: secret.to_string(),
            secret_type: secret_type.to_string(),
            generate_time: now_millis(),
        })
    }

    /// Resolve a key. Expired keys are removed on access.
    pub fn key_info(&self, key: &str) -> AppResult<KeyInfo> {
        let info = self.store.key_info(key).ok_or(AppError::SecretInvalid)?;
        if Self::is_timeout(info.generate_time, self.key_expire) {
            self.store.remove_key(key);
            return Err(AppError::SecretExpired);
        }
        Ok(info)
    }

    /// Exchange a valid key for a new token
    pub fn generate_token(&self, key: &str) -> AppResult<TokenInfo> {
        let key_info = self.key_info(key)?;
        Ok(self.store.save_token(TokenInfo {
            identifier: key_info.identifier,
            token: uuid::Uuid::new_v4().to_string(),
            source_key: key_info.key,
            generate_time: now_millis(),
        }))
    }

    /// Resolve a token to the identifier it was issued for
    pub fn validate_token(&self, token: &str) -> AppResult<String> {
        let info = self.store.token_info(token).ok_or(AppError::TokenInvalid)?;
        if Self::is_timeout(info.generate_time, self.token_expire) {
            self.store.remove_token(token);
            return Err(AppError::TokenExpired);
        }
        Ok(info.identifier)
    }

    /// Invalidate a key. With `cascade`, tokens derived from it go too.
    pub fn invalidate_key(&self, key: &str, cascade: bool) -> AppResult<KeyInfo> {
        let info = self.store.remove_key(key).ok_or(AppError::SecretInvalid)?;
        if cascade {
            let removed = self.store.remove_tokens_by_key(key);
            tracing::debug!("Invalidated key of {} with {} token(s)", info.identifier, removed);
        }
        Ok(info)
    }

    pub fn invalidate_token(&self, token: &str) -> AppResult<TokenInfo> {
        self.store.remove_token(token).ok_or(AppError::TokenInvalid)
    }

    /// Drop every key and token of one user
    pub fn invalidate_user(&self, identifier: &str) {
        self.store.remove_identifier(identifier);
    }

    /// Remove expired keys and tokens, returning the counts removed
    pub fn clear_expired(&self) -> (usize, usize) {
        let now = now_millis();
        self.store.clear_expired(
            now - self.key_expire.as_millis() as i64,
            now - self.token_expire.as_millis() as i64,
        )
    }
}
