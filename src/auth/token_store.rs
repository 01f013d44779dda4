//! Usage: Holds the current bearer token and answers expiry-with-tolerance queries.

use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::mask_token;
use crate::shared::time::now_unix_millis;
use std::sync::Mutex;

/// A token counts as expired this long before its real expiry; also shaved off fresh lifetimes.
pub const EXPIRY_TOLERANCE_MS: i64 = 10_000;

#[derive(Clone, PartialEq, Eq)]
struct Token {
    value: String,
    expires_at_unix_ms: i64,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &mask_token(&self.value))
            .field("expires_at_unix_ms", &self.expires_at_unix_ms)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct TokenStore {
    current: Mutex<Option<Token>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: impl Into<String>, ttl_seconds: u64) {
        self.set_at(value, ttl_seconds, now_unix_millis());
    }

    /// Replaces the token as a whole; readers never observe a half-updated value.
    pub(crate) fn set_at(&self, value: impl Into<String>, ttl_seconds: u64, now_unix_ms: i64) {
        let ttl_ms = i64::try_from(ttl_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let token = Token {
            value: value.into(),
            expires_at_unix_ms: now_unix_ms
                .saturating_add(ttl_ms)
                .saturating_sub(EXPIRY_TOLERANCE_MS),
        };
        *self.current.lock_or_recover() = Some(token);
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix_millis())
    }

    /// Inclusive at the boundary: expired once `now >= expires_at - tolerance`.
    pub(crate) fn is_expired_at(&self, now_unix_ms: i64) -> bool {
        match self.current.lock_or_recover().as_ref() {
            Some(token) => token.expires_at_unix_ms <= now_unix_ms.saturating_add(EXPIRY_TOLERANCE_MS),
            None => true,
        }
    }

    /// Value to put on the wire. Read it when building each request, never hold it across awaits.
    pub fn bearer(&self) -> Option<String> {
        self.current
            .lock_or_recover()
            .as_ref()
            .map(|token| token.value.clone())
    }

    pub fn expires_at_unix_ms(&self) -> Option<i64> {
        self.current
            .lock_or_recover()
            .as_ref()
            .map(|token| token.expires_at_unix_ms)
    }
}
