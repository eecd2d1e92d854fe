//! Token derivation and comparison.
//!
//! Tokens are never stored. A token is the truncated HMAC-SHA256 of
//! `"{tick}|{action}"` under the secret, hex encoded. Verification re-derives
//! the tokens for the current and previous tick and compares in constant time.

use crate::age::NonceAge;
use crate::error::{NonceError, Result};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Default number of hex characters kept from the MAC.
pub const DEFAULT_TOKEN_LENGTH: usize = 10;

/// Shortest allowed token.
pub const MIN_TOKEN_LENGTH: usize = 10;

/// Full hex-encoded SHA-256 output.
pub const MAX_TOKEN_LENGTH: usize = 64;

/// Stateless token codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCodec {
    token_length: usize,
}

impl TokenCodec {
    /// Create a codec producing tokens of `token_length` hex characters
    pub fn new(token_length: usize) -> Result<Self> {
        if !(MIN_TOKEN_LENGTH..=MAX_TOKEN_LENGTH).contains(&token_length) {
            return Err(NonceError::configuration(format!(
                "Token length must be between {} and {} characters, got {}",
                MIN_TOKEN_LENGTH, MAX_TOKEN_LENGTH, token_length
            )));
        }

        Ok(Self { token_length })
    }

    /// Length of every token this codec derives
    pub fn token_length(&self) -> usize {
        self.token_length
    }

    /// Derive the token for `action` during `tick`
    pub fn derive(&self, secret: &[u8], action: &str, tick: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret)
            .expect("HMAC can take key of any size");
        mac.update(tick.to_string().as_bytes());
        mac.update(b"|");
        mac.update(action.as_bytes());

        let mut token = hex::encode(mac.finalize().into_bytes());
        token.truncate(self.token_length);
        token
    }

    /// Half-lifetime bucket containing `now`.
    ///
    /// Computed as `floor(2 * now_ms / (lifetime * 1000))` so odd lifetimes
    /// split exactly in half.
    pub fn current_tick(lifetime: u64, now: DateTime<Utc>) -> i64 {
        let millis = i128::from(now.timestamp_millis());
        let span = i128::from(lifetime.max(1)) * 1000;
        (2 * millis).div_euclid(span) as i64
    }

    /// Classify `candidate` against the current and previous tick
    pub fn verify(
        &self,
        candidate: &str,
        secret: &[u8],
        action: &str,
        lifetime: u64,
        now: DateTime<Utc>,
    ) -> NonceAge {
        if candidate.is_empty() || action.is_empty() || candidate.len() != self.token_length {
            return NonceAge::Invalid;
        }

        let tick = Self::current_tick(lifetime, now);

        if self.matches(candidate, secret, action, tick) {
            NonceAge::Fresh
        } else if self.matches(candidate, secret, action, tick.saturating_sub(1)) {
            NonceAge::Stale
        } else {
            NonceAge::Invalid
        }
    }

    fn matches(&self, candidate: &str, secret: &[u8], action: &str, tick: i64) -> bool {
        let expected = self.derive(secret, action, tick);
        candidate.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self {
            token_length: DEFAULT_TOKEN_LENGTH,
        }
    }
}
