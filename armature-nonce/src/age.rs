//! Verification outcome for a presented nonce.

use serde::Serialize;
use std::fmt;

/// Age of a nonce relative to the current tick.
///
/// Two ticks exist per lifetime, so a valid nonce is either in the newer
/// half-window (`Fresh`) or the older one (`Stale`). Callers that only need a
/// pass/fail answer can use [`NonceAge::is_valid`] or convert into `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NonceAge {
    /// Issued during the current tick
    Fresh,
    /// Issued during the previous tick; still valid but aging out
    Stale,
    /// Outside every valid window, or not derived from this secret/action
    Invalid,
}

impl NonceAge {
    /// Whether the nonce passed verification.
    pub fn is_valid(&self) -> bool {
        !matches!(self, NonceAge::Invalid)
    }

    /// Whether the nonce is valid but should be re-issued soon.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, NonceAge::Stale)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NonceAge::Fresh => "fresh",
            NonceAge::Stale => "stale",
            NonceAge::Invalid => "invalid",
        }
    }
}

impl fmt::Display for NonceAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<NonceAge> for bool {
    fn from(age: NonceAge) -> Self {
        age.is_valid()
    }
}
