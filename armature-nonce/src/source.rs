//! Collaborators injected into a [`NonceManager`](crate::NonceManager).
//!
//! The manager never reads the wall clock, a key store, the inbound request or
//! any process-wide setting directly. Each of those is one of the traits in
//! this module, with a default implementation for common setups and test
//! doubles for deterministic tests.

use crate::config::DEFAULT_LIFETIME;
use crate::error::{NonceError, Result};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use tracing::trace;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time used for tick computation
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Result<DateTime<Utc>>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }
}

/// Manually driven clock for deterministic tests
#[derive(Debug, Default)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    /// Freeze the clock at `at`
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(at.timestamp_millis()),
        }
    }

    /// Freeze the clock at a Unix timestamp in seconds
    pub fn from_timestamp(secs: i64) -> Self {
        Self {
            millis: AtomicI64::new(secs.saturating_mul(1000)),
        }
    }

    /// Move the clock to `at`
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }

    /// Move the clock forward (or backward for negative durations)
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            NonceError::collaborator(format!("Clock timestamp {} ms is out of range", millis))
        })
    }
}

// ============================================================================
// Secret
// ============================================================================

/// Keying material for token derivation
///
/// The secret must stay stable for as long as the tokens it issued are
/// expected to verify.
pub trait SecretSource: Send + Sync {
    /// Current secret key
    fn secret(&self) -> Result<Vec<u8>>;
}

/// Secret held in memory
#[derive(Clone)]
pub struct StaticSecret {
    key: Vec<u8>,
}

impl StaticSecret {
    /// Minimum accepted key length in bytes
    pub const MIN_LENGTH: usize = 32;

    /// Wrap an existing key (must be at least 32 bytes)
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.len() < Self::MIN_LENGTH {
            return Err(NonceError::configuration(format!(
                "Secret key must be at least {} bytes",
                Self::MIN_LENGTH
            )));
        }

        Ok(Self { key })
    }

    /// Generate a random 32-byte key
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let key: Vec<u8> = (0..Self::MIN_LENGTH).map(|_| rng.r#gen()).collect();
        Self { key }
    }
}

impl fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticSecret")
            .field("key", &"[redacted]")
            .finish()
    }
}

impl SecretSource for StaticSecret {
    fn secret(&self) -> Result<Vec<u8>> {
        Ok(self.key.clone())
    }
}

// ============================================================================
// Request parameters
// ============================================================================

/// Read access to the inbound request's parameters
pub trait ParameterSource: Send + Sync {
    /// Raw value of the parameter `name`, if present.
    ///
    /// An error means the parameters could not be read at all, as opposed to
    /// the parameter being absent.
    fn lookup(&self, name: &str) -> Result<Option<String>>;
}

/// Parameter mapping for a single request
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    params: HashMap<String, String>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an urlencoded query string or form body.
    ///
    /// A leading `?` is ignored. Later duplicates win.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.strip_prefix('?').unwrap_or(query);
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|e| NonceError::collaborator(format!("Invalid query string: {}", e)))?;

        Ok(pairs.into_iter().collect())
    }

    /// Add a parameter, replacing any previous value
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl ParameterSource for ParameterMap {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        Ok(self.params.get(name).cloned())
    }
}

/// Request without parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParameters;

impl ParameterSource for NoParameters {
    fn lookup(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

// ============================================================================
// Default lifetime
// ============================================================================

/// Host-wide default lifetime hook, notified on every lifetime change
pub trait DefaultLifetimeRegistry: Send + Sync {
    fn set_default(&self, lifetime: u64);
}

/// Shared default lifetime.
///
/// Clones share the same value; separate registries are independent.
#[derive(Debug, Clone)]
pub struct LifetimeRegistry {
    lifetime: Arc<AtomicU64>,
    registrations: Arc<AtomicUsize>,
}

impl LifetimeRegistry {
    pub fn new(initial: u64) -> Self {
        Self {
            lifetime: Arc::new(AtomicU64::new(initial)),
            registrations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Lifetime most recently registered
    pub fn default_lifetime(&self) -> u64 {
        self.lifetime.load(Ordering::SeqCst)
    }

    /// Number of times a lifetime has been registered
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl Default for LifetimeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LIFETIME)
    }
}

impl DefaultLifetimeRegistry for LifetimeRegistry {
    fn set_default(&self, lifetime: u64) {
        trace!(lifetime, "Registering default nonce lifetime");
        self.lifetime.store(lifetime, Ordering::SeqCst);
        self.registrations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry that ignores lifetime changes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifetimeRegistry;

impl DefaultLifetimeRegistry for NoopLifetimeRegistry {
    fn set_default(&self, _lifetime: u64) {}
}
