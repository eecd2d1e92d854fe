//! # Armature Nonce
//!
//! Stateless, action-bound anti-forgery nonces for Armature applications.
//!
//! ## Features
//!
//! - ✅ **Stateless** - Tokens are re-derived at verification time, never stored
//! - ✅ **Keyed** - Truncated HMAC-SHA256 over the action and a time tick
//! - ✅ **Aging** - `Fresh` / `Stale` / `Invalid` classification over two half-lifetime windows
//! - ✅ **Constant-time comparison** - Presented tokens are compared with `subtle`
//! - ✅ **Injected collaborators** - Clock, secret, request parameters and default lifetime
//! - ✅ **Form and URL embedding** - Hidden fields and query parameters
//!
//! ## Quick Start
//!
//! ```rust
//! use armature_nonce::{NonceManager, StaticSecret};
//! use std::sync::Arc;
//!
//! let secret = Arc::new(StaticSecret::generate());
//! let mut nonce = NonceManager::new("delete-post", "_nonce", Some(3600), secret).unwrap();
//!
//! // Issue a token and verify it
//! let token = nonce.issue().unwrap();
//! assert!(nonce.verify(Some(&token)).unwrap());
//!
//! // Tokens for another action never verify
//! nonce.set_action("publish-post");
//! assert!(!nonce.verify(Some(&token)).unwrap());
//! ```
//!
//! ## Aging
//!
//! Each lifetime is split into two ticks. A token issued during the current
//! tick is `Fresh`, one issued during the previous tick is `Stale`, anything
//! else is `Invalid`.
//!
//! ```rust
//! use armature_nonce::{FixedClock, NonceAge, NonceManager, StaticSecret};
//! use chrono::Duration;
//! use std::sync::Arc;
//!
//! let clock = Arc::new(FixedClock::from_timestamp(86_400 * 100));
//! let mut nonce = NonceManager::builder()
//!     .action("save-settings")
//!     .binding_name("_nonce")
//!     .lifetime(86_400)
//!     .clock(clock.clone())
//!     .secret(Arc::new(StaticSecret::generate()))
//!     .build()
//!     .unwrap();
//!
//! let token = nonce.issue().unwrap();
//! assert_eq!(nonce.age(Some(&token)).unwrap(), NonceAge::Fresh);
//!
//! clock.advance(Duration::hours(12));
//! assert_eq!(nonce.age(Some(&token)).unwrap(), NonceAge::Stale);
//!
//! clock.advance(Duration::hours(12));
//! assert_eq!(nonce.age(Some(&token)).unwrap(), NonceAge::Invalid);
//! ```
//!
//! ## Forms, URLs and Requests
//!
//! ```rust
//! use armature_nonce::{NonceManager, ParameterMap, StaticSecret};
//! use std::sync::Arc;
//!
//! let secret = Arc::new(StaticSecret::generate());
//! let mut nonce = NonceManager::new("comment", "_nonce", None, secret.clone()).unwrap();
//!
//! let field = nonce.create_field(true).unwrap();
//! assert!(field.contains(r#"name="_nonce""#));
//!
//! let url = nonce.create_url("https://example.com/comments").unwrap();
//! assert!(url.starts_with("https://example.com/comments?_nonce="));
//!
//! // Later, on the inbound request
//! let query = url.split_once('?').unwrap().1;
//! let mut incoming = NonceManager::new("comment", "_nonce", None, secret).unwrap();
//! incoming.set_parameters(Arc::new(ParameterMap::from_query(query).unwrap()));
//! assert!(incoming.verify(None).unwrap());
//! ```

pub mod age;
pub mod config;
pub mod error;
pub mod manager;
pub mod render;
pub mod source;
pub mod token;

pub use age::NonceAge;
pub use config::{DEFAULT_LIFETIME, NonceConfig};
pub use error::{NonceError, Result};
pub use manager::{NonceManager, NonceManagerBuilder};
pub use render::{FieldRenderer, HiddenInputRenderer, QueryUrlRenderer, UrlRenderer};
pub use source::{
    Clock, DefaultLifetimeRegistry, FixedClock, LifetimeRegistry, NoParameters,
    NoopLifetimeRegistry, ParameterMap, ParameterSource, SecretSource, StaticSecret, SystemClock,
};
pub use token::TokenCodec;
