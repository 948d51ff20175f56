//! In-process HTTP sessions.
//!
//! This crate keeps per-client key/value sessions in the memory of the server process.
//! Clients never see their session id: they hold an encrypted and signed session token, carried
//! either in a session cookie or in a query string parameter. A token that is missing, forged or
//! belongs to an expired session silently gets the client a fresh session.
//!
//! # Change tracking
//!
//! Changes are tracked automatically.
//! Whenever the data of a session is accessed mutably, the session is marked as changed.
//! The [`SessionManager`] only writes sessions back to the cache when a change has happened,
//! and only hands out a token when a session is saved for the first time.
//!
//! # Expiry
//!
//! A session expires [`SessionConfig::session_timeout`] after it was last saved.
//! Expired sessions are evicted when they are looked up, and periodically by a
//! [`PeriodicCacheCleaner`] running on a background thread.
//!
//! # Security
//!
//! Session ids are random version 4 uuids. Tokens are encrypted with AES-256-GCM and signed with
//! keyed blake3 by default, see [`CryptographyConfiguration::random`], and signatures are compared in
//! constant time. Since the default keys only live as long as the process, so do all sessions.
//!
//! # Example
//!
//! ```
//! use inproc_session::{
//!     Context, CryptographyConfiguration, IdentificationKind, Request, SessionConfig,
//!     SessionManager, STATUS_FOUND,
//! };
//!
//! # fn main() -> inproc_session::Result {
//! let config = SessionConfig {
//!     identification: IdentificationKind::QueryString,
//!     name: "SID".to_string(),
//!     ..SessionConfig::default()
//! };
//! let manager = SessionManager::new(config, CryptographyConfiguration::random())?;
//!
//! let request = Request::new("http://example.com/shop?page=2");
//! let mut session = manager.load(&request)?;
//! session.insert("user", "alice");
//!
//! // With query string identification, new tokens are handed out by redirecting.
//! let mut context = Context::new(request);
//! manager.save(&session, &mut context)?;
//! assert_eq!(context.response.status(), STATUS_FOUND);
//! let location = context.response.header("Location").unwrap().to_string();
//! assert!(location.starts_with("http://example.com/shop?page=2&SID="));
//!
//! // Following the redirect finds the session.
//! let session = manager.load(&Request::new(location))?;
//! assert_eq!(session.get("user"), Some(&"alice".into()));
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]
#![deny(
    future_incompatible,
    missing_debug_implementations,
    nonstandard_style,
    missing_docs,
    unreachable_pub,
    missing_copy_implementations,
    unused_qualifications
)]

pub use error::Error;
/// A result with this crate's [`Error`] and a default return type of ()
pub type Result<T = ()> = std::result::Result<T, Error>;

mod cache;
mod clock;
mod config;
mod context;
mod cryptography;
mod error;
mod identification;
mod memory_cache;
mod periodic_cache_cleaner;
mod periodic_task;
mod session;
mod session_id;
mod session_manager;

pub use cache::SessionCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    IdentificationKind, SessionConfig, DEFAULT_CACHE_TRIM_INTERVAL, DEFAULT_SESSION_NAME,
    DEFAULT_SESSION_TIMEOUT,
};
pub use context::{Context, QueryString, Request, Response, TokenSource, STATUS_FOUND};
pub use cookie::Cookie;
pub use cryptography::{
    AesGcmEncryptionProvider, Blake3HmacProvider, CryptographyConfiguration, EncryptionProvider,
    HmacProvider, PassthroughEncryptionProvider, AES_KEY_LENGTH,
};
pub use identification::{
    base64_length, ByCookieIdentificationMethod, ByQueryStringParamIdentificationMethod,
    CookieTransport, IdentificationData, IdentificationDataCodec, IdentificationMethod,
    QueryStringTransport, SessionIdentification, SignatureValidator, TokenTransport,
};
pub use memory_cache::MemoryCache;
pub use periodic_cache_cleaner::PeriodicCacheCleaner;
pub use periodic_task::{
    CancellationSource, CancellationToken, ManualTimer, PeriodicTask, ThreadTimer, Tick, Timer,
};
pub use session::{Session, SessionData, SessionEntry, SessionValue};
pub use session_id::{
    DebugSessionIdGenerator, DefaultSessionIdGenerator, SessionId, SessionIdFactory,
    SessionIdGenerator,
};
pub use session_manager::{SessionFactory, SessionManager, SessionManagerBuilder};
