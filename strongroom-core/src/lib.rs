//! # Strongroom Core
//!
//! Database-backed session storage with the payload encrypted at rest under
//! a per-session key, and client fingerprinting against session hijacking.
//!
//! ## Layout
//!
//! - [`codec`]: the `name|value` variable buffer format
//! - [`crypto`]: per-session keys and authenticated encryption
//! - [`storage`]: the session table behind three interchangeable drivers
//! - [`fingerprint`]: client fingerprint computation and checks
//! - [`session`]: the lifecycle controller, cookie parameters and janitor
//! - [`config`], [`logging`], [`error`]: configuration, log backend, errors
//!
//! ## Quick Start
//!
//! ```no_run
//! use strongroom_core::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = StrongroomConfig::load()?;
//! let mut session = SessionController::connect(&config)?;
//!
//! session.start(&RequestMeta::new().with_user_agent("Mozilla/5.0"), None)?;
//! session.set("theme", "dark")?;
//! session.finish();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod session;
pub mod storage;

pub use error::{Result, SessionError};

/// Commonly used types
pub mod prelude {
    pub use crate::codec::{Value, VarMap};
    pub use crate::config::StrongroomConfig;
    pub use crate::crypto::{CipherProvider, CryptoGateway};
    pub use crate::error::{Result, SessionError};
    pub use crate::fingerprint::{FingerprintGuard, FingerprintMode, RequestMeta};
    pub use crate::session::{CookieParams, SessionController, SessionHandler, SessionJanitor};
    pub use crate::storage::{Driver, SessionCounts, StorageAdapter};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
