//! Session lifecycle
//!
//! The [`SessionController`] implements the persistence hooks a host
//! runtime calls for each request ([`SessionHandler`]) plus the explicit
//! operations applications use: `start`, `regenerate`, `update` and
//! `is_active`.
//!
//! ```no_run
//! use strongroom_core::config::StrongroomConfig;
//! use strongroom_core::fingerprint::RequestMeta;
//! use strongroom_core::session::SessionController;
//!
//! # fn example() -> strongroom_core::Result<()> {
//! let config = StrongroomConfig::in_memory("example.com");
//! let mut session = SessionController::connect(&config)?;
//!
//! let meta = RequestMeta::new().with_user_agent("Mozilla/5.0");
//! session.start(&meta, None)?;
//! session.set_user_id(42);
//! session.finish();
//! # Ok(())
//! # }
//! ```

mod controller;
mod cookie;
mod id;
mod janitor;
mod state;

pub use controller::SessionController;
pub use cookie::CookieParams;
pub use id::{generate_id, is_valid_id, ID_BYTES};
pub use janitor::SessionJanitor;
pub use state::{SessionState, VAR_FINGERPRINT, VAR_IP, VAR_USER_AGENT, VAR_USER_ID};

/// Persistence hooks invoked by a host runtime.
///
/// Hooks never fail loudly: they report success as a boolean (or an empty
/// payload for `read`) and keep the error for diagnostics.
pub trait SessionHandler {
    /// Attach to the store
    fn open(&mut self) -> bool;

    /// Release the connection; runs once per request
    fn close(&mut self) -> bool;

    /// Decrypted buffer for `id`, empty when there is none
    fn read(&mut self, id: &str) -> Vec<u8>;

    /// Encrypt and persist `buffer` for `id`
    fn write(&mut self, id: &str, buffer: &[u8]) -> bool;

    /// Delete the row for `id`
    fn destroy(&mut self, id: &str) -> bool;

    /// Delete every expired row
    fn gc(&mut self) -> bool;
}
