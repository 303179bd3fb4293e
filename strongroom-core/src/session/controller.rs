//! Session lifecycle controller

use super::cookie::CookieParams;
use super::id::{generate_id, is_valid_id};
use super::state::{user_id_of, SessionState, VAR_FINGERPRINT, VAR_IP, VAR_USER_AGENT, VAR_USER_ID};
use super::SessionHandler;
use crate::codec::{self, Value};
use crate::config::StrongroomConfig;
use crate::crypto::{CipherProvider, CryptoGateway};
use crate::error::{Result, SessionError};
use crate::fingerprint::{FingerprintGuard, RequestMeta};
use crate::storage::{self, Column, Field, Operator, SessionCounts, SessionRecord, StorageAdapter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Connected, no session started yet
    Idle,
    /// A session is started and will be written on finish
    Active,
    /// The current session was destroyed; nothing to write
    Destroyed,
    /// Written and closed
    Finished,
}

/// Drives one session through open, read, write and close.
///
/// A controller owns a single database connection for the duration of one
/// request. Hosts either call the [`SessionHandler`] hooks themselves, or
/// let the controller act as the host with [`start`](Self::start) and
/// [`finish`](Self::finish). Dropping a controller that was not finished
/// writes the session and closes the connection.
pub struct SessionController {
    storage: Box<dyn StorageAdapter>,
    crypto: CryptoGateway,
    guard: FingerprintGuard,
    fingerprint_enabled: bool,
    lifetime: i64,
    gc_on_start: bool,
    cookie: CookieParams,
    state: SessionState,
    phase: Phase,
    attached: bool,
    last_error: Option<String>,
}

impl SessionController {
    /// Validate `config` and connect to its database
    pub fn connect(config: &StrongroomConfig) -> Result<Self> {
        config.validate().map_err(|e| SessionError::Configuration(format!("{:#}", e)))?;
        let storage = storage::connect(&config.database)?;
        Self::build(config, storage)
    }

    /// Validate `config` and use an already connected adapter
    pub fn with_storage(config: &StrongroomConfig, storage: Box<dyn StorageAdapter>) -> Result<Self> {
        config.validate().map_err(|e| SessionError::Configuration(format!("{:#}", e)))?;
        Self::build(config, storage)
    }

    fn build(config: &StrongroomConfig, storage: Box<dyn StorageAdapter>) -> Result<Self> {
        let lifetime = i64::try_from(config.session.lifetime)
            .map_err(|_| SessionError::Configuration("lifetime out of range".to_string()))?;

        Ok(Self {
            storage,
            crypto: CryptoGateway::default(),
            guard: FingerprintGuard::new(config.fingerprint.mode),
            fingerprint_enabled: config.fingerprint.enabled,
            lifetime,
            gc_on_start: config.session.gc_on_start,
            cookie: CookieParams::from_config(&config.session),
            state: SessionState::default(),
            phase: Phase::Idle,
            attached: false,
            last_error: None,
        })
    }

    /// Replace the default cipher
    pub fn with_cipher(mut self, provider: Arc<dyn CipherProvider>) -> Self {
        self.crypto = CryptoGateway::new(provider);
        self
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Log a failed operation and remember it as the last error
    fn record<T>(&mut self, operation: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("Session {} failed: {}", operation, e);
                self.last_error = Some(e.to_string());
                None
            }
        }
    }

    /// Message of the most recent failure, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn storage(&self) -> &dyn StorageAdapter {
        self.storage.as_ref()
    }

    pub fn cookie(&self) -> &CookieParams {
        &self.cookie
    }

    /// Whether the host has attached through [`SessionHandler::open`]
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Current session id, once started
    pub fn id(&self) -> Option<&str> {
        match self.phase {
            Phase::Active => Some(self.state.id()),
            _ => None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }

    /// Set a session variable.
    ///
    /// Names containing `|` or starting with `!` cannot be stored and are
    /// refused with [`SessionError::InvalidName`].
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        self.state.set(name, value)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.state.remove(name)
    }

    pub fn clear(&mut self) {
        self.state.clear();
    }

    /// Bind the session to an application user; persisted on the next write
    pub fn set_user_id(&mut self, user_id: i64) {
        self.state.put(VAR_USER_ID, user_id);
    }

    pub fn user_id(&self) -> i64 {
        self.state.user_id()
    }

    /// `Set-Cookie` header for the current session id
    pub fn set_cookie_header(&self) -> Option<String> {
        self.id().map(|id| self.cookie.set_cookie_header(id))
    }

    /// Unexpired sessions split into visitors and users
    pub fn count_active(&self) -> Result<SessionCounts> {
        self.storage.count_active(Self::now())
    }

    /// Start a session for this request.
    ///
    /// Reuses `incoming_id` when it is well formed, otherwise allocates a new
    /// id. The stored payload is loaded and, when fingerprinting is enabled,
    /// checked against `meta`: on mismatch the id is regenerated and all
    /// variables are dropped. Client variables are refreshed afterwards.
    pub fn start(&mut self, meta: &RequestMeta, incoming_id: Option<&str>) -> Result<()> {
        if self.phase == Phase::Finished {
            return Err(SessionError::Closed);
        }

        self.open();
        if self.gc_on_start {
            self.gc();
        }

        let id = match incoming_id {
            Some(id) if is_valid_id(id) => id.to_string(),
            Some(_) => {
                log::warn!("Rejected malformed session id, allocating a new one");
                generate_id()
            }
            None => generate_id(),
        };

        let buffer = self.read(&id);
        let vars = match codec::decode(&buffer) {
            Ok(vars) => vars,
            Err(e) => {
                self.record::<()>("decode", Err(e));
                Default::default()
            }
        };
        self.state = SessionState::with_vars(id, vars);
        self.phase = Phase::Active;
        log::debug!("Session {} started with {} variables", self.state.id(), self.state.vars().len());

        if self.fingerprint_enabled {
            let stored = self.state.get(VAR_FINGERPRINT).and_then(Value::as_str);
            if let Err(e) = self.guard.check(stored, meta) {
                if !buffer.is_empty() {
                    log::warn!("{}, regenerating session", e);
                }
                self.regenerate()?;
                self.state.clear();
            }
        }

        self.update(meta);
        Ok(())
    }

    /// Move the session to a new id and delete the old row.
    ///
    /// Variables are kept; the new id gets a fresh key on its first write.
    pub fn regenerate(&mut self) -> Result<()> {
        if self.phase != Phase::Active {
            return Err(SessionError::Closed);
        }

        let old_id = self.state.id().to_string();
        self.destroy(&old_id);
        self.state.set_id(generate_id());
        log::debug!("Session {} regenerated as {}", old_id, self.state.id());
        Ok(())
    }

    /// Refresh the user agent, client IP and fingerprint variables
    pub fn update(&mut self, meta: &RequestMeta) {
        self.state.put(VAR_USER_AGENT, meta.user_agent.clone().unwrap_or_default());
        self.state.put(VAR_IP, meta.client_ip().map(|ip| ip.to_string()));
        if self.fingerprint_enabled {
            self.state.put(VAR_FINGERPRINT, self.guard.compute(meta));
        }
    }

    /// Whether the stored row for the current session is unexpired.
    ///
    /// An expired or missing row destroys the session.
    pub fn is_active(&mut self) -> bool {
        if self.phase != Phase::Active {
            return false;
        }

        let id = self.state.id().to_string();
        let lookup = self.storage.select_single(Column::Expire, &id);
        let expire = self.record("expiry lookup", lookup).flatten().and_then(|f| f.as_int());
        let now = Self::now();

        match expire {
            Some(expire) if expire > now => true,
            _ => {
                log::debug!("Session {} not active (expire {:?}, now {})", id, expire, now);
                self.destroy(&id);
                self.state.clear();
                self.phase = Phase::Destroyed;
                false
            }
        }
    }

    /// Write the started session and close the connection.
    ///
    /// Runs once; later calls (including the one from `Drop`) do nothing
    /// and return `true`.
    pub fn finish(&mut self) -> bool {
        let written = match self.phase {
            Phase::Finished => return true,
            Phase::Active => {
                let id = self.state.id().to_string();
                let buffer = self.state.encode();
                self.write(&id, &buffer)
            }
            Phase::Idle | Phase::Destroyed => true,
        };

        self.phase = Phase::Finished;
        let closed = self.close();
        written && closed
    }
}

impl SessionHandler for SessionController {
    fn open(&mut self) -> bool {
        self.attached = true;
        true
    }

    fn close(&mut self) -> bool {
        self.attached = false;
        if !self.storage.is_open() {
            return true;
        }
        if self.storage.close() {
            true
        } else {
            self.last_error = Some("connection did not close cleanly".to_string());
            false
        }
    }

    fn read(&mut self, id: &str) -> Vec<u8> {
        let lookup = self.storage.select_single(Column::Data, id);
        let encoded = match self.record("read", lookup).flatten() {
            Some(Field::Text(text)) if !text.is_empty() => text,
            _ => return Vec::new(),
        };

        let key = self.crypto.retrieve_or_create_key(self.storage.as_ref(), id);
        let Some(key) = self.record("key lookup", key) else {
            return Vec::new();
        };

        let opened = self.crypto.open(&encoded, &key);
        let buffer = self.record("decrypt", opened).unwrap_or_default();
        if log::log_enabled!(log::Level::Debug) {
            if let Ok(vars) = codec::decode(&buffer) {
                log::debug!("Read {} bytes, user id {}", buffer.len(), user_id_of(&vars));
            }
        }
        buffer
    }

    fn write(&mut self, id: &str, buffer: &[u8]) -> bool {
        let user_id = match codec::decode(buffer) {
            Ok(vars) => user_id_of(&vars),
            Err(e) => {
                log::warn!("Cannot decode session buffer for user id: {}", e);
                0
            }
        };

        let key = self.crypto.retrieve_or_create_key(self.storage.as_ref(), id);
        let Some(key) = self.record("key lookup", key) else {
            return false;
        };
        let sealed = self.crypto.seal(buffer, &key);
        let Some(encrypted_data) = self.record("encrypt", sealed) else {
            return false;
        };

        let record = SessionRecord {
            id: id.to_string(),
            user_id,
            expire_at: Self::now().saturating_add(self.lifetime),
            encrypted_data,
            key,
        };
        let result = self.storage.upsert(&record);
        let written = self.record("write", result).is_some();
        if written {
            log::debug!("Wrote {} bytes for user id {}", buffer.len(), user_id);
        }
        written
    }

    fn destroy(&mut self, id: &str) -> bool {
        let result = self.storage.delete_where(Column::Id, Operator::Eq, &Field::from(id));
        self.record("destroy", result).is_some()
    }

    fn gc(&mut self) -> bool {
        let result = self.storage.delete_where(Column::Expire, Operator::Lt, &Field::Int(Self::now()));
        match self.record("gc", result) {
            Some(count) => {
                if count > 0 {
                    log::info!("Swept {} expired sessions", count);
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.phase != Phase::Finished {
            self.finish();
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("driver", &self.storage.driver())
            .field("phase", &self.phase)
            .field("fingerprint", &self.fingerprint_enabled.then_some(self.guard.mode()))
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}
