//! In-memory session state owned by the controller

use crate::codec::{self, Value, VarMap};
use crate::error::Result;

/// Variable holding the application user id
pub const VAR_USER_ID: &str = "id_user";
/// Variable holding the client fingerprint
pub const VAR_FINGERPRINT: &str = "fp";
/// Variable holding the client user agent
pub const VAR_USER_AGENT: &str = "ua";
/// Variable holding the client IP
pub const VAR_IP: &str = "ip";

/// Session id plus its decoded variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    id: String,
    vars: VarMap,
}

impl SessionState {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), vars: VarMap::new() }
    }

    pub(crate) fn with_vars(id: impl Into<String>, vars: VarMap) -> Self {
        Self { id: id.into(), vars }
    }

    /// Decode a stored buffer into state for `id`
    pub fn from_buffer(id: impl Into<String>, buffer: &[u8]) -> Result<Self> {
        Ok(Self { id: id.into(), vars: codec::decode(buffer)? })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = id;
    }

    pub fn vars(&self) -> &VarMap {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Set a variable; fails for names the stored buffer cannot carry
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        self.vars.insert(name, value)
    }

    /// Set one of the store's own variables (`VAR_*`)
    pub(crate) fn put(&mut self, name: &'static str, value: impl Into<Value>) {
        self.vars.put(name.to_string(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    /// `id_user` as an integer; 0 when absent or not numeric
    pub fn user_id(&self) -> i64 {
        user_id_of(&self.vars)
    }

    /// Buffer the hooks persist
    pub fn encode(&self) -> Vec<u8> {
        self.vars.encode()
    }
}

pub(crate) fn user_id_of(vars: &VarMap) -> i64 {
    vars.get(VAR_USER_ID).and_then(Value::to_int_lossy).unwrap_or(0)
}
