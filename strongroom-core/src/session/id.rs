//! Session identifiers

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

/// Random bytes per generated id (43 characters once encoded)
pub const ID_BYTES: usize = 32;

const MIN_LEN: usize = 22;
const MAX_LEN: usize = 256;

/// Fresh session id from the OS random source
pub fn generate_id() -> String {
    let mut bytes = [0u8; ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Whether an id received from a client is acceptable
pub fn is_valid_id(id: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b',' || b == b'-' || b == b'_')
}
