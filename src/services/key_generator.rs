//! API key generation and hashing.
//!
//! # Key Format
//!
//! `ak_<4 uppercase hex>_<43 url-safe base64 chars>`
//!
//! The secret part is 32 bytes from the thread-local CSPRNG (256 bits of
//! entropy). The `ak_XXXX` head is the display prefix; it is stored next to the
//! hash so humans can tell keys apart, and is never used to authorize anything.
//!
//! # Storage
//!
//! Keys are stored as bcrypt hashes. bcrypt salts every hash, so the only way
//! to find the record for a presented key is to verify it against each
//! candidate hash.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

/// Fixed scheme marker at the start of every key.
pub const KEY_SCHEME: &str = "ak";

/// Length of the display prefix, `ak_XXXX`.
pub const PREFIX_LEN: usize = 7;

/// Freshly generated key. The plaintext must leave the process exactly once.
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    pub plaintext: String,
    pub prefix: String,
}

/// Generate a new random API key.
pub fn generate_api_key() -> GeneratedApiKey {
    let id_bytes: [u8; 2] = rand::random();
    let secret_bytes: [u8; 32] = rand::random();

    let prefix = format!("{}_{}", KEY_SCHEME, hex::encode_upper(id_bytes));
    let plaintext = format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(secret_bytes));

    GeneratedApiKey { plaintext, prefix }
}

/// Display prefix of a presented key, safe to log.
pub fn display_prefix(key: &str) -> &str {
    match key.char_indices().nth(PREFIX_LEN) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

/// Hash a key with bcrypt at the given cost.
///
/// This is CPU bound; async callers should run it on the blocking pool.
pub fn hash_api_key(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Check a presented key against a stored bcrypt hash.
///
/// A hash that bcrypt cannot parse never matches.
pub fn verify_api_key(plaintext: &str, key_hash: &str) -> bool {
    match bcrypt::verify(plaintext, key_hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored API key hash could not be verified");
            false
        }
    }
}
