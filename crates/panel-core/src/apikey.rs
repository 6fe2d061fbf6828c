//! API key minting and digests.
//!
//! Keys carry the `sk_` prefix the tool validates against. The panel stores
//! only a SHA-256 digest; the plaintext key is shown once at mint time.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix every panel API key carries.
pub const KEY_PREFIX: &str = "sk_";

/// Mint a fresh API key.
pub fn generate_api_key() -> String {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("{KEY_PREFIX}{a}{}", &b[..8])
}

/// Digest used to store and look up a key.
pub fn api_key_digest(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Quick shape check without touching the database.
pub fn looks_like_api_key(key: &str) -> bool {
    key.starts_with(KEY_PREFIX) && key.len() > KEY_PREFIX.len() + 16
}
