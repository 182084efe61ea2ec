//! `sha256:<hex>` digests as recorded in lock files

use sha2::{Digest, Sha256};

/// Algorithm tag leading every digest.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Digest `bytes` into the tagged lowercase-hex form.
pub fn sha256_digest(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    let mut out = String::with_capacity(DIGEST_PREFIX.len() + hash.len() * 2);
    out.push_str(DIGEST_PREFIX);
    for byte in hash {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}
