//! HMAC-SHA256 signing and verification of canonical strings.

use super::SigningSecret;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Compute the signature of a canonical string.
///
/// Returns the lowercase hex encoding of `HMAC-SHA256(secret, canonical)`,
/// always 64 characters long.
pub fn sign(secret: &SigningSecret, canonical: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take any key size");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a caller-supplied signature against a canonical string.
///
/// The expected hex digest and `provided` are compared byte for byte in
/// constant time. A length mismatch (including an empty `provided`) is a
/// plain `false`. Uppercase hex does not match.
pub fn verify(secret: &SigningSecret, canonical: &str, provided: &str) -> bool {
    let expected = sign(secret, canonical);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
