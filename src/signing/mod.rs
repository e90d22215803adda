//! Request signing
//!
//! This module contains the signature scheme used by Contentful webhooks:
//! a canonical string built from the request, and an HMAC-SHA256 digest of
//! that string under a shared secret.

pub mod canonical;
pub mod secret;
pub mod verifier;

pub use canonical::{build_canonical_string, HeaderLookup};
pub use secret::SigningSecret;
pub use verifier::{sign, verify};
