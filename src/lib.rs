//! webhook-gate - signature verification for Contentful webhooks
//!
//! Incoming requests are reduced to a canonical string (method, path, the
//! caller-selected headers and the body), signed with HMAC-SHA256 under a
//! shared secret, and compared in constant time against the
//! `X-Contentful-Signature` header.

pub mod logging;
pub mod settings;
pub mod signing;
pub mod webhooks;
