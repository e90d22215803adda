//! Captured webhook requests
//!
//! The body is read exactly once into an immutable buffer. Verification and
//! the downstream handler both borrow the same captured request.

use crate::signing::{build_canonical_string, verify, HeaderLookup, SigningSecret};
use axum::{
    body::Bytes,
    extract::Request,
    http::{HeaderMap, Method},
};

/// Header carrying the hex HMAC signature
pub const SIGNATURE_HEADER: &str = "x-contentful-signature";

/// Header listing the signed header names, comma separated
pub const SIGNED_HEADERS_HEADER: &str = "x-contentful-signed-headers";

/// Header carrying the signing time in milliseconds since the Unix epoch
pub const TIMESTAMP_HEADER: &str = "x-contentful-timestamp";

/// An inbound webhook request, captured once and immutable afterwards.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl IncomingRequest {
    /// Create a request from already-captured parts
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }

    /// Buffer an axum request.
    ///
    /// The signed path includes the query string when one is present. A body
    /// that cannot be read, or that exceeds `max_body_bytes`, is captured as
    /// empty; such a request then fails verification.
    pub async fn capture(request: Request, max_body_bytes: usize) -> Self {
        let (parts, body) = request.into_parts();

        let body = match axum::body::to_bytes(body, max_body_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read webhook body, treating it as empty");
                Bytes::new()
            }
        };

        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Self::new(parts.method, path, parts.headers, body)
    }

    /// HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path as signed
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw body bytes
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Header value, or the empty string if absent or not valid UTF-8
    pub fn header_or_empty(&self, name: &str) -> &str {
        self.headers.header(name).unwrap_or("")
    }

    /// The caller-supplied signature
    pub fn signature(&self) -> &str {
        self.header_or_empty(SIGNATURE_HEADER)
    }

    /// The caller-supplied signed-headers list
    pub fn signed_headers(&self) -> &str {
        self.header_or_empty(SIGNED_HEADERS_HEADER)
    }

    /// Build the canonical string for this request
    pub fn canonical_string(&self) -> String {
        build_canonical_string(
            self.method.as_str(),
            &self.path,
            self.signed_headers(),
            &self.headers,
            &self.body,
        )
    }

    /// Verify the request signature under `secret`
    pub fn verify_signature(&self, secret: &SigningSecret) -> bool {
        let canonical = self.canonical_string();
        tracing::debug!(canonical_len = canonical.len(), "Built canonical string");
        verify(secret, &canonical, self.signature())
    }
}
