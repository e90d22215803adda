//! Webhooks module
//!
//! This module contains the webhook server that gates Contentful webhook
//! deliveries behind signature verification.

pub mod freshness;
pub mod request;
pub mod server;

pub use freshness::{check_freshness, FreshnessError};
pub use request::{IncomingRequest, SIGNATURE_HEADER, SIGNED_HEADERS_HEADER, TIMESTAMP_HEADER};
pub use server::{
    authenticate, create_webhook_router, health_handler, serve, AppState, ServerError,
    WebhookError, WebhookResult,
};
