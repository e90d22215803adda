//! Replay window on the signed timestamp header.

use super::request::{IncomingRequest, TIMESTAMP_HEADER};
use crate::signing::canonical::signed_header_names;
use thiserror::Error;

/// Reasons a request falls outside the replay window.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FreshnessError {
    /// The timestamp header is absent
    #[error("timestamp header is missing")]
    MissingTimestamp,

    /// The timestamp header is present but not covered by the signature
    #[error("timestamp header is not part of the signed headers")]
    UnsignedTimestamp,

    /// The timestamp is not an integer
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),

    /// The request was signed longer ago than allowed
    #[error("request expired: signed {age_ms}ms ago, limit is {max_age_seconds}s")]
    Expired { age_ms: i64, max_age_seconds: u64 },

    /// The timestamp lies further in the future than allowed
    #[error("timestamp is {skew_ms}ms in the future")]
    FromFuture { skew_ms: i64 },
}

/// Check that `request` was signed within `max_age_seconds` of `now_ms`.
///
/// The timestamp must be listed in the signed headers, otherwise it carries
/// no authenticity and is rejected. Clock skew in either direction is bounded
/// by the same window.
pub fn check_freshness(
    request: &IncomingRequest,
    max_age_seconds: u64,
    now_ms: i64,
) -> Result<(), FreshnessError> {
    let raw = request.header_or_empty(TIMESTAMP_HEADER).trim();
    if raw.is_empty() {
        return Err(FreshnessError::MissingTimestamp);
    }

    let signed = signed_header_names(request.signed_headers())
        .any(|name| name.eq_ignore_ascii_case(TIMESTAMP_HEADER));
    if !signed {
        return Err(FreshnessError::UnsignedTimestamp);
    }

    let timestamp_ms: i64 = raw
        .parse()
        .map_err(|_| FreshnessError::MalformedTimestamp(raw.to_string()))?;

    let max_age_ms = i64::try_from(max_age_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    let age_ms = now_ms.saturating_sub(timestamp_ms);

    if age_ms > max_age_ms {
        return Err(FreshnessError::Expired {
            age_ms,
            max_age_seconds,
        });
    }
    if age_ms < -max_age_ms {
        return Err(FreshnessError::FromFuture {
            skew_ms: age_ms.saturating_neg(),
        });
    }

    Ok(())
}
