//! Failure taxonomy and classification.
//!
//! [`classify`] maps a low-level [`ProviderError`] onto the closed
//! [`ErrorCode`] set. [`aggregate`] decides what a whole resolution reports
//! once every provider attempt has failed.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::ProviderError;
use crate::ValidationError;

const TIMEOUT_RETRY_AFTER_SECS: u64 = 5;
const RATE_LIMIT_RETRY_AFTER_SECS: u64 = 60;
const NETWORK_RETRY_AFTER_SECS: u64 = 30;
const CONSERVATIVE_RETRY_AFTER_SECS: u64 = 300;

const RATE_LIMIT_PHRASES: [&str; 4] = ["rate limit", "too many requests", "quota exceeded", "throttl"];
const NOT_FOUND_PHRASES: [&str; 3] = ["not found", "no results", "unknown container"];
const NETWORK_PHRASES: [&str; 5] = [
    "connection refused",
    "econnrefused",
    "enotfound",
    "dns",
    "failed to lookup address",
];

/// Closed error taxonomy, plus two degraded-success markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Timeout,
    RateLimit,
    AuthError,
    NotFound,
    NetworkError,
    InvalidResponse,
    UnknownError,
    StaleDataWarning,
    VeryStaleData,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthError => "AUTH_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::StaleDataWarning => "STALE_DATA_WARNING",
            Self::VeryStaleData => "VERY_STALE_DATA",
        }
    }

    /// Markers that accompany successful responses carrying old data.
    pub const fn is_degraded_success(self) -> bool {
        matches!(self, Self::StaleDataWarning | Self::VeryStaleData)
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified, user-facing failure.
///
/// `message` is for logs and operators; `user_message` is safe to show.
/// `retry_after` is in seconds and only set when `retryable` is true.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{message} ({code})")]
pub struct TrackingError {
    pub code: ErrorCode,
    pub message: String,
    pub user_message: String,
    pub status_code: u16,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl TrackingError {
    pub fn new(
        code: ErrorCode,
        message: impl Into<String>,
        user_message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            user_message: user_message.into(),
            status_code,
            retryable: false,
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.retryable = true;
        self.retry_after = Some(seconds);
        self
    }

    pub fn validation(error: &ValidationError) -> Self {
        Self::new(
            ErrorCode::ValidationError,
            error.to_string(),
            format!("Invalid tracking number: {error}."),
            400,
        )
    }

    pub fn stale_data(age_minutes: u64, retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::StaleDataWarning,
            format!("live refresh failed; serving cached data aged {age_minutes} minute(s)"),
            "Live tracking is temporarily unavailable; showing the most recent cached status.",
            200,
        )
        .retry_after(retry_after_secs)
    }

    pub fn very_stale_data(age_minutes: u64, retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::VeryStaleData,
            format!("all providers failed; serving archived data aged {age_minutes} minute(s)"),
            "Live tracking is unavailable; showing older archived data that may be out of date.",
            200,
        )
        .retry_after(retry_after_secs)
    }
}

/// Maps a raw provider error onto the closed taxonomy.
///
/// Precedence: timeout/abort, rate limit, auth, not found, network, then
/// invalid response or unknown.
pub fn classify(error: &ProviderError) -> TrackingError {
    let message = error.to_string();
    let lowered = message.to_ascii_lowercase();

    if matches!(error, ProviderError::Timeout { .. } | ProviderError::Aborted)
        || lowered.contains("timed out")
        || lowered.contains("timeout")
    {
        return TrackingError::new(
            ErrorCode::Timeout,
            message,
            "The tracking provider took too long to respond.",
            504,
        )
        .retry_after(TIMEOUT_RETRY_AFTER_SECS);
    }

    let status = match error {
        ProviderError::Http { status, .. } => Some(*status),
        _ => None,
    };

    if status == Some(429)
        || matches!(error, ProviderError::RateLimited { .. })
        || contains_any(&lowered, &RATE_LIMIT_PHRASES)
    {
        return TrackingError::new(
            ErrorCode::RateLimit,
            message,
            "Too many tracking requests right now; please try again shortly.",
            429,
        )
        .retry_after(RATE_LIMIT_RETRY_AFTER_SECS);
    }

    if matches!(status, Some(401 | 403)) {
        return TrackingError::new(
            ErrorCode::AuthError,
            message,
            "The tracking provider rejected our credentials.",
            502,
        );
    }

    if status == Some(404) || contains_any(&lowered, &NOT_FOUND_PHRASES) {
        return TrackingError::new(
            ErrorCode::NotFound,
            message,
            "No shipment was found for this tracking number.",
            404,
        );
    }

    if matches!(
        error,
        ProviderError::Connect(_) | ProviderError::Dns(_) | ProviderError::CircuitOpen { .. }
    ) || contains_any(&lowered, &NETWORK_PHRASES)
    {
        return TrackingError::new(
            ErrorCode::NetworkError,
            message,
            "The tracking provider could not be reached.",
            503,
        )
        .retry_after(NETWORK_RETRY_AFTER_SECS);
    }

    let code = if matches!(error, ProviderError::InvalidPayload(_)) || status.is_some() {
        ErrorCode::InvalidResponse
    } else {
        ErrorCode::UnknownError
    };

    TrackingError::new(
        code,
        message,
        "Tracking data could not be retrieved right now.",
        502,
    )
    .retry_after(CONSERVATIVE_RETRY_AFTER_SECS)
}

/// Aggregate decision over every per-provider failure of one resolution.
///
/// Any `RATE_LIMIT` or `NETWORK_ERROR` means "temporarily unavailable, retry
/// later"; otherwise the shipment is reported as not found and not retryable.
pub fn aggregate(errors: &[TrackingError]) -> TrackingError {
    if errors.is_empty() {
        return TrackingError::new(
            ErrorCode::NetworkError,
            "no tracking providers are available for this identifier type",
            "Tracking is temporarily unavailable; please try again later.",
            503,
        )
        .retry_after(NETWORK_RETRY_AFTER_SECS);
    }

    let transient = errors
        .iter()
        .filter(|error| matches!(error.code, ErrorCode::RateLimit | ErrorCode::NetworkError))
        .collect::<Vec<_>>();

    if let Some(first) = transient.first() {
        let retry_after = transient
            .iter()
            .filter_map(|error| error.retry_after)
            .max()
            .unwrap_or(RATE_LIMIT_RETRY_AFTER_SECS);

        return TrackingError::new(
            first.code,
            format!(
                "all {} provider attempt(s) failed; {} transient",
                errors.len(),
                transient.len()
            ),
            "Tracking is temporarily unavailable; please try again later.",
            503,
        )
        .retry_after(retry_after);
    }

    TrackingError::new(
        ErrorCode::NotFound,
        format!("all {} provider attempt(s) failed without a transient cause", errors.len()),
        "No shipment was found for this tracking number. Please check the number and type.",
        404,
    )
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn http(status: u16, message: &str) -> ProviderError {
        ProviderError::Http {
            status,
            message: message.to_owned(),
        }
    }

    #[test]
    fn timeouts_take_precedence() {
        let error = classify(&ProviderError::Timeout {
            after: Duration::from_secs(5),
        });
        assert_eq!(error.code, ErrorCode::Timeout);
        assert!(error.retryable);
        assert_eq!(error.retry_after, Some(TIMEOUT_RETRY_AFTER_SECS));

        // A 404 whose body mentions a timeout is still a timeout.
        assert_eq!(classify(&http(404, "gateway timeout")).code, ErrorCode::Timeout);
        assert_eq!(classify(&ProviderError::Aborted).code, ErrorCode::Timeout);
    }

    #[test]
    fn rate_limits_by_status_or_phrase() {
        let by_status = classify(&http(429, "slow down"));
        assert_eq!(by_status.code, ErrorCode::RateLimit);
        assert!(by_status.retry_after.unwrap_or_default() >= 60);

        assert_eq!(
            classify(&http(500, "Too Many Requests")).code,
            ErrorCode::RateLimit
        );
        assert_eq!(
            classify(&ProviderError::RateLimited {
                provider: String::from("maersk")
            })
            .code,
            ErrorCode::RateLimit
        );
    }

    #[test]
    fn auth_errors_are_not_retryable() {
        for status in [401, 403] {
            let error = classify(&http(status, "forbidden"));
            assert_eq!(error.code, ErrorCode::AuthError);
            assert!(!error.retryable);
            assert_eq!(error.retry_after, None);
        }
    }

    #[test]
    fn not_found_by_status_or_phrase() {
        assert_eq!(classify(&http(404, "")).code, ErrorCode::NotFound);
        let phrased = classify(&ProviderError::Other(String::from("Container not found")));
        assert_eq!(phrased.code, ErrorCode::NotFound);
        assert!(!phrased.retryable);
    }

    #[test]
    fn network_failures_are_retryable() {
        let connect = classify(&ProviderError::Connect(String::from("connection refused")));
        assert_eq!(connect.code, ErrorCode::NetworkError);
        assert!(connect.retryable);

        let dns = classify(&ProviderError::Dns(String::from("no such host")));
        assert_eq!(dns.code, ErrorCode::NetworkError);

        let circuit = classify(&ProviderError::CircuitOpen {
            provider: String::from("searates"),
        });
        assert_eq!(circuit.code, ErrorCode::NetworkError);
    }

    #[test]
    fn everything_else_gets_conservative_backoff() {
        let invalid = classify(&ProviderError::InvalidPayload(String::from("missing data")));
        assert_eq!(invalid.code, ErrorCode::InvalidResponse);
        assert_eq!(invalid.retry_after, Some(CONSERVATIVE_RETRY_AFTER_SECS));

        let server = classify(&http(500, "internal server error"));
        assert_eq!(server.code, ErrorCode::InvalidResponse);

        let unknown = classify(&ProviderError::Other(String::from("boom")));
        assert_eq!(unknown.code, ErrorCode::UnknownError);
        assert!(unknown.retryable);
    }

    #[test]
    fn aggregate_reports_transient_when_any_rate_limit_or_network() {
        let errors = vec![
            classify(&http(404, "")),
            classify(&http(429, "")),
            classify(&http(403, "")),
        ];

        let aggregate = aggregate(&errors);
        assert_eq!(aggregate.code, ErrorCode::RateLimit);
        assert!(aggregate.retryable);
        assert_eq!(aggregate.status_code, 503);
        assert_eq!(aggregate.retry_after, Some(RATE_LIMIT_RETRY_AFTER_SECS));
    }

    #[test]
    fn aggregate_reports_not_found_otherwise() {
        let errors = vec![classify(&http(404, "")), classify(&http(404, ""))];

        let aggregate = aggregate(&errors);
        assert_eq!(aggregate.code, ErrorCode::NotFound);
        assert!(!aggregate.retryable);
        assert_eq!(aggregate.status_code, 404);
    }

    #[test]
    fn aggregate_without_candidates_is_transient() {
        let aggregate = aggregate(&[]);
        assert_eq!(aggregate.code, ErrorCode::NetworkError);
        assert!(aggregate.retryable);
    }

    #[test]
    fn tracking_error_serializes_camel_case() {
        let error = classify(&http(429, ""));
        let json = serde_json::to_value(&error).expect("serializable");

        assert_eq!(json["code"], "RATE_LIMIT");
        assert_eq!(json["statusCode"], 429);
        assert_eq!(json["retryAfter"], 60);
        assert!(json.get("userMessage").is_some());
    }
}
