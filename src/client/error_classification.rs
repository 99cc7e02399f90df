//! Error classification logic
//!
//! Every dispatcher consults [`classify`] to decide between retrying, rotating to the
//! next key, falling back to the next candidate, or failing fast.

use crate::error_code::ErrorCategory;
use crate::Error;
use once_cell::sync::Lazy;
use regex::Regex;

/// Outcome of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub is_retryable: bool,
    pub should_rotate_key: bool,
}

impl From<ErrorCategory> for ErrorClassification {
    fn from(category: ErrorCategory) -> Self {
        Self {
            category,
            is_retryable: category.retryable(),
            should_rotate_key: category.rotates_key(),
        }
    }
}

/// Status code quoted in error text. Only a whole number that opens the message or follows
/// `http`, `status`, `error` or `code` counts, so token counts and request ids never match.
fn quoted_status(codes: &str) -> Regex {
    Regex::new(&format!(
        r"(?:^\s*|\b(?:http|status|error|code)\b\W{{0,3}})(?:{codes})\b"
    ))
    .expect("valid status regex")
}

static RATE_LIMIT_STATUS: Lazy<Regex> = Lazy::new(|| quoted_status("429"));
static AUTH_STATUS: Lazy<Regex> = Lazy::new(|| quoted_status("401"));
static SERVER_STATUS: Lazy<Regex> = Lazy::new(|| quoted_status(r"5\d\d"));

/// Classify an error raised by a provider call.
///
/// Composite dispatch errors are classified by their last cause. Cancellation is not a
/// provider failure; callers must check [`Error::is_cancelled`] first. If asked anyway it is
/// reported as a non-retryable, non-rotating `unknown`.
pub fn classify(error: &Error) -> ErrorClassification {
    match error.last_cause() {
        Error::Cancelled => ErrorClassification {
            category: ErrorCategory::Unknown,
            is_retryable: false,
            should_rotate_key: false,
        },
        Error::NoEligibleKeys { .. } => ErrorCategory::RateLimit.into(),
        Error::Provider {
            status: Some(status),
            message,
            ..
        } => {
            // A keyword in the body wins over a generic status (e.g. 400 + "rate limit").
            match classify_message(message) {
                ErrorCategory::Unknown => ErrorCategory::from_http_status(*status)
                    .unwrap_or(ErrorCategory::Unknown)
                    .into(),
                category => category.into(),
            }
        }
        Error::Provider {
            status: None,
            message,
            ..
        } => classify_message(message).into(),
        Error::Validation { .. } => ErrorCategory::InvalidRequest.into(),
        other => classify_message(&other.to_string()).into(),
    }
}

/// Keyword classification over free-form error text (case-insensitive).
pub fn classify_message(message: &str) -> ErrorCategory {
    let m = message.to_lowercase();

    if m.contains("rate limit")
        || m.contains("rate_limit")
        || m.contains("ratelimit")
        || m.contains("too many requests")
        || RATE_LIMIT_STATUS.is_match(&m)
    {
        return ErrorCategory::RateLimit;
    }

    if m.contains("invalid api key")
        || m.contains("invalid_api_key")
        || m.contains("incorrect api key")
        || m.contains("unauthorized")
        || m.contains("authentication")
        || AUTH_STATUS.is_match(&m)
    {
        return ErrorCategory::Auth;
    }

    if m.contains("bad request")
        || m.contains("invalid parameter")
        || m.contains("invalid_request")
        || m.contains("invalid request")
    {
        return ErrorCategory::InvalidRequest;
    }

    if m.contains("internal server error")
        || m.contains("server error")
        || m.contains("bad gateway")
        || m.contains("service unavailable")
        || m.contains("overloaded")
        || SERVER_STATUS.is_match(&m)
    {
        return ErrorCategory::ServerError;
    }

    if m.contains("timeout")
        || m.contains("timed out")
        || m.contains("connection")
        || m.contains("econnreset")
        || m.contains("econnrefused")
        || m.contains("network")
        || m.contains("dns")
    {
        return ErrorCategory::Network;
    }

    ErrorCategory::Unknown
}
