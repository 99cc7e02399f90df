//! Error categories used for retry, key-rotation and fallback decisions.
//!
//! | Category          | Retryable | Rotates key |
//! |-------------------|-----------|-------------|
//! | `rate_limit`      | yes       | yes         |
//! | `auth`            | no        | yes         |
//! | `invalid_request` | no        | no          |
//! | `server_error`    | yes       | yes         |
//! | `network`         | yes       | yes         |
//! | `unknown`         | yes       | yes         |
//!
//! ```rust
//! use ai_lib_gateway::error_code::ErrorCategory;
//!
//! let category = ErrorCategory::RateLimit;
//! assert_eq!(category.name(), "rate_limit");
//! assert!(category.retryable());
//! assert!(category.rotates_key());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimit,
    Auth,
    InvalidRequest,
    ServerError,
    Network,
    Unknown,
}

impl ErrorCategory {
    /// Returns the standard name (e.g., `"invalid_request"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Auth => "auth",
            Self::InvalidRequest => "invalid_request",
            Self::ServerError => "server_error",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    #[inline]
    pub fn retryable(&self) -> bool {
        !matches!(self, Self::Auth | Self::InvalidRequest)
    }

    /// Whether the failure is tied to the credential, so another key may succeed.
    #[inline]
    pub fn rotates_key(&self) -> bool {
        !matches!(self, Self::InvalidRequest)
    }

    /// Map an HTTP status to a category, when the status is decisive.
    pub fn from_http_status(status: u16) -> Option<Self> {
        match status {
            429 => Some(Self::RateLimit),
            401 | 403 => Some(Self::Auth),
            400 | 404 | 413 | 422 => Some(Self::InvalidRequest),
            408 => Some(Self::Network),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
