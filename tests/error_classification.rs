//! Tests for error classification logic

use ai_lib_gateway::client::error_classification::classify_message;
use ai_lib_gateway::dispatch::auto::can_fall_back;
use ai_lib_gateway::{classify, Error, ErrorCategory};

fn provider(status: Option<u16>, message: &str) -> Error {
    Error::provider("openai", status, message)
}

#[test]
fn test_rate_limit_wording_always_wins() {
    // Whatever the status, a rate-limit body is retryable and rotates the key.
    let cases = [
        (Some(400), "Rate limit reached for gpt-4o"),
        (Some(429), "slow down"),
        (Some(500), "rate_limit_exceeded"),
        (None, "Too Many Requests"),
        (None, "error 429 from upstream"),
    ];

    for (status, message) in cases {
        let c = classify(&provider(status, message));
        assert_eq!(c.category, ErrorCategory::RateLimit, "{status:?} {message}");
        assert!(c.is_retryable, "'{message}' should be retryable");
        assert!(c.should_rotate_key, "'{message}' should rotate the key");
    }
}

#[test]
fn test_category_table() {
    let cases = [
        (provider(Some(401), "Invalid API key provided"), ErrorCategory::Auth, false, true),
        (provider(None, "Unauthorized"), ErrorCategory::Auth, false, true),
        (provider(Some(403), "forbidden"), ErrorCategory::Auth, false, true),
        (provider(Some(400), "Bad Request"), ErrorCategory::InvalidRequest, false, false),
        (provider(Some(422), "unprocessable"), ErrorCategory::InvalidRequest, false, false),
        (provider(Some(503), "Service Unavailable"), ErrorCategory::ServerError, true, true),
        (provider(None, "upstream returned HTTP 502"), ErrorCategory::ServerError, true, true),
        (provider(None, "connect timeout"), ErrorCategory::Network, true, true),
        (provider(None, "ECONNRESET"), ErrorCategory::Network, true, true),
        (provider(Some(418), "teapot"), ErrorCategory::Unknown, true, true),
        (provider(None, "something odd"), ErrorCategory::Unknown, true, true),
    ];

    for (error, category, retryable, rotates) in cases {
        let c = classify(&error);
        assert_eq!(c.category, category, "{error}");
        assert_eq!(c.is_retryable, retryable, "{error}");
        assert_eq!(c.should_rotate_key, rotates, "{error}");
    }
}

#[test]
fn test_numbers_inside_messages_are_not_status_codes() {
    let context_length = provider(
        Some(400),
        "This model's maximum context length is 4097 tokens. However, you requested 4010 tokens.",
    );
    let c = classify(&context_length);
    assert_eq!(c.category, ErrorCategory::InvalidRequest);
    assert!(!c.is_retryable);
    assert!(!c.should_rotate_key);
    assert!(!can_fall_back(&context_length));

    let request_id = provider(Some(400), "Bad Request (request id 1f4290ab)");
    let c = classify(&request_id);
    assert_eq!(c.category, ErrorCategory::InvalidRequest);
    assert!(!c.should_rotate_key);

    assert_eq!(classify_message("limit is 512 tokens"), ErrorCategory::Unknown);
    assert_eq!(classify_message("HTTP 429"), ErrorCategory::RateLimit);
    assert_eq!(classify_message("status=401"), ErrorCategory::Auth);
}

#[test]
fn test_keyword_matching_is_case_insensitive() {
    assert_eq!(classify_message("RATE LIMIT"), ErrorCategory::RateLimit);
    assert_eq!(classify_message("Incorrect API Key"), ErrorCategory::Auth);
    assert_eq!(classify_message("Invalid Parameter: top_p"), ErrorCategory::InvalidRequest);
    assert_eq!(classify_message("Model Overloaded"), ErrorCategory::ServerError);
    assert_eq!(classify_message("DNS lookup failed"), ErrorCategory::Network);
}

#[test]
fn test_composite_errors_use_last_cause() {
    let exhausted = Error::KeysExhausted {
        provider: "openai".into(),
        model: "gpt-4o".into(),
        attempts: 2,
        source: Box::new(provider(Some(400), "bad request")),
    };
    assert_eq!(classify(&exhausted).category, ErrorCategory::InvalidRequest);

    let all_failed = Error::AllCandidatesFailed {
        attempted: vec!["openai:gpt-4o".into()],
        source: Box::new(exhausted),
    };
    assert_eq!(classify(&all_failed).category, ErrorCategory::InvalidRequest);
}

#[test]
fn test_no_eligible_keys_is_rate_limit() {
    let c = classify(&Error::NoEligibleKeys {
        provider: "openai".into(),
    });
    assert_eq!(c.category, ErrorCategory::RateLimit);
    assert!(c.is_retryable);
}

#[test]
fn test_fallback_decisions() {
    let fallbackable = [
        provider(Some(429), "too many requests"),
        provider(Some(503), "overloaded"),
        provider(Some(401), "invalid api key"),
        provider(None, "connection refused"),
        provider(None, "mystery"),
        Error::NoEligibleKeys {
            provider: "openai".into(),
        },
    ];
    for error in &fallbackable {
        assert!(can_fall_back(error), "{error} should fall back");
    }

    let terminal = [
        provider(Some(400), "bad request"),
        provider(None, "invalid_request_error"),
        Error::Cancelled,
    ];
    for error in &terminal {
        assert!(!can_fall_back(error), "{error} should NOT fall back");
    }
}

#[test]
fn test_cancellation_is_never_retried() {
    let c = classify(&Error::Cancelled);
    assert!(!c.is_retryable);
    assert!(!c.should_rotate_key);
}
