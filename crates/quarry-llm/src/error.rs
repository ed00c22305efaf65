//! Failures of a model call.
//!
//! Every variant is a hard failure for the agent run that made the call;
//! only [`LlmError::is_retryable`] errors are worth another attempt, and only
//! when the backend was configured to retry.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LlmError>;

// ─────────────────────────────────────────────────────────────────────────────
// Rate limiting
// ─────────────────────────────────────────────────────────────────────────────

/// A 429 from the provider, with the wait it asked for if it gave one.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(message: impl Into<String>, retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(message)
        }
    }

    /// Build from an OpenAI-style error body and its `Retry-After` header.
    ///
    /// The header wins. Groq omits it and writes "Please try again in 6.57s"
    /// into the message instead, so the body is the fallback.
    pub fn parse_openai(message: &str, retry_after_header: Option<&str>) -> Self {
        let header_wait = retry_after_header
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        Self {
            message: message.to_string(),
            retry_after: header_wait.or_else(|| wait_from_message(message)),
        }
    }
}

impl std::fmt::Display for RateLimitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.retry_after {
            Some(wait) => write!(f, "{} (retry after {:.2}s)", self.message, wait.as_secs_f64()),
            None => f.write_str(&self.message),
        }
    }
}

/// Seconds following "try again in" / "retry in", case-insensitive.
fn wait_from_message(message: &str) -> Option<Duration> {
    let lower = message.to_ascii_lowercase();
    ["try again in ", "retry in "].iter().find_map(|phrase| {
        let start = lower.find(phrase)? + phrase.len();
        let digits: String = lower[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        digits.parse::<f64>().ok().map(Duration::from_secs_f64)
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Malformed replies
// ─────────────────────────────────────────────────────────────────────────────

/// A reply that parsed but cannot be appended to a transcript.
#[derive(Debug, Clone, Error)]
pub enum ResponseValidationError {
    #[error("invalid tool call '{id}': {reason}")]
    InvalidToolCall { id: String, reason: String },

    /// The reply was not from the assistant.
    #[error("unexpected message role: {role}")]
    InvalidRole { role: String },

    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ResponseValidationError>),
}

impl ResponseValidationError {
    pub fn invalid_tool_call(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidToolCall {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_role(role: impl Into<String>) -> Self {
        Self::InvalidRole { role: role.into() }
    }

    pub fn multiple(errors: Vec<ResponseValidationError>) -> Self {
        Self::Multiple(errors)
    }
}

impl From<ResponseValidationError> for LlmError {
    fn from(err: ResponseValidationError) -> Self {
        LlmError::InvalidRequest(format!("malformed model reply: {}", err))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LlmError
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider answered with an error status.
    #[error("Backend error: {0}")]
    Backend(String),

    /// The request never got an answer (connect failure, timeout, reset).
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rejected by the provider as malformed, or a malformed reply.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(RateLimitInfo),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::RateLimit(RateLimitInfo::new(message))
    }

    /// The provider-requested wait, for rate limits that named one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit(info) => info.retry_after,
            _ => None,
        }
    }

    /// Transient failures: the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimit(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "request timed out: "
        } else if err.is_connect() {
            "connection failed: "
        } else {
            ""
        };
        LlmError::Network(format!("{}{}", kind, err))
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_retry() {
        let transient = [
            LlmError::Network("connection reset".to_string()),
            LlmError::rate_limit("429"),
        ];
        let permanent = [
            LlmError::Config("bad config".to_string()),
            LlmError::Auth("unauthorized".to_string()),
            LlmError::InvalidRequest("tool call without id".to_string()),
            LlmError::Backend("500".to_string()),
        ];
        assert!(transient.iter().all(LlmError::is_retryable));
        assert!(!permanent.iter().any(LlmError::is_retryable));
    }

    #[test]
    fn test_header_wait_is_seconds() {
        let info = RateLimitInfo::parse_openai("limited", Some(" 10 "));
        assert_eq!(info.retry_after, Some(Duration::from_secs(10)));

        let info = RateLimitInfo::parse_openai("limited", Some("soon"));
        assert_eq!(info.retry_after, None);
    }

    #[test]
    fn test_parse_openai_prefers_header() {
        let info = RateLimitInfo::parse_openai("Please try again in 9s", Some("3"));
        assert_eq!(info.retry_after, Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_parse_openai_falls_back_to_message() {
        let info = RateLimitInfo::parse_openai(
            "Rate limit reached for model. Please try again in 6.5s.",
            None,
        );
        assert_eq!(info.retry_after, Some(Duration::from_secs_f64(6.5)));

        let info = RateLimitInfo::parse_openai("Try again in 2s", None);
        assert_eq!(info.retry_after, Some(Duration::from_secs(2)));

        let info = RateLimitInfo::parse_openai("slow down", None);
        assert_eq!(info.retry_after, None);
    }

    #[test]
    fn test_llm_error_retry_after() {
        let err = LlmError::RateLimit(RateLimitInfo::with_retry_after(
            "limited",
            Duration::from_secs(5),
        ));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
        assert_eq!(LlmError::rate_limit("limited").retry_after(), None);
        assert_eq!(LlmError::Network("timeout".into()).retry_after(), None);
    }

    #[test]
    fn test_rate_limit_info_display() {
        assert_eq!(RateLimitInfo::new("Rate limited").to_string(), "Rate limited");

        let info = RateLimitInfo::with_retry_after("Rate limited", Duration::from_secs_f64(6.5));
        assert_eq!(info.to_string(), "Rate limited (retry after 6.50s)");
    }

    #[test]
    fn test_multiple_errors_render_each() {
        let err = ResponseValidationError::multiple(vec![
            ResponseValidationError::invalid_role("user"),
            ResponseValidationError::invalid_tool_call("x", "bad"),
        ]);
        assert_eq!(
            err.to_string(),
            "unexpected message role: user; invalid tool call 'x': bad"
        );
    }

    #[test]
    fn test_malformed_reply_is_invalid_request() {
        let err: LlmError = ResponseValidationError::invalid_tool_call("", "empty id").into();
        assert!(matches!(err, LlmError::InvalidRequest(ref m) if m.contains("malformed model reply")));
    }
}
