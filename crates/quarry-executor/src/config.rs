//! Executor client configuration.

use std::time::Duration;

/// Default execution service URL.
pub const DEFAULT_EXECUTOR_URL: &str = "http://localhost:8000";

/// Configuration for the execution service client.
///
/// The timeout is a client-side ceiling on one RPC; the service is expected
/// to enforce its own, shorter, execution timeout and report it as an error.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Base URL of the execution service.
    pub base_url: String,

    /// Per-call timeout.
    pub timeout: Duration,

    /// Bearer token sent with each call, if the service requires one.
    pub api_token: Option<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_EXECUTOR_URL.to_string(),
            timeout: Duration::from_secs(120),
            api_token: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a configuration pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bearer token.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Full URL for an endpoint path.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.base_url, DEFAULT_EXECUTOR_URL);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ExecutorConfig::new("http://exec:9000/")
            .with_timeout(Duration::from_secs(5))
            .with_api_token("t");
        assert_eq!(config.endpoint("execute"), "http://exec:9000/execute");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
