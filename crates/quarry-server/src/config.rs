//! Server configuration.

use std::net::SocketAddr;

/// Default max body size for REST requests (1 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default upper bound on a client-requested step count.
pub const DEFAULT_MAX_STEPS_LIMIT: usize = 50;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Enable request logging.
    pub request_logging: bool,

    /// Allow cross-origin requests from any origin.
    pub cors: bool,

    /// Maximum REST request body size in bytes.
    pub max_body_size: usize,

    /// Largest `max_steps` a client may request.
    pub max_steps_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_logging: true,
            cors: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            max_steps_limit: DEFAULT_MAX_STEPS_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    /// Enable or disable permissive CORS.
    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.cors = enabled;
        self
    }

    /// Set the maximum REST request body size.
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the largest step count a client may request.
    pub fn with_max_steps_limit(mut self, limit: usize) -> Self {
        self.max_steps_limit = limit;
        self
    }
}
