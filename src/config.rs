//! Client configuration.
//!
//! The SDK is a library, so configuration is a plain struct with sensible
//! defaults rather than a CLI surface. Environment and deployment URL
//! selection belongs to the embedding application.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Safety margin subtracted from the server-reported session expiry so the
/// local session is always treated as expiring strictly before the server
/// invalidates it. The right value depends on deployment network latency,
/// which is why it is configurable.
pub const DEFAULT_SESSION_MARGIN: Duration = Duration::from_secs(60);

/// REST port of the node-local wallet API.
pub const DEFAULT_NODE_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Platform API base URL, always with a trailing slash.
    pub base_url: String,
    /// HTTPS port of the node-local wallet API.
    pub node_port: u16,
    /// Clock-skew/latency buffer applied to session expiry.
    pub session_margin: Duration,
    /// Polling schedule for asynchronous macaroon issuance.
    pub macaroon_retry: RetryPolicy,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Capacity of the rolling error log.
    pub error_log_capacity: usize,
}

impl ClientConfig {
    /// Build a configuration for the given platform API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.into()),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/v1/".to_string(),
            node_port: DEFAULT_NODE_PORT,
            session_margin: DEFAULT_SESSION_MARGIN,
            macaroon_retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            error_log_capacity: crate::error::ERROR_LOG_CAPACITY,
        }
    }
}

fn normalize_base_url(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}
