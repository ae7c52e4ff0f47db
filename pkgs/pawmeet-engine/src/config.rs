//! Engine configuration

use std::time::Duration;

/// How a message snapshot containing undecodable documents is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotDecodePolicy {
    /// Skip only the offending documents and deliver the rest
    #[default]
    DropInvalid,
    /// Discard the whole snapshot and keep the last good one
    RejectSnapshot,
}

/// Configuration for the coordination engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the backend API, without trailing slash
    pub base_url: String,

    /// Per-request timeout in seconds (default: 15s)
    pub request_timeout_secs: u64,

    /// Max in-flight conversation resolutions per directory pass (default: 8)
    pub directory_concurrency: usize,

    /// Poll interval of the HTTP message feed in millis (default: 2000ms)
    pub feed_poll_interval_ms: u64,

    /// Handling of undecodable messages inside a snapshot
    pub decode_policy: SnapshotDecodePolicy,
}

impl EngineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn feed_poll_interval(&self) -> Duration {
        Duration::from_millis(self.feed_poll_interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 15,
            directory_concurrency: 8,
            feed_poll_interval_ms: 2000,
            decode_policy: SnapshotDecodePolicy::DropInvalid,
        }
    }
}
