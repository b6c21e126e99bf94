//! Connection and reconnection settings for the game channel.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3000";

/// Logical channel the game server exposes its events under.
pub const DEFAULT_NAMESPACE: &str = "/game";

/// Maximum number of automatic reconnection attempts before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay per attempt in ms (grows linearly with the attempt number).
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on the delay between reconnection attempts in ms.
pub const RECONNECT_MAX_DELAY_MS: u64 = 10_000;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Settings for an [`EventChannelAdapter`](crate::adapter::EventChannelAdapter).
///
/// ```
/// use quiz_client::config::ChannelConfig;
/// use std::time::Duration;
///
/// let config = ChannelConfig::new("ws://quiz.local:3000/")
///     .with_max_reconnect_attempts(3)
///     .with_connect_timeout(Duration::from_secs(2));
/// assert_eq!(config.channel_url(), "ws://quiz.local:3000/game");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub server_url: String,
    pub namespace: String,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL)
    }
}

impl ChannelConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: Duration::from_millis(RECONNECT_BASE_DELAY_MS),
            reconnect_max_delay: Duration::from_millis(RECONNECT_MAX_DELAY_MS),
            connect_timeout: CONNECT_TIMEOUT,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Full URL of the game channel: server URL joined with the namespace.
    pub fn channel_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let namespace = self.namespace.trim_start_matches('/');
        if namespace.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{namespace}")
        }
    }

    /// Delay before reconnection attempt number `attempt` (1-based):
    /// `min(base * attempt, max)`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay
            .saturating_mul(attempt)
            .min(self.reconnect_max_delay)
    }
}
