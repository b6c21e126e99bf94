//! Reconnection bookkeeping, kept free of I/O so the policy can be tested on
//! its own.

use std::time::Duration;

use crate::config::ChannelConfig;

/// What to do after a connection was lost or failed to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Try again after `delay`. `attempt` is 1-based.
    Retry { attempt: u32, delay: Duration },
    /// The attempt budget is spent; report and stop.
    GiveUp { attempts: u32 },
}

/// Counts consecutive reconnection attempts.
///
/// The counter resets on every successful connect and saturates at the
/// configured maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectState {
    attempts: u32,
}

impl ReconnectState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    /// Fresh budget for an explicit `connect()`.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Spend the whole budget so that no automatic reconnection follows.
    pub fn suppress(&mut self, config: &ChannelConfig) {
        self.attempts = config.max_reconnect_attempts;
    }

    pub fn on_connection_lost(&mut self, config: &ChannelConfig) -> ReconnectDecision {
        if self.attempts >= config.max_reconnect_attempts {
            return ReconnectDecision::GiveUp {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay: config.reconnect_delay(self.attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_until_budget_is_spent() {
        let config = ChannelConfig::default();
        let mut state = ReconnectState::new();

        for attempt in 1..=3 {
            assert_eq!(
                state.on_connection_lost(&config),
                ReconnectDecision::Retry {
                    attempt,
                    delay: Duration::from_secs(u64::from(attempt)),
                }
            );
        }
        assert_eq!(state.attempts(), 3);

        assert!(matches!(
            state.on_connection_lost(&config),
            ReconnectDecision::Retry { attempt: 4, .. }
        ));
        assert!(matches!(
            state.on_connection_lost(&config),
            ReconnectDecision::Retry { attempt: 5, .. }
        ));
        assert_eq!(state.attempts(), 5);

        assert_eq!(
            state.on_connection_lost(&config),
            ReconnectDecision::GiveUp { attempts: 5 }
        );
        // Still saturated; nothing more is scheduled.
        assert_eq!(
            state.on_connection_lost(&config),
            ReconnectDecision::GiveUp { attempts: 5 }
        );
    }

    #[test]
    fn successful_connect_resets_the_counter() {
        let config = ChannelConfig::default();
        let mut state = ReconnectState::new();
        state.on_connection_lost(&config);
        state.on_connection_lost(&config);
        state.on_connected();
        assert_eq!(state.attempts(), 0);
        assert_eq!(
            state.on_connection_lost(&config),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(1),
            }
        );
    }

    #[test]
    fn suppress_prevents_any_retry() {
        let config = ChannelConfig::default().with_max_reconnect_attempts(2);
        let mut state = ReconnectState::new();
        state.suppress(&config);
        assert_eq!(
            state.on_connection_lost(&config),
            ReconnectDecision::GiveUp { attempts: 2 }
        );
    }

    #[test]
    fn delay_caps_at_ten_seconds_for_large_budgets() {
        let config = ChannelConfig::default().with_max_reconnect_attempts(20);
        let mut state = ReconnectState::new();
        let mut last = Duration::ZERO;
        while let ReconnectDecision::Retry { delay, .. } = state.on_connection_lost(&config) {
            assert!(delay >= last);
            assert!(delay <= Duration::from_secs(10));
            last = delay;
        }
        assert_eq!(last, Duration::from_secs(10));
        assert_eq!(state.attempts(), 20);
    }
}
