//! Relay configuration

use std::time::Duration;

/// Tunable policy for the relay core.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Deadline applied to `execute` calls that do not pass their own.
    pub default_timeout: Duration,
    /// Upper bound on in-flight commands; registrations past the cap are
    /// rejected so an unresponsive fleet cannot grow the table without bound.
    pub max_pending: usize,
    /// If set, a presence record not refreshed within this window reads as
    /// offline. `None` means pure event-driven presence.
    pub presence_ttl: Option<Duration>,
    /// How often the background sweeper reaps entries past their deadline.
    pub sweep_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(5),
            max_pending: 1024,
            presence_ttl: None,
            sweep_interval: Duration::from_secs(1),
        }
    }
}
