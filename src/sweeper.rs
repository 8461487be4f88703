//! Deadline backstop for the correlation table

use crate::correlation::CorrelationTable;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::debug;

/// Periodically reaps pending entries past their deadline.
///
/// The waiting caller normally expires its own entry, so the sweeper only
/// matters when a waiter went away without cleaning up; reaping drops the
/// resolution slot, which wakes any waiter still blocked on it.
pub struct PendingSweeper {
    table: Arc<CorrelationTable>,
    check_interval: Duration,
}

impl PendingSweeper {
    pub fn new(table: Arc<CorrelationTable>, check_interval: Duration) -> Self {
        Self {
            table,
            check_interval,
        }
    }

    /// Run the sweep loop for the lifetime of the process.
    pub async fn run(self) {
        let mut ticker = interval(self.check_interval);

        loop {
            ticker.tick().await;
            let reaped = self.table.remove_expired(Instant::now());
            if !reaped.is_empty() {
                debug!("Reaped {} expired pending entries", reaped.len());
            }
        }
    }
}
