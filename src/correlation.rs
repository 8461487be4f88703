//! Correlation table for in-flight requests
//!
//! This module handles:
//! - Registering a pending entry per dispatched command
//! - Resolving entries when a device response arrives
//! - Expiring entries on timeout or caller cancellation
//!
//! The table is the single source of truth for a request's outcome. Each
//! entry holds a oneshot sender as its single-resolution slot: whichever of
//! "response arrived" or "deadline elapsed" removes the entry first
//! determines the outcome the waiting caller observes, and the loser becomes
//! a no-op.

use emberhub_shared::{CorrelationId, DeviceResponse};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// A command awaiting its device response.
struct PendingEntry {
    /// Single-resolution slot: consumed by the first of resolve or expiry.
    slot: oneshot::Sender<DeviceResponse>,
    registered_at: Instant,
    deadline: Instant,
}

/// Errors from [`CorrelationTable::register`].
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The identifier is already pending. Should not occur given random
    /// 128-bit identifiers; kept as a defensive check.
    #[error("correlation identifier {0} is already registered")]
    Duplicate(CorrelationId),

    /// The table is at its configured capacity.
    #[error("correlation table is full ({0} entries)")]
    CapacityExceeded(usize),
}

/// Mapping of correlation identifier to pending-response handle.
///
/// Shared between the execution engine (register/expire) and the response
/// listener (resolve). A single mutex over the map serializes concurrent
/// resolution attempts so exactly one wins; critical sections only move an
/// entry in or out, the response itself is sent outside the lock.
pub struct CorrelationTable {
    entries: Mutex<HashMap<CorrelationId, PendingEntry>>,
    max_pending: usize,
}

impl CorrelationTable {
    pub fn new(max_pending: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_pending,
        }
    }

    /// Create a pending entry and hand back the receiving half of its
    /// resolution slot.
    pub fn register(
        &self,
        id: CorrelationId,
        deadline: Instant,
    ) -> Result<oneshot::Receiver<DeviceResponse>, RegisterError> {
        let mut entries = self.entries.lock();

        if entries.contains_key(&id) {
            return Err(RegisterError::Duplicate(id));
        }
        if entries.len() >= self.max_pending {
            return Err(RegisterError::CapacityExceeded(entries.len()));
        }

        let (tx, rx) = oneshot::channel();
        entries.insert(
            id,
            PendingEntry {
                slot: tx,
                registered_at: Instant::now(),
                deadline,
            },
        );
        trace!("Registered pending entry {}", id);
        Ok(rx)
    }

    /// Deliver a response to the matching pending entry.
    ///
    /// Returns false if no such entry exists (already resolved, timed out,
    /// or never registered) or if the waiter has already gone away.
    pub fn resolve(&self, id: &CorrelationId, response: DeviceResponse) -> bool {
        let entry = self.entries.lock().remove(id);
        match entry {
            Some(entry) => {
                let elapsed = entry.registered_at.elapsed();
                match entry.slot.send(response) {
                    Ok(()) => {
                        debug!("Resolved {} after {:?}", id, elapsed);
                        true
                    }
                    Err(_) => {
                        // Waiter cancelled between expiry and removal.
                        debug!("Waiter for {} already gone", id);
                        false
                    }
                }
            }
            None => false,
        }
    }

    /// Remove the entry if still unresolved.
    ///
    /// Returns whether this expiry won the race against a concurrent
    /// resolve. Dropping the sender wakes any waiter still blocked on the
    /// slot.
    pub fn expire(&self, id: &CorrelationId) -> bool {
        let won = self.entries.lock().remove(id).is_some();
        if won {
            trace!("Expired pending entry {}", id);
        }
        won
    }

    /// Remove all entries past their deadline, returning the reaped
    /// identifiers. Backstop against leaks; the usual expiry path is the
    /// waiting caller itself.
    pub fn remove_expired(&self, now: Instant) -> Vec<CorrelationId> {
        let mut entries = self.entries.lock();
        let expired: Vec<CorrelationId> = entries
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            entries.remove(id);
        }
        expired
    }

    /// Whether an entry is currently pending.
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of in-flight entries.
    pub fn pending_count(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Expires its entry when dropped, so a cancelled caller never leaks a
/// pending entry. Expiry is idempotent; dropping after a normal resolve or
/// explicit expire is a no-op.
pub struct PendingGuard {
    table: Arc<CorrelationTable>,
    id: CorrelationId,
}

impl PendingGuard {
    pub fn new(table: Arc<CorrelationTable>, id: CorrelationId) -> Self {
        Self { table, id }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.expire(&self.id);
    }
}
