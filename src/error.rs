//! Error taxonomy for action execution

use emberhub_shared::{CorrelationId, DeviceId};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the caller of [`ExecutionEngine::execute`].
///
/// Every failure is returned to the immediate caller; the HTTP layer maps
/// these to status codes. Only malformed or unmatched inbound responses are
/// logged and dropped instead of surfaced, since they cannot be attributed
/// to any waiting caller.
///
/// [`ExecutionEngine::execute`]: crate::engine::ExecutionEngine::execute
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The request failed shape validation. Caller error, never retried here.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The device has no live transport connection; nothing was dispatched.
    #[error("device {0} is not connected")]
    DeviceUnavailable(DeviceId),

    /// The transport publish itself failed.
    #[error("failed to dispatch command")]
    DispatchFailed(#[source] anyhow::Error),

    /// No response arrived within the deadline; the pending entry was
    /// cleaned up.
    #[error("device did not respond within {0:?}")]
    Timeout(Duration),

    /// A freshly generated correlation identifier was already pending.
    /// Indicates an identifier-generation bug; fatal to the request only.
    #[error("correlation identifier {0} is already pending")]
    DuplicateCorrelation(CorrelationId),

    /// The correlation table is at capacity.
    #[error("too many in-flight commands (limit {0})")]
    Overloaded(usize),
}
