//! Action execution engine
//!
//! This module handles:
//! - Validating incoming action requests
//! - Failing fast for devices with no live connection
//! - Dispatching the command and registering its pending entry
//! - Blocking the caller until resolution or deadline
//!
//! Each request moves through `Created -> Dispatched -> {Resolved | TimedOut
//! | DispatchFailed}`. The engine performs exactly one publish per call;
//! retry policy belongs to the caller.

use crate::config::RelayConfig;
use crate::correlation::{CorrelationTable, PendingGuard, RegisterError};
use crate::error::ExecuteError;
use crate::presence::PresenceStore;
use crate::transport::CommandPublisher;
use emberhub_shared::{
    codec, ActionKind, ActionRequest, ActionResult, CommandEnvelope, CorrelationId,
};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Bridges synchronous action calls onto the asynchronous device transport.
pub struct ExecutionEngine {
    presence: Arc<PresenceStore>,
    table: Arc<CorrelationTable>,
    publisher: Arc<dyn CommandPublisher>,
    config: RelayConfig,
}

impl ExecutionEngine {
    pub fn new(
        presence: Arc<PresenceStore>,
        table: Arc<CorrelationTable>,
        publisher: Arc<dyn CommandPublisher>,
        config: RelayConfig,
    ) -> Self {
        Self {
            presence,
            table,
            publisher,
            config,
        }
    }

    /// Execute with the configured default deadline.
    pub async fn execute(&self, request: ActionRequest) -> Result<ActionResult, ExecuteError> {
        self.execute_within(request, self.config.default_timeout)
            .await
    }

    /// Execute an action request, waiting at most `timeout` for the device
    /// to answer.
    #[tracing::instrument(
        name = "execute",
        skip_all,
        fields(device = %request.device_id, action = %request.action, requester = %request.requester)
    )]
    pub async fn execute_within(
        &self,
        request: ActionRequest,
        timeout: Duration,
    ) -> Result<ActionResult, ExecuteError> {
        let action = validate(&request)?;

        // Known-offline devices fail fast: no dispatch, no table entry, no
        // deadline wait.
        if !self.presence.is_connected(&request.device_id).await {
            return Err(ExecuteError::DeviceUnavailable(request.device_id));
        }

        let id = CorrelationId::generate();
        let deadline = Instant::now() + timeout;
        let receiver = self.table.register(id, deadline).map_err(|e| match e {
            RegisterError::Duplicate(id) => ExecuteError::DuplicateCorrelation(id),
            RegisterError::CapacityExceeded(_) => ExecuteError::Overloaded(self.config.max_pending),
        })?;
        // Expires the entry if this call is cancelled mid-wait.
        let _guard = PendingGuard::new(self.table.clone(), id);

        let envelope = CommandEnvelope {
            id,
            action,
            params: request.params,
        };
        let payload =
            codec::encode_command(&envelope).map_err(|e| ExecuteError::DispatchFailed(e.into()))?;

        debug!("Dispatching {} as {}", action, id);
        if let Err(e) = self
            .publisher
            .publish(&request.device_id, payload)
            .await
        {
            self.table.expire(&id);
            return Err(ExecuteError::DispatchFailed(e));
        }

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => {
                debug!("Resolved {} with status {}", id, response.status);
                Ok(ActionResult::from(response))
            }
            // The slot was dropped without a response: the sweeper reaped
            // the entry at its deadline before we woke up.
            Ok(Err(_)) => Err(ExecuteError::Timeout(timeout)),
            Err(_) => {
                let won = self.table.expire(&id);
                if !won {
                    // A response landed in the same instant; it lost the
                    // race and is discarded.
                    debug!("Late response for {} discarded", id);
                }
                warn!("No response from {} within {:?}", request.device_id, timeout);
                Err(ExecuteError::Timeout(timeout))
            }
        }
    }

    /// Execute several requests concurrently under one deadline, returning
    /// one result per request in order.
    pub async fn execute_batch(
        &self,
        requests: Vec<ActionRequest>,
        timeout: Duration,
    ) -> Vec<Result<ActionResult, ExecuteError>> {
        join_all(
            requests
                .into_iter()
                .map(|request| self.execute_within(request, timeout)),
        )
        .await
    }

    /// Number of commands currently awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.table.pending_count()
    }
}

fn validate(request: &ActionRequest) -> Result<ActionKind, ExecuteError> {
    if request.device_id.is_empty() {
        return Err(ExecuteError::InvalidRequest(
            "empty device identifier".into(),
        ));
    }
    let action = request
        .action
        .parse::<ActionKind>()
        .map_err(|e| ExecuteError::InvalidRequest(e.to_string()))?;
    if !(request.params.is_null() || request.params.is_object()) {
        return Err(ExecuteError::InvalidRequest(
            "params must be an object".into(),
        ));
    }
    Ok(action)
}
