//! Response listener
//!
//! A single long-lived task that consumes the transport's inbound response
//! stream, decodes each frame, and resolves the matching pending entry in
//! the correlation table. Malformed frames and unmatched identifiers are
//! logged and dropped; neither ever stops the stream.

use crate::correlation::CorrelationTable;
use crate::transport::ResponseReceiver;
use emberhub_shared::codec;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ResponseListener {
    table: Arc<CorrelationTable>,
    responses: ResponseReceiver,
}

impl ResponseListener {
    pub fn new(table: Arc<CorrelationTable>, responses: ResponseReceiver) -> Self {
        Self { table, responses }
    }

    /// Consume inbound frames until the transport closes the channel.
    pub async fn run(mut self) {
        info!("Response listener started");

        while let Some(payload) = self.responses.recv().await {
            let response = match codec::decode_response(&payload) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Dropping malformed response frame: {}", e);
                    continue;
                }
            };

            let id = response.id;
            if !self.table.resolve(&id, response) {
                // Stray or duplicate: the entry already resolved, timed
                // out, or never existed.
                debug!("Response for unknown request {}", id);
            }
        }

        info!("Response channel closed, listener stopping");
    }
}
