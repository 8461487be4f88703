//! Transport seam for the relay core
//!
//! The core does not implement message transport itself. It publishes
//! opaque payloads through the [`CommandPublisher`] capability and consumes
//! already-authenticated inbound payloads from a channel owned by the
//! transport collaborator. The loopback transport here is the in-process
//! stand-in used by the demo binary and the integration tests.

mod loopback;

pub use loopback::{LoopbackDevice, LoopbackTransport};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use emberhub_shared::DeviceId;
use tokio::sync::mpsc;

/// Capability to publish one payload toward a device.
///
/// Implementations address the message by device identifier (the transport
/// topic key) and treat the payload as opaque bytes; signing and outer
/// framing are their concern.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publish a single payload. One call per dispatch; the core never
    /// retries.
    async fn publish(&self, device_id: &DeviceId, payload: Bytes) -> Result<()>;

    /// Human-readable name for this transport.
    fn name(&self) -> &'static str;
}

/// Inbound response payloads, one per device response, in arrival order.
pub type ResponseReceiver = mpsc::Receiver<Bytes>;

/// Sending half handed to the transport collaborator.
pub type ResponseSender = mpsc::Sender<Bytes>;

/// Channel capacity for inbound responses.
pub const RESPONSE_CHANNEL_CAPACITY: usize = 256;

/// Create the inbound response channel shared between the transport layer
/// and the response listener.
pub fn response_channel() -> (ResponseSender, ResponseReceiver) {
    mpsc::channel(RESPONSE_CHANNEL_CAPACITY)
}
