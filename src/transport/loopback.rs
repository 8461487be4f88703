//! In-memory loopback transport with scripted devices

use super::{CommandPublisher, ResponseSender};
use crate::presence::PresenceStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use emberhub_shared::{codec, CommandEnvelope, DeviceId, DeviceResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

type DeviceHandler = dyn Fn(&CommandEnvelope) -> Option<DeviceResponse> + Send + Sync;

/// A scripted device behavior: how long it takes to answer and what it
/// answers with. A `None` from the handler models a device that stays
/// silent.
#[derive(Clone)]
pub struct LoopbackDevice {
    latency: Duration,
    handler: Arc<DeviceHandler>,
}

impl LoopbackDevice {
    pub fn with_handler<F>(latency: Duration, handler: F) -> Self
    where
        F: Fn(&CommandEnvelope) -> Option<DeviceResponse> + Send + Sync + 'static,
    {
        Self {
            latency,
            handler: Arc::new(handler),
        }
    }

    /// Device that acknowledges every command, echoing the params back as
    /// its reported state.
    pub fn echo(latency: Duration) -> Self {
        Self::with_handler(latency, |envelope| {
            Some(DeviceResponse::success(
                envelope.id,
                envelope.params.clone(),
            ))
        })
    }

    /// Device that reports a failure for every command.
    pub fn failing(latency: Duration, code: &str) -> Self {
        let code = code.to_string();
        Self::with_handler(latency, move |envelope| {
            Some(DeviceResponse::error(envelope.id, code.clone()))
        })
    }

    /// Device that never answers.
    pub fn silent() -> Self {
        Self::with_handler(Duration::ZERO, |_| None)
    }
}

/// In-process transport: commands published here are delivered to scripted
/// devices, whose responses flow back through the shared inbound channel.
/// Connect/disconnect doubles as the presence lifecycle hook.
pub struct LoopbackTransport {
    devices: Arc<RwLock<HashMap<DeviceId, LoopbackDevice>>>,
    presence: Arc<PresenceStore>,
    responses: ResponseSender,
}

impl LoopbackTransport {
    pub fn new(presence: Arc<PresenceStore>, responses: ResponseSender) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            presence,
            responses,
        }
    }

    /// Attach a scripted device and mark it present.
    pub async fn connect(&self, device_id: DeviceId, device: LoopbackDevice) {
        self.devices.write().await.insert(device_id.clone(), device);
        self.presence.mark_connected(&device_id).await;
    }

    /// Detach a device and mark it absent.
    pub async fn disconnect(&self, device_id: &DeviceId) {
        self.devices.write().await.remove(device_id);
        self.presence.mark_disconnected(device_id).await;
    }

    /// Push a response frame into the inbound channel as if a device had
    /// sent it. Used to simulate stray or duplicate responses.
    pub async fn inject_response(&self, response: &DeviceResponse) -> Result<()> {
        let payload = codec::encode_response(response)?;
        self.responses
            .send(payload)
            .await
            .map_err(|_| anyhow!("response channel closed"))
    }

    /// Push raw bytes into the inbound channel, bypassing the codec. Used
    /// to simulate malformed frames.
    pub async fn inject_raw(&self, payload: Bytes) -> Result<()> {
        self.responses
            .send(payload)
            .await
            .map_err(|_| anyhow!("response channel closed"))
    }
}

#[async_trait]
impl CommandPublisher for LoopbackTransport {
    async fn publish(&self, device_id: &DeviceId, payload: Bytes) -> Result<()> {
        let envelope = codec::decode_command(&payload)?;
        let device = self
            .devices
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| anyhow!("no route to device {}", device_id))?;

        debug!("Loopback delivering {} to {}", envelope.action, device_id);

        let responses = self.responses.clone();
        tokio::spawn(async move {
            tokio::time::sleep(device.latency).await;
            if let Some(response) = (device.handler)(&envelope) {
                match codec::encode_response(&response) {
                    // Send failure means the listener shut down first.
                    Ok(payload) => {
                        let _ = responses.send(payload).await;
                    }
                    Err(e) => debug!("Loopback response encode failed: {}", e),
                }
            }
        });

        Ok(())
    }

    fn name(&self) -> &'static str {
        "loopback"
    }
}
