use emberhub_relay::config::RelayConfig;
use emberhub_relay::correlation::CorrelationTable;
use emberhub_relay::engine::ExecutionEngine;
use emberhub_relay::listener::ResponseListener;
use emberhub_relay::presence::PresenceStore;
use emberhub_relay::sweeper::PendingSweeper;
use emberhub_relay::transport::{response_channel, LoopbackDevice, LoopbackTransport};
use emberhub_shared::{ActionRequest, DeviceId};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = RelayConfig::default();
    info!("Relay core starting");
    info!("  default timeout: {:?}", config.default_timeout);
    info!("  max pending:     {}", config.max_pending);

    let presence = Arc::new(PresenceStore::new(config.presence_ttl));
    let table = Arc::new(CorrelationTable::new(config.max_pending));
    let (response_tx, response_rx) = response_channel();
    let transport = Arc::new(LoopbackTransport::new(presence.clone(), response_tx));

    tokio::spawn(ResponseListener::new(table.clone(), response_rx).run());
    tokio::spawn(PendingSweeper::new(table.clone(), config.sweep_interval).run());

    // Wire up a handful of simulated devices.
    transport
        .connect(
            DeviceId::from("lamp-1"),
            LoopbackDevice::echo(Duration::from_millis(50)),
        )
        .await;
    transport
        .connect(
            DeviceId::from("gate-1"),
            LoopbackDevice::failing(Duration::from_millis(80), "jammed"),
        )
        .await;
    transport
        .connect(DeviceId::from("lamp-3"), LoopbackDevice::silent())
        .await;
    info!("Connected devices: {}", presence.count().await);

    let engine = ExecutionEngine::new(presence, table, transport, config);

    let requests = [
        ActionRequest::new("lamp-1", "turn_on", "demo").with_params(json!({"brightness": 80})),
        ActionRequest::new("gate-1", "open", "demo"),
        ActionRequest::new("lamp-2", "turn_on", "demo"),
        ActionRequest::new("lamp-3", "turn_off", "demo"),
    ];

    for request in requests {
        let device = request.device_id.clone();
        match engine
            .execute_within(request, Duration::from_millis(500))
            .await
        {
            Ok(result) => info!("{}: {} state={}", device, result.status, result.state),
            Err(e) => warn!("{}: {}", device, e),
        }
    }

    info!("Pending entries at shutdown: {}", engine.pending_count());
}
