//! End-to-end scenarios over the loopback transport: engine, correlation
//! table, response listener, and presence store wired together the way the
//! demo binary wires them.

use emberhub_relay::config::RelayConfig;
use emberhub_relay::correlation::CorrelationTable;
use emberhub_relay::engine::ExecutionEngine;
use emberhub_relay::error::ExecuteError;
use emberhub_relay::listener::ResponseListener;
use emberhub_relay::presence::PresenceStore;
use emberhub_relay::transport::{response_channel, LoopbackDevice, LoopbackTransport};
use emberhub_shared::{ActionRequest, CorrelationId, DeviceId, DeviceResponse, ResponseStatus};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Relay {
    engine: ExecutionEngine,
    transport: Arc<LoopbackTransport>,
    table: Arc<CorrelationTable>,
}

fn relay() -> Relay {
    let config = RelayConfig::default();
    let presence = Arc::new(PresenceStore::new(config.presence_ttl));
    let table = Arc::new(CorrelationTable::new(config.max_pending));
    let (response_tx, response_rx) = response_channel();
    let transport = Arc::new(LoopbackTransport::new(presence.clone(), response_tx));

    tokio::spawn(ResponseListener::new(table.clone(), response_rx).run());

    let engine = ExecutionEngine::new(presence, table.clone(), transport.clone(), config);
    Relay {
        engine,
        transport,
        table,
    }
}

#[tokio::test]
async fn connected_lamp_answers_within_deadline() {
    let relay = relay();
    relay
        .transport
        .connect(
            DeviceId::from("lamp-1"),
            LoopbackDevice::echo(Duration::from_millis(50)),
        )
        .await;

    let result = relay
        .engine
        .execute_within(
            ActionRequest::new("lamp-1", "turn_on", "user-1").with_params(json!({"on": true})),
            Duration::from_millis(2000),
        )
        .await
        .expect("execute failed");

    assert_eq!(result.status, ResponseStatus::Success);
    assert_eq!(result.state, json!({"on": true}));
    assert_eq!(relay.table.pending_count(), 0);
}

#[tokio::test]
async fn offline_lamp_fails_immediately() {
    let relay = relay();

    let started = Instant::now();
    let result = relay
        .engine
        .execute_within(
            ActionRequest::new("lamp-2", "turn_on", "user-1"),
            Duration::from_millis(2000),
        )
        .await;

    assert!(matches!(result, Err(ExecuteError::DeviceUnavailable(_))));
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "offline devices must not wait out the deadline"
    );
    assert_eq!(relay.table.pending_count(), 0);
}

#[tokio::test]
async fn silent_lamp_times_out_and_entry_is_removed() {
    let relay = relay();
    relay
        .transport
        .connect(DeviceId::from("lamp-3"), LoopbackDevice::silent())
        .await;

    let started = Instant::now();
    let result = relay
        .engine
        .execute_within(
            ActionRequest::new("lamp-3", "turn_on", "user-1"),
            Duration::from_millis(100),
        )
        .await;

    assert!(matches!(result, Err(ExecuteError::Timeout(_))));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(1000));
    assert_eq!(relay.table.pending_count(), 0, "timed-out entry leaked");
}

#[tokio::test]
async fn device_reported_failure_comes_back_as_result() {
    let relay = relay();
    relay
        .transport
        .connect(
            DeviceId::from("gate-1"),
            LoopbackDevice::failing(Duration::from_millis(30), "obstructed"),
        )
        .await;

    let result = relay
        .engine
        .execute(ActionRequest::new("gate-1", "close", "user-1"))
        .await
        .expect("device answered, call must succeed");

    assert_eq!(result.status, ResponseStatus::error("obstructed"));
}

#[tokio::test]
async fn stray_and_malformed_responses_have_no_effect() {
    let relay = relay();
    relay
        .transport
        .connect(
            DeviceId::from("lamp-1"),
            LoopbackDevice::echo(Duration::from_millis(40)),
        )
        .await;

    // Noise nobody is waiting for, plus outright garbage.
    relay
        .transport
        .inject_response(&DeviceResponse::success(
            CorrelationId::generate(),
            json!({"on": false}),
        ))
        .await
        .unwrap();
    relay
        .transport
        .inject_raw(bytes::Bytes::from_static(b"{\"id\": 42}"))
        .await
        .unwrap();

    // A real request still completes normally afterwards.
    let result = relay
        .engine
        .execute_within(
            ActionRequest::new("lamp-1", "toggle", "user-1"),
            Duration::from_millis(2000),
        )
        .await
        .expect("execute failed");
    assert_eq!(result.status, ResponseStatus::Success);
    assert_eq!(relay.table.pending_count(), 0);
}

#[tokio::test]
async fn duplicate_response_is_discarded() {
    let relay = relay();

    // Remember the correlation id the device saw so we can replay it.
    let seen: Arc<std::sync::Mutex<Option<CorrelationId>>> = Arc::default();
    let seen_by_device = seen.clone();
    relay
        .transport
        .connect(
            DeviceId::from("lamp-1"),
            LoopbackDevice::with_handler(Duration::from_millis(20), move |envelope| {
                *seen_by_device.lock().unwrap() = Some(envelope.id);
                Some(DeviceResponse::success(envelope.id, json!({"answer": 1})))
            }),
        )
        .await;

    let result = relay
        .engine
        .execute_within(
            ActionRequest::new("lamp-1", "turn_on", "user-1"),
            Duration::from_millis(2000),
        )
        .await
        .expect("execute failed");
    assert_eq!(result.state, json!({"answer": 1}));

    // Replay the already-resolved response; it must be a silent no-op.
    let id = seen.lock().unwrap().expect("device never saw the command");
    relay
        .transport
        .inject_response(&DeviceResponse::success(id, json!({"answer": 2})))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(relay.table.pending_count(), 0);
}

#[tokio::test]
async fn disconnect_flips_presence_for_subsequent_calls() {
    let relay = relay();
    let lamp = DeviceId::from("lamp-1");
    relay
        .transport
        .connect(lamp.clone(), LoopbackDevice::echo(Duration::from_millis(10)))
        .await;

    assert!(relay
        .engine
        .execute(ActionRequest::new("lamp-1", "turn_on", "user-1"))
        .await
        .is_ok());

    relay.transport.disconnect(&lamp).await;

    let result = relay
        .engine
        .execute(ActionRequest::new("lamp-1", "turn_on", "user-1"))
        .await;
    assert!(matches!(result, Err(ExecuteError::DeviceUnavailable(_))));
}

#[tokio::test]
async fn concurrent_callers_each_get_their_own_answer() {
    let relay = relay();
    relay
        .transport
        .connect(
            DeviceId::from("lamp-1"),
            LoopbackDevice::echo(Duration::from_millis(30)),
        )
        .await;

    let requests: Vec<ActionRequest> = (0..8)
        .map(|i| {
            ActionRequest::new("lamp-1", "set_level", "user-1").with_params(json!({"level": i}))
        })
        .collect();

    let results = relay
        .engine
        .execute_batch(requests, Duration::from_millis(2000))
        .await;

    for (i, result) in results.into_iter().enumerate() {
        let result = result.expect("batch member failed");
        assert_eq!(
            result.state,
            json!({"level": i}),
            "response routed to the wrong caller"
        );
    }
    assert_eq!(relay.table.pending_count(), 0);
}
