/// End-to-end tests against an in-process fake device
mod common;

use common::{DeviceFrame, DeviceScript, FakeDevice, WAIT};
use power_tracker_client::api::{ApiClient, ApiError};
use power_tracker_client::export::{write_logs_snapshot, EXPORT_TITLE};
use power_tracker_client::snapshot::{SnapshotEvent, SnapshotLoader};
use power_tracker_client::ws::{connect, ConnectionEvent, ReconnectPolicy};
use power_tracker_client::{
    CommandSink, ConnectionState, FrameOutcome, Intent, SendOutcome, Session,
};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

async fn next_event(rx: &mut UnboundedReceiver<ConnectionEvent>) -> Option<ConnectionEvent> {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for connection event")
}

async fn next_snapshot(rx: &mut UnboundedReceiver<SnapshotEvent>) -> SnapshotEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot channel open")
}

fn full_state_frame() -> String {
    json!({
        "type": "state",
        "loads": [
            {"id": 1, "voltage": 230.0, "current": 0.5, "power": 115.0, "energy": 40.0, "relay": true},
            {"id": 2, "voltage": 229.0, "current": 0.0, "power": 0.0, "energy": 12.0, "relay": false},
            {"id": 3, "voltage": 231.0, "current": 0.0, "power": 0.0, "energy": 0.0, "relay": false},
            {"id": 4, "voltage": 230.0, "current": 1.0, "power": 230.0, "energy": 8.0, "relay": true}
        ],
        "unitPrice": 8.5
    })
    .to_string()
}

#[tokio::test]
async fn test_live_frames_reconcile_and_commands_reach_device() {
    let mut device = FakeDevice::start(DeviceScript {
        greeting: vec![
            full_state_frame().into(),
            r#"{"type":"notification","text":"Load 2 timer expired"}"#.into(),
        ],
        ..DeviceScript::default()
    })
    .await;

    let (handle, mut events, driver) = connect(device.device_config().ws_url(), None, 0);
    let mut session = Session::new(handle.clone());

    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Opened));
    assert_eq!(handle.state(), ConnectionState::Open);

    for expected in [FrameOutcome::StateApplied, FrameOutcome::NotificationAdded] {
        match next_event(&mut events).await {
            Some(ConnectionEvent::Frame(text)) => {
                assert_eq!(session.handle_frame(&text), expected);
            }
            other => panic!("Expected frame, got {:?}", other),
        }
    }

    let totals = session.state().reconciler.totals();
    assert_eq!(totals.avg_voltage, 230.0);
    assert_eq!(totals.total_power, 345.0);
    assert_eq!(totals.total_energy, 60.0);
    assert_eq!(session.state().unit_price, Some(8.5));
    assert_eq!(
        session.state().notifications.texts(),
        vec!["Load 2 timer expired"]
    );

    let outcome = session.dispatch(&Intent::ToggleRelay {
        load_id: 3,
        on: true,
    });
    assert_eq!(outcome, SendOutcome::Sent);
    assert_eq!(
        device.next_command().await,
        json!({"cmd": "relay", "id": 3, "state": true})
    );
    // Still OFF until the device says otherwise
    assert!(!session.state().reconciler.load(3).unwrap().relay_on);

    session.dispatch(&Intent::SaveLimit {
        load_id: 1,
        hours_input: "2".into(),
    });
    session.dispatch(&Intent::ApplyTimer {
        selected_load: 0,
        minutes_input: "".into(),
    });
    assert_eq!(
        device.next_command().await,
        json!({"cmd": "setLimit", "id": 1, "seconds": 7200})
    );
    assert_eq!(
        device.next_command().await,
        json!({"cmd": "setTimer", "id": 0, "minutes": 0})
    );

    driver.abort();
}

#[tokio::test]
async fn test_close_is_final_without_reconnect() {
    let device = FakeDevice::start(DeviceScript {
        greeting: vec![full_state_frame().into()],
        close_first_connection: true,
        ..DeviceScript::default()
    })
    .await;

    let (handle, mut events, _driver) = connect(device.device_config().ws_url(), None, 0);

    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Opened));
    assert!(matches!(
        next_event(&mut events).await,
        Some(ConnectionEvent::Frame(_))
    ));
    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Closed));
    // Driver has exited and dropped its sender
    assert_eq!(next_event(&mut events).await, None);

    assert_eq!(handle.state(), ConnectionState::Closed);
    assert_eq!(
        handle.send(&power_tracker_client::Command::ClearNotifications),
        SendOutcome::Dropped
    );
}

#[tokio::test]
async fn test_invalid_utf8_frame_is_reported_and_skipped() {
    let partial_frame = json!({
        "type": "state",
        "loads": [{"id": 2, "voltage": 228.0, "current": 0.2, "power": 45.6, "energy": 13.0, "relay": true}]
    })
    .to_string();
    let device = FakeDevice::start(DeviceScript {
        greeting: vec![
            full_state_frame().into(),
            DeviceFrame::Binary(vec![0xff, 0xfe, 0x7b]),
            partial_frame.into(),
        ],
        ..DeviceScript::default()
    })
    .await;

    let (handle, mut events, driver) = connect(device.device_config().ws_url(), None, 0);
    let mut session = Session::new(handle.clone());

    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Opened));
    match next_event(&mut events).await {
        Some(ConnectionEvent::Frame(text)) => {
            assert_eq!(session.handle_frame(&text), FrameOutcome::StateApplied);
        }
        other => panic!("Expected frame, got {:?}", other),
    }
    let load1_before = session.state().reconciler.load(1).cloned();

    assert!(matches!(
        next_event(&mut events).await,
        Some(ConnectionEvent::Error(_))
    ));
    // The socket survives a bad frame
    assert_eq!(handle.state(), ConnectionState::Open);

    match next_event(&mut events).await {
        Some(ConnectionEvent::Frame(text)) => {
            assert_eq!(session.handle_frame(&text), FrameOutcome::StateApplied);
        }
        other => panic!("Expected frame, got {:?}", other),
    }

    let state = session.state();
    assert_eq!(state.reconciler.frames_applied(), 2);
    assert_eq!(state.reconciler.load(1).cloned(), load1_before);
    let load2 = state.reconciler.load(2).unwrap();
    assert_eq!(load2.voltage, 228.0);
    assert!(load2.relay_on);
    assert_eq!(state.reconciler.totals().total_power, 45.6);

    driver.abort();
}

#[tokio::test]
async fn test_unreachable_device_reports_error_then_closed() {
    // Bind and drop to get a port with nothing listening
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let (handle, mut events, _driver) = connect(format!("ws://127.0.0.1:{port}/"), None, 0);

    assert!(matches!(
        next_event(&mut events).await,
        Some(ConnectionEvent::Error(_))
    ));
    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Closed));
    assert_eq!(handle.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_reconnect_flushes_queued_commands() {
    let mut device = FakeDevice::start(DeviceScript {
        greeting: vec![full_state_frame().into()],
        close_first_connection: true,
        ..DeviceScript::default()
    })
    .await;

    let policy = ReconnectPolicy {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        multiplier: 2.0,
        jitter: 0.0,
        max_attempts: 0,
    };
    let (handle, mut events, driver) = connect(device.device_config().ws_url(), Some(policy), 8);

    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Opened));
    assert!(matches!(
        next_event(&mut events).await,
        Some(ConnectionEvent::Frame(_))
    ));
    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Closed));

    let outcome = handle.send(&power_tracker_client::Command::SetPrice { price: 9.0 });
    assert_ne!(outcome, SendOutcome::Dropped);

    assert_eq!(next_event(&mut events).await, Some(ConnectionEvent::Opened));
    assert_eq!(
        device.next_command().await,
        json!({"cmd": "setPrice", "price": 9.0})
    );
    assert_eq!(handle.pending(), 0);

    driver.abort();
}

#[tokio::test]
async fn test_startup_snapshots_populate_session() {
    let device = FakeDevice::start(DeviceScript {
        notifs: json!({"notifs": [{"ts": 1, "text": "a"}, {"ts": 2, "text": "b"}]}),
        settings: Some(json!({"unitPrice": 11})),
        ..DeviceScript::default()
    })
    .await;

    let client = ApiClient::new(device.device_config().http_base_url(), None).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let loader = SnapshotLoader::new(client, tx);
    let mut session = Session::new(power_tracker_client::ConnectionHandle::detached());

    loader.load_startup();
    for _ in 0..2 {
        match next_snapshot(&mut rx).await {
            SnapshotEvent::Notifications(result) => session.apply_notifications_snapshot(result),
            SnapshotEvent::Settings(result) => session.apply_settings_snapshot(result),
            other => panic!("Unexpected snapshot event {:?}", other),
        }
    }

    assert_eq!(session.state().notifications.texts(), vec!["b", "a"]);
    assert_eq!(session.state().unit_price, Some(11.0));
}

#[tokio::test]
async fn test_settings_failure_does_not_block_notifications() {
    let device = FakeDevice::start(DeviceScript {
        notifs: json!({"notifs": [{"ts": 5, "text": "Load 1 over limit"}]}),
        settings: None,
        ..DeviceScript::default()
    })
    .await;

    let client = ApiClient::new(device.device_config().http_base_url(), None).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let loader = SnapshotLoader::new(client, tx);
    let mut session = Session::new(power_tracker_client::ConnectionHandle::detached());

    loader.load_startup();
    let mut settings_error = None;
    for _ in 0..2 {
        match next_snapshot(&mut rx).await {
            SnapshotEvent::Notifications(result) => session.apply_notifications_snapshot(result),
            SnapshotEvent::Settings(result) => {
                settings_error = result.as_ref().err().cloned();
                session.apply_settings_snapshot(result);
            }
            other => panic!("Unexpected snapshot event {:?}", other),
        }
    }

    assert!(matches!(
        settings_error,
        Some(ApiError::Http { status: 500, .. })
    ));
    assert_eq!(session.state().unit_price, None);
    assert_eq!(
        session.state().notifications.texts(),
        vec!["Load 1 over limit"]
    );
}

#[tokio::test]
async fn test_refresh_replaces_live_notifications() {
    let device = FakeDevice::start(DeviceScript {
        notifs: json!({"notifs": [{"ts": 1, "text": "from device"}]}),
        settings: Some(json!({})),
        ..DeviceScript::default()
    })
    .await;

    let client = ApiClient::new(device.device_config().http_base_url(), None).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let loader = SnapshotLoader::new(client, tx);
    let mut session = Session::new(power_tracker_client::ConnectionHandle::detached());
    session.handle_frame(r#"{"type":"notification","text":"pushed"}"#);

    loader.refresh_notifications();
    match next_snapshot(&mut rx).await {
        SnapshotEvent::Notifications(result) => session.apply_notifications_snapshot(result),
        other => panic!("Expected notifications, got {:?}", other),
    }

    assert_eq!(session.state().notifications.texts(), vec!["from device"]);
}

#[tokio::test]
async fn test_logs_export() {
    let device = FakeDevice::start(DeviceScript {
        logs: json!({"entries": [{"load": 1, "wh": 12.5}]}),
        ..DeviceScript::default()
    })
    .await;

    let client = ApiClient::new(device.device_config().http_base_url(), None).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let loader = SnapshotLoader::new(client, tx);
    let path = std::env::temp_dir().join(format!("pt-e2e-logs-{}.txt", std::process::id()));

    loader.fetch_logs(path.to_string_lossy());
    let SnapshotEvent::Logs { path: out, result } = next_snapshot(&mut rx).await else {
        panic!("Expected logs event");
    };
    write_logs_snapshot(&out, &result.unwrap()).await.unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with(EXPORT_TITLE));
    assert!(written.contains(r#""wh":12.5"#));

    std::fs::remove_file(&path).ok();
}
