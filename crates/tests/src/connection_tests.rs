use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use retiscan_connection::{
    ConnectionManager, ConnectionState, Notice, NoticeId, StaticTokenSource,
};
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;

use crate::fixtures::mock_server::MockServer;
use crate::fixtures::test_store::{memory_store, test_settings, wait_until};

async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    pred: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    *timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("Timed out waiting for connection state")
        .expect("State channel closed")
}

async fn next_notice(rx: &mut broadcast::Receiver<Notice>) -> Notice {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for notice")
        .expect("Notice channel closed")
}

/// A base URL nothing is listening on.
async fn dead_server_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Takes over a just-released address and counts every dial, dropping
/// each accepted stream so the handshake fails.
async fn counting_listener(addr: SocketAddr) -> Arc<AtomicUsize> {
    let listener = loop {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => break l,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    };
    let dials = Arc::new(AtomicUsize::new(0));
    let counter = dials.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    dials
}

#[tokio::test]
async fn connects_and_ingests_pushed_events() {
    let server = MockServer::spawn().await;
    let settings = test_settings(&server.base_url());
    let fixture = memory_store(settings.clone());

    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));
    retiscan_services::live::attach(&conn, fixture.store.clone());

    let mut state = conn.subscribe_state();
    conn.connect().await;
    wait_for_state(&mut state, |s| s.is_connected()).await;
    server.wait_for_connections(1).await;

    server.push(
        "new_analysis",
        serde_json::json!({ "patient_name": "Budi", "severity": "Sedang" }),
    );

    let store = fixture.store.clone();
    wait_until(move || store.len() == 1).await;

    let records = fixture.store.records();
    assert_eq!(
        records[0].message,
        "Hasil scan retina untuk pasien Budi telah tersedia. Tingkat keparahan: Sedang"
    );
    assert!(!records[0].read);
    assert_eq!(fixture.store.unread_count(), 1);

    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn connect_is_idempotent_while_active() {
    let server = MockServer::spawn().await;
    let settings = test_settings(&server.base_url());
    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));

    let mut state = conn.subscribe_state();
    conn.connect().await;
    wait_for_state(&mut state, |s| s.is_connected()).await;
    server.wait_for_connections(1).await;

    // Second connect while live must not open a second socket.
    conn.connect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count(), 1);

    conn.disconnect().await;
}

#[tokio::test]
async fn emit_returns_false_unless_connected() {
    let server = MockServer::spawn().await;
    let settings = test_settings(&server.base_url());
    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));

    assert!(!conn.emit("ping", serde_json::json!({})).await);

    let mut state = conn.subscribe_state();
    conn.connect().await;
    wait_for_state(&mut state, |s| s.is_connected()).await;
    assert!(conn.emit("ping", serde_json::json!({})).await);

    conn.disconnect().await;
    assert!(!conn.emit("ping", serde_json::json!({})).await);
}

#[tokio::test]
async fn server_close_triggers_reconnect_and_counter_reset() {
    let server = MockServer::spawn().await;
    let mut settings = test_settings(&server.base_url());
    // A budget of 2 proves the attempt counter resets: three recovery
    // cycles would exhaust it if attempts accumulated across successes.
    settings.connection.max_attempts = 2;

    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));
    let mut state = conn.subscribe_state();
    let mut notices = conn.subscribe_notices();

    conn.connect().await;
    wait_for_state(&mut state, |s| s.is_connected()).await;

    for _ in 0..3 {
        server.wait_for_connections(1).await;
        server.kick_all();

        let lost = next_notice(&mut notices).await;
        assert_eq!(lost.id, NoticeId::ConnectionLost);
        let restored = next_notice(&mut notices).await;
        assert_eq!(restored.id, NoticeId::ReconnectSucceeded);

        wait_for_state(&mut state, |s| s.is_connected()).await;
    }

    conn.disconnect().await;
}

#[tokio::test]
async fn transport_loss_grants_a_full_reconnect_budget() {
    let server = MockServer::spawn().await;
    let mut settings = test_settings(&server.base_url());
    settings.connection.max_attempts = 2;
    // Backoff long enough to retake the port before the first redial.
    settings.connection.base_delay_ms = 300;
    settings.connection.max_delay_ms = 400;

    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));
    let mut state = conn.subscribe_state();
    let mut notices = conn.subscribe_notices();

    conn.connect().await;
    wait_for_state(&mut state, |s| s.is_connected()).await;

    let addr = server.addr;
    server.drop_all();
    server.stop().await;
    let dials = counting_listener(addr).await;

    let lost = next_notice(&mut notices).await;
    assert_eq!(lost.id, NoticeId::ConnectionLost);
    let failed = next_notice(&mut notices).await;
    assert_eq!(failed.id, NoticeId::ReconnectFailed);
    wait_until(|| conn.state() == ConnectionState::Disconnected).await;

    // A lost connection is redialed as many times as a cold start.
    assert_eq!(dials.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn exhausted_attempts_terminate_with_one_failure_notice() {
    let mut settings = test_settings(&dead_server_url().await);
    settings.connection.max_attempts = 3;
    settings.connection.base_delay_ms = 10;
    settings.connection.max_delay_ms = 20;

    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));
    let mut notices = conn.subscribe_notices();

    conn.connect().await;
    let failure = next_notice(&mut notices).await;
    assert_eq!(failure.id, NoticeId::ReconnectFailed);
    wait_until(|| conn.state() == ConnectionState::Disconnected).await;

    // Exactly one notice for the whole exhausted cycle.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        notices.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));

    // Terminal failure is retriable: connect() starts a fresh cycle,
    // which here exhausts again and reports again.
    conn.connect().await;
    let failure = next_notice(&mut notices).await;
    assert_eq!(failure.id, NoticeId::ReconnectFailed);
    wait_until(|| conn.state() == ConnectionState::Disconnected).await;
}

#[tokio::test]
async fn disconnect_mid_backoff_cancels_the_pending_retry() {
    let mut settings = test_settings(&dead_server_url().await);
    // Long backoff so the test reliably lands inside the wait.
    settings.connection.base_delay_ms = 60_000;
    settings.connection.max_delay_ms = 60_000;

    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));
    let mut state = conn.subscribe_state();

    conn.connect().await;
    wait_for_state(&mut state, |s| {
        matches!(s, ConnectionState::Reconnecting { .. })
    })
    .await;

    conn.disconnect().await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);

    // No orphaned timer may fire another transition after teardown.
    let state = conn.subscribe_state();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!state.has_changed().unwrap());
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn connect_without_token_stays_disconnected() {
    let server = MockServer::spawn().await;
    let settings = test_settings(&server.base_url());
    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::absent()));

    conn.connect().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(server.connection_count(), 0);
}

#[tokio::test]
async fn handlers_can_be_unsubscribed() {
    let server = MockServer::spawn().await;
    let settings = test_settings(&server.base_url());
    let fixture = memory_store(settings.clone());

    let conn = ConnectionManager::new(&settings, Arc::new(StaticTokenSource::new("tok")));
    retiscan_services::live::attach(&conn, fixture.store.clone());
    retiscan_services::live::detach(&conn);

    let mut state = conn.subscribe_state();
    conn.connect().await;
    wait_for_state(&mut state, |s| s.is_connected()).await;
    server.wait_for_connections(1).await;

    server.push("notification", serde_json::json!({ "title": "Halo" }));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(fixture.store.is_empty());

    conn.disconnect().await;
}
