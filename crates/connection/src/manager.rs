use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use retiscan_config::Settings;
use retiscan_config::settings::ConnectionSettings;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

use crate::notice::{Notice, NoticeId};
use crate::state::ConnectionState;
use crate::token::TokenSource;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

pub type EventHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Maintains the single outbound notification socket for the session.
///
/// Hides transient network failure behind a bounded reconnect loop and
/// exposes a named publish/subscribe surface over the `{type, data}`
/// message envelope. Handlers run on the socket read task, serialized in
/// delivery order.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    driver: tokio::sync::Mutex<Option<Driver>>,
}

struct Driver {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Shared {
    ws_url: String,
    policy: ConnectionSettings,
    token_source: Arc<dyn TokenSource>,
    handlers: DashMap<String, EventHandler>,
    state_tx: watch::Sender<ConnectionState>,
    notice_tx: broadcast::Sender<Notice>,
    last_notice: parking_lot::Mutex<Option<NoticeId>>,
    sink: tokio::sync::Mutex<Option<WsSink>>,
}

impl ConnectionManager {
    pub fn new(settings: &Settings, token_source: Arc<dyn TokenSource>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (notice_tx, _) = broadcast::channel(16);

        Self {
            shared: Arc::new(Shared {
                ws_url: ws_url(settings),
                policy: settings.connection.clone(),
                token_source,
                handlers: DashMap::new(),
                state_tx,
                notice_tx,
                last_notice: parking_lot::Mutex::new(None),
                sink: tokio::sync::Mutex::new(None),
            }),
            driver: tokio::sync::Mutex::new(None),
        }
    }

    /// Opens the socket. No-op if a connection is already live or being
    /// established. Without an auth token the manager stays
    /// `Disconnected` and only logs; nothing is surfaced to callers.
    pub async fn connect(&self) {
        let mut driver = self.driver.lock().await;
        if let Some(d) = driver.as_ref() {
            if !d.task.is_finished() {
                debug!("connect() while the socket is active, ignoring");
                return;
            }
        }

        if self.shared.token_source.token().is_none() {
            warn!("connect() without an auth token, staying disconnected");
            self.shared.set_state(ConnectionState::Disconnected);
            return;
        }

        // Fresh session, fresh notice dedup window.
        *self.shared.last_notice.lock() = None;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run(self.shared.clone(), shutdown_rx));
        *driver = Some(Driver {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Tears the transport down on every exit path, cancelling a pending
    /// backoff timer if one is armed. Safe to call at any point in the
    /// reconnect cycle.
    pub async fn disconnect(&self) {
        let driver = self.driver.lock().await.take();
        if let Some(d) = driver {
            let _ = d.shutdown.send(true);
            if let Some(mut sink) = self.shared.sink.lock().await.take() {
                let _ = sink.close().await;
            }
            let _ = d.task.await;
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Subscribes a handler to a named server event, replacing any
    /// previous handler for that name.
    pub fn on<F>(&self, event: &str, handler: F)
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .insert(event.to_string(), Arc::new(handler));
    }

    pub fn off(&self, event: &str) {
        self.shared.handlers.remove(event);
    }

    /// Attempts a send. Returns `false` without queueing or retrying when
    /// the socket is not currently connected or the write fails; the
    /// caller must treat that as "not delivered".
    pub async fn emit(&self, event: &str, payload: serde_json::Value) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        let envelope = serde_json::json!({ "type": event, "data": payload });
        let text = match serde_json::to_string(&envelope) {
            Ok(t) => t,
            Err(_) => return false,
        };
        let mut guard = self.shared.sink.lock().await;
        let Some(sink) = guard.as_mut() else {
            return false;
        };
        match sink.send(Message::Text(text.into())).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%e, event, "WS send failed");
                false
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    /// Watch channel carrying every state transition, for connectivity
    /// indicators.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// One-time connectivity notices (lost / restored / gave up),
    /// deduplicated by [`NoticeId`].
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.shared.notice_tx.subscribe()
    }
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn notify(&self, notice: Notice) {
        let mut last = self.last_notice.lock();
        if *last == Some(notice.id) {
            return;
        }
        *last = Some(notice.id);
        let _ = self.notice_tx.send(notice);
    }
}

enum ReadOutcome {
    Shutdown,
    CleanClose,
    TransportLost,
}

async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut attempt: u32 = 0;
    let mut ever_failed = false;

    shared.set_state(ConnectionState::Connecting);

    loop {
        if *shutdown.borrow() {
            break;
        }

        let Some(token) = shared.token_source.token() else {
            warn!("No auth token available, notification socket stays down");
            break;
        };
        let url = format!("{}?token={}", shared.ws_url, token);

        let connected = tokio::select! {
            _ = shutdown.changed() => break,
            r = connect_async(url.as_str()) => r,
        };

        match connected {
            Ok((ws, _)) => {
                let (sink, mut stream) = ws.split();
                *shared.sink.lock().await = Some(sink);
                if ever_failed {
                    shared.notify(Notice::reconnect_succeeded());
                }
                attempt = 0;
                shared.set_state(ConnectionState::Connected);
                info!(url = %shared.ws_url, "Notification socket connected");

                let outcome = read_loop(&shared, &mut stream, &mut shutdown).await;
                shared.sink.lock().await.take();

                // Either loss arm leaves `attempt` at 0: a lost
                // connection gets the same retry budget as a cold
                // start, with the first failed redial counted as
                // attempt 1 by the connect-error arm below.
                match outcome {
                    ReadOutcome::Shutdown => break,
                    ReadOutcome::CleanClose => {
                        // Server-initiated close: one immediate retry,
                        // no backoff.
                        info!("Server closed the notification socket, retrying immediately");
                        ever_failed = true;
                        shared.notify(Notice::connection_lost());
                        shared.set_state(ConnectionState::Reconnecting { attempt: 1 });
                    }
                    ReadOutcome::TransportLost => {
                        ever_failed = true;
                        shared.notify(Notice::connection_lost());
                        shared.set_state(ConnectionState::Reconnecting { attempt: 1 });
                        if !sleep_backoff(&shared, 1, &mut shutdown).await {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                ever_failed = true;
                attempt += 1;
                warn!(%e, attempt, "Notification socket connect failed");
                shared.set_state(ConnectionState::Reconnecting { attempt });
                if attempt >= shared.policy.max_attempts {
                    shared.notify(Notice::reconnect_failed());
                    break;
                }
                if !sleep_backoff(&shared, attempt, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

async fn read_loop(
    shared: &Shared,
    stream: &mut SplitStream<WsStream>,
    shutdown: &mut watch::Receiver<bool>,
) -> ReadOutcome {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return ReadOutcome::Shutdown,
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => dispatch(shared, text.as_str()),
                Some(Ok(Message::Ping(data))) => {
                    let mut guard = shared.sink.lock().await;
                    if let Some(sink) = guard.as_mut() {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                }
                Some(Ok(Message::Close(_))) => return ReadOutcome::CleanClose,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%e, "Notification socket error");
                    return ReadOutcome::TransportLost;
                }
                None => return ReadOutcome::TransportLost,
            }
        }
    }
}

fn dispatch(shared: &Shared, text: &str) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return,
    };

    let event = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let data = parsed
        .get("data")
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    debug!(event, "WS event received");

    let handler = match shared.handlers.get(event) {
        Some(h) => h.value().clone(),
        None => {
            debug!(event, "No handler for WS event");
            return;
        }
    };

    // A faulty subscriber must not take the read loop down with it.
    if catch_unwind(AssertUnwindSafe(|| handler(&data))).is_err() {
        error!(event, "Notification handler panicked");
    }
}

/// Exponential backoff with an upper clamp and ±25% jitter.
fn backoff_delay(policy: &ConnectionSettings, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay_ms = policy
        .base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(policy.max_delay_ms);

    let jitter_range = delay_ms / 4;
    let jitter = if jitter_range > 0 {
        rand::random::<u64>() % (jitter_range * 2)
    } else {
        0
    };

    Duration::from_millis(delay_ms.saturating_sub(jitter_range).saturating_add(jitter))
}

/// Sleeps out the backoff window. Returns `false` when teardown was
/// requested while waiting.
async fn sleep_backoff(
    shared: &Shared,
    attempt: u32,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let delay = backoff_delay(&shared.policy, attempt);
    debug!(?delay, attempt, "Scheduling reconnect attempt");
    tokio::select! {
        _ = shutdown.changed() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn ws_url(settings: &Settings) -> String {
    let base = settings.server.base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{}{}", base, settings.server.ws_path)
}
