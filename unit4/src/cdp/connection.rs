use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

use crate::errors::AutomationError;

type CallResult = Result<Value, ProtocolFailure>;
type PendingMap = HashMap<u64, oneshot::Sender<CallResult>>;
type Pending = Arc<Mutex<PendingMap>>;

#[derive(Debug, Deserialize)]
struct ProtocolFailure {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Incoming {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ProtocolFailure>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// Page state maintained from protocol events by the reader task.
#[derive(Debug)]
pub struct PageState {
    /// frame id -> id of the frame's default execution context
    contexts: std::sync::Mutex<HashMap<String, i64>>,
    inflight: std::sync::Mutex<HashSet<String>>,
    last_network_activity: std::sync::Mutex<Instant>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            contexts: std::sync::Mutex::new(HashMap::new()),
            inflight: std::sync::Mutex::new(HashSet::new()),
            last_network_activity: std::sync::Mutex::new(Instant::now()),
        }
    }
}

impl PageState {
    pub fn context_for(&self, frame_id: &str) -> Option<i64> {
        self.contexts
            .lock()
            .ok()
            .and_then(|map| map.get(frame_id).copied())
    }

    /// Requests in flight and time since the last request started or ended.
    pub fn network_activity(&self) -> (usize, Duration) {
        let inflight = self.inflight.lock().map(|s| s.len()).unwrap_or(0);
        let quiet = self
            .last_network_activity
            .lock()
            .map(|t| t.elapsed())
            .unwrap_or_default();
        (inflight, quiet)
    }

    fn touch_network(&self) {
        if let Ok(mut t) = self.last_network_activity.lock() {
            *t = Instant::now();
        }
    }

    fn apply_event(&self, method: &str, params: &Value) {
        match method {
            "Runtime.executionContextCreated" => {
                let ctx = &params["context"];
                let is_default = ctx["auxData"]["isDefault"].as_bool().unwrap_or(false);
                let frame_id = ctx["auxData"]["frameId"].as_str();
                if let (true, Some(frame_id), Some(id)) = (is_default, frame_id, ctx["id"].as_i64())
                {
                    trace!(frame_id, context_id = id, "execution context created");
                    if let Ok(mut map) = self.contexts.lock() {
                        map.insert(frame_id.to_string(), id);
                    }
                }
            }
            "Runtime.executionContextDestroyed" => {
                if let Some(id) = params["executionContextId"].as_i64() {
                    if let Ok(mut map) = self.contexts.lock() {
                        map.retain(|_, ctx| *ctx != id);
                    }
                }
            }
            "Runtime.executionContextsCleared" => {
                if let Ok(mut map) = self.contexts.lock() {
                    map.clear();
                }
            }
            "Network.requestWillBeSent" => {
                if let Some(id) = params["requestId"].as_str() {
                    if let Ok(mut set) = self.inflight.lock() {
                        set.insert(id.to_string());
                    }
                    self.touch_network();
                }
            }
            "Network.loadingFinished" | "Network.loadingFailed" => {
                if let Some(id) = params["requestId"].as_str() {
                    if let Ok(mut set) = self.inflight.lock() {
                        set.remove(id);
                    }
                    self.touch_network();
                }
            }
            "Page.frameStartedLoading" => self.touch_network(),
            _ => {}
        }
    }
}

/// WebSocket session to a single page target.
///
/// One writer task drains an unbounded channel into the socket; one reader
/// task routes responses to their waiting caller by command id and feeds
/// events into [`PageState`].
pub struct CdpConnection {
    sender: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    state: Arc<PageState>,
    call_timeout: Duration,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl CdpConnection {
    pub async fn connect(ws_url: &str, call_timeout: Duration) -> Result<Self, AutomationError> {
        let (ws_stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| AutomationError::BrowserError(format!("WebSocket connect failed: {e}")))?;
        debug!(url = ws_url, "DevTools WebSocket connected");

        let (mut sink, mut stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let state = Arc::new(PageState::default());

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!("ws send error: {}", e);
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_state = state.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                if !msg.is_text() {
                    continue;
                }
                let txt = msg.into_text().unwrap_or_default();
                let incoming: Incoming = match serde_json::from_str(&txt) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Invalid incoming JSON: {}", e);
                        continue;
                    }
                };
                match (incoming.id, incoming.method) {
                    (Some(id), _) => {
                        if let Some(tx) = reader_pending.lock().await.remove(&id) {
                            let _ = tx.send(match incoming.error {
                                Some(err) => Err(err),
                                None => Ok(incoming.result.unwrap_or(Value::Null)),
                            });
                        }
                    }
                    (None, Some(method)) => reader_state.apply_event(&method, &incoming.params),
                    (None, None) => {}
                }
            }
            debug!("DevTools WebSocket closed");
            // Wake every caller still waiting; their senders drop here.
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            sender: tx,
            pending,
            next_id: AtomicU64::new(1),
            state,
            call_timeout,
            writer,
            reader,
        })
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    /// Send a command and wait for its response.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, AutomationError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel::<CallResult>();
        self.pending.lock().await.insert(id, tx);

        let payload = json!({ "id": id, "method": method, "params": params }).to_string();
        trace!(id, method, "sending command");
        if self.sender.send(Message::Text(payload)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AutomationError::BrowserError(
                "DevTools connection is closed".to_string(),
            ));
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(failure))) => Err(AutomationError::Protocol {
                method: method.to_string(),
                message: format!("{} (code {})", failure.message, failure.code),
            }),
            Ok(Err(_canceled)) => Err(AutomationError::BrowserError(format!(
                "connection dropped while waiting for {method}"
            ))),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(AutomationError::Timeout(format!(
                    "no response to {method} within {:?}",
                    self.call_timeout
                )))
            }
        }
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contexts_are_tracked_per_frame() {
        let state = PageState::default();
        state.apply_event(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 7, "auxData": {"frameId": "F1", "isDefault": true}}}),
        );
        state.apply_event(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 8, "auxData": {"frameId": "F1", "isDefault": false}}}),
        );
        assert_eq!(state.context_for("F1"), Some(7));

        state.apply_event(
            "Runtime.executionContextDestroyed",
            &json!({"executionContextId": 7}),
        );
        assert_eq!(state.context_for("F1"), None);
    }

    #[test]
    fn test_contexts_cleared_on_navigation() {
        let state = PageState::default();
        state.apply_event(
            "Runtime.executionContextCreated",
            &json!({"context": {"id": 3, "auxData": {"frameId": "main", "isDefault": true}}}),
        );
        state.apply_event("Runtime.executionContextsCleared", &json!({}));
        assert_eq!(state.context_for("main"), None);
    }

    #[test]
    fn test_inflight_requests_are_counted() {
        let state = PageState::default();
        state.apply_event("Network.requestWillBeSent", &json!({"requestId": "1"}));
        state.apply_event("Network.requestWillBeSent", &json!({"requestId": "2"}));
        state.apply_event("Network.loadingFinished", &json!({"requestId": "1"}));
        assert_eq!(state.network_activity().0, 1);
        state.apply_event("Network.loadingFailed", &json!({"requestId": "2"}));
        assert_eq!(state.network_activity().0, 0);
    }
}
