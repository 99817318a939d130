use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::client::BrowserProcess;
use super::connection::CdpConnection;
use crate::config::DriverConfig;
use crate::engine::{BrowserEngine, ClickKind, ElementRef, FrameInfo, Key, Scope};
use crate::errors::AutomationError;
use crate::selector::Selector;

const DOM_HELPERS: &str = include_str!("dom_helpers.js");

const DETACHED_TAG: &str = "__unit4_detached";

/// Quiet window after the last request before the network counts as idle.
const NETWORK_QUIET: Duration = Duration::from_millis(500);

const CTRL: u32 = 2;

/// [`BrowserEngine`] over the Chrome DevTools Protocol.
pub struct CdpEngine {
    process: Mutex<BrowserProcess>,
    conn: CdpConnection,
    slow_mo: Duration,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

/// Subset of `Network.Cookie` accepted back by `Network.setCookies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    #[serde(default)]
    secure: bool,
    #[serde(default)]
    http_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    same_site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires: Option<f64>,
}

impl StoredCookie {
    fn from_protocol(raw: &Value) -> Option<Self> {
        let mut cookie: StoredCookie = serde_json::from_value(raw.clone()).ok()?;
        // Session cookies report expires = -1; setCookies wants the field absent.
        if raw["session"].as_bool().unwrap_or(false) || cookie.expires.is_some_and(|e| e < 0.0) {
            cookie.expires = None;
        }
        Some(cookie)
    }
}

impl CdpEngine {
    /// Launch (or attach to) a browser and connect to its first page.
    pub async fn launch(config: &DriverConfig) -> Result<Self, AutomationError> {
        let process = BrowserProcess::launch_or_attach(config).await?;
        let target = process.client.page_target().await?;
        let ws_url = target.websocket_url.clone().ok_or_else(|| {
            AutomationError::BrowserError(format!("target {} has no WebSocket URL", target.id))
        })?;
        info!(target = %target.id, url = %target.url, "Connecting to page target");

        let conn = CdpConnection::connect(&ws_url, config.default_timeout() * 3).await?;
        for domain in ["Page.enable", "Runtime.enable", "Network.enable"] {
            conn.call(domain, json!({})).await?;
        }

        Ok(Self {
            process: Mutex::new(process),
            conn,
            slow_mo: config.slow_mo(),
            timeout: config.default_timeout(),
        })
    }

    async fn pace(&self) {
        if !self.slow_mo.is_zero() {
            tokio::time::sleep(self.slow_mo).await;
        }
    }

    async fn main_frame_id(&self) -> Result<String, AutomationError> {
        let tree = self.conn.call("Page.getFrameTree", json!({})).await?;
        tree["frameTree"]["frame"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AutomationError::BrowserError("frame tree has no main frame".into()))
    }

    /// Evaluate `expression` in the default context of `frame_id`, waiting
    /// briefly for the context to appear after a navigation.
    async fn evaluate_in(&self, frame_id: &str, expression: &str) -> Result<Value, AutomationError> {
        let mut context = self.conn.state().context_for(frame_id);
        let mut waited = Duration::ZERO;
        while context.is_none() && waited < self.timeout {
            tokio::time::sleep(Duration::from_millis(100)).await;
            waited += Duration::from_millis(100);
            context = self.conn.state().context_for(frame_id);
        }
        let context = context.ok_or_else(|| {
            AutomationError::FrameDetached(format!("no execution context for frame {frame_id}"))
        })?;

        let response = self
            .conn
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "contextId": context,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = response.get("exceptionDetails") {
            let message = details["exception"]["description"]
                .as_str()
                .or_else(|| details["text"].as_str())
                .unwrap_or("unknown exception")
                .to_string();
            if message.contains(DETACHED_TAG) {
                return Err(AutomationError::ElementDetached(message));
            }
            return Err(AutomationError::ScriptError(message));
        }
        Ok(response["result"]["value"].clone())
    }

    async fn helper(&self, frame_id: &str, op: &str, args: Value) -> Result<Value, AutomationError> {
        let expression = format!(
            "{DOM_HELPERS}.dispatch({}, {})",
            Value::String(op.to_string()),
            args
        );
        self.evaluate_in(frame_id, &expression).await
    }

    async fn key_event(&self, event: Value) -> Result<(), AutomationError> {
        self.conn.call("Input.dispatchKeyEvent", event).await?;
        Ok(())
    }

    async fn mouse_event(&self, kind: &str, at: &Point, click_count: u32) -> Result<(), AutomationError> {
        self.conn
            .call(
                "Input.dispatchMouseEvent",
                json!({
                    "type": kind,
                    "x": at.x,
                    "y": at.y,
                    "button": "left",
                    "clickCount": click_count,
                }),
            )
            .await?;
        Ok(())
    }
}

fn collect_frames(node: &Value, out: &mut Vec<FrameInfo>) {
    let frame = &node["frame"];
    if let Some(id) = frame["id"].as_str() {
        out.push(FrameInfo {
            id: id.to_string(),
            url: frame["url"].as_str().unwrap_or_default().to_string(),
            is_main: frame.get("parentId").is_none(),
        });
    }
    if let Some(children) = node["childFrames"].as_array() {
        for child in children {
            collect_frames(child, out);
        }
    }
}

fn key_description(key: Key) -> (&'static str, &'static str, u32, u32, Option<&'static str>) {
    // (key, code, windowsVirtualKeyCode, modifiers, text)
    match key {
        Key::Tab => ("Tab", "Tab", 9, 0, None),
        Key::Enter => ("Enter", "Enter", 13, 0, Some("\r")),
        Key::Escape => ("Escape", "Escape", 27, 0, None),
        Key::SelectAll => ("a", "KeyA", 65, CTRL, None),
        Key::Save => ("s", "KeyS", 83, CTRL, None),
    }
}

fn node_id(value: &Value) -> Result<u64, AutomationError> {
    value
        .as_u64()
        .ok_or_else(|| AutomationError::ScriptError(format!("expected node id, got {value}")))
}

#[async_trait::async_trait]
impl BrowserEngine for CdpEngine {
    #[instrument(level = "debug", skip(self))]
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        let response = self.conn.call("Page.navigate", json!({ "url": url })).await?;
        if let Some(error) = response["errorText"].as_str() {
            return Err(AutomationError::BrowserError(format!(
                "navigation to {url} failed: {error}"
            )));
        }

        let main = self.main_frame_id().await?;
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            match self.helper(&main, "ready_state", json!({})).await {
                Ok(state) if state == "complete" => return Ok(()),
                Ok(_) | Err(AutomationError::FrameDetached(_)) => {}
                Err(e) => debug!("ready state check failed: {}", e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!("page load of {url}")));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<(), AutomationError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (inflight, quiet) = self.conn.state().network_activity();
            if inflight == 0 && quiet >= NETWORK_QUIET {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "network still busy after {timeout:?} ({inflight} requests in flight)"
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn title(&self) -> Result<String, AutomationError> {
        let main = self.main_frame_id().await?;
        let value = self.helper(&main, "title", json!({})).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn frames(&self) -> Result<Vec<FrameInfo>, AutomationError> {
        let tree = self.conn.call("Page.getFrameTree", json!({})).await?;
        let mut frames = Vec::new();
        collect_frames(&tree["frameTree"], &mut frames);
        Ok(frames)
    }

    async fn query(
        &self,
        scope: &Scope,
        selector: &Selector,
    ) -> Result<Vec<ElementRef>, AutomationError> {
        if let Selector::Invalid { reason } = selector {
            return Err(AutomationError::InvalidArgument(reason.clone()));
        }
        let scope_node = match scope {
            Scope::Frame(_) => Value::Null,
            Scope::Element(el) => json!(el.node),
        };
        let frame_id = scope.frame_id();
        let ids = self
            .helper(
                frame_id,
                "query",
                json!({ "scope": scope_node, "selector": selector }),
            )
            .await?;
        let ids = ids.as_array().cloned().unwrap_or_default();
        ids.iter()
            .map(|v| {
                Ok(ElementRef {
                    frame_id: frame_id.to_string(),
                    node: node_id(v)?,
                })
            })
            .collect()
    }

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AutomationError> {
        let v = self
            .helper(&element.frame_id, "visible", json!({ "id": element.node }))
            .await?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn inner_text(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let v = self
            .helper(&element.frame_id, "text", json!({ "id": element.node }))
            .await?;
        Ok(v.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(
        &self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, AutomationError> {
        let v = self
            .helper(
                &element.frame_id,
                "attr",
                json!({ "id": element.node, "name": name }),
            )
            .await?;
        Ok(v.as_str().map(str::to_string))
    }

    async fn input_value(&self, element: &ElementRef) -> Result<Option<String>, AutomationError> {
        let v = self
            .helper(&element.frame_id, "value", json!({ "id": element.node }))
            .await?;
        Ok(v.as_str().map(str::to_string))
    }

    async fn closest_row(
        &self,
        element: &ElementRef,
    ) -> Result<Option<ElementRef>, AutomationError> {
        let v = self
            .helper(&element.frame_id, "row", json!({ "id": element.node }))
            .await?;
        if v.is_null() {
            return Ok(None);
        }
        Ok(Some(ElementRef {
            frame_id: element.frame_id.clone(),
            node: node_id(&v)?,
        }))
    }

    #[instrument(level = "debug", skip(self))]
    async fn click(&self, element: &ElementRef, kind: ClickKind) -> Result<(), AutomationError> {
        self.pace().await;
        if kind == ClickKind::Dom {
            self.helper(&element.frame_id, "dom_click", json!({ "id": element.node }))
                .await?;
            return Ok(());
        }

        let at: Point = serde_json::from_value(
            self.helper(&element.frame_id, "centre", json!({ "id": element.node }))
                .await?,
        )?;
        self.mouse_event("mouseMoved", &at, 0).await?;
        self.mouse_event("mousePressed", &at, 1).await?;
        self.mouse_event("mouseReleased", &at, 1).await?;
        if kind == ClickKind::Double {
            self.mouse_event("mousePressed", &at, 2).await?;
            self.mouse_event("mouseReleased", &at, 2).await?;
        }
        Ok(())
    }

    async fn fill(&self, element: &ElementRef, value: &str) -> Result<(), AutomationError> {
        self.pace().await;
        let editable = self
            .helper(
                &element.frame_id,
                "prepare_fill",
                json!({ "id": element.node }),
            )
            .await?;
        if editable != Value::Bool(true) {
            return Err(AutomationError::ElementNotEditable(format!(
                "node {} in frame {}",
                element.node, element.frame_id
            )));
        }
        if value.is_empty() {
            self.helper(
                &element.frame_id,
                "set_value",
                json!({ "id": element.node, "value": "" }),
            )
            .await?;
        } else {
            self.conn
                .call("Input.insertText", json!({ "text": value }))
                .await?;
        }
        Ok(())
    }

    async fn set_value(&self, element: &ElementRef, value: &str) -> Result<(), AutomationError> {
        self.pace().await;
        self.helper(
            &element.frame_id,
            "set_value",
            json!({ "id": element.node, "value": value }),
        )
        .await?;
        Ok(())
    }

    async fn press(&self, key: Key) -> Result<(), AutomationError> {
        self.pace().await;
        let (name, code, vk, modifiers, text) = key_description(key);
        let mut down = json!({
            "type": if text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": name,
            "code": code,
            "windowsVirtualKeyCode": vk,
            "modifiers": modifiers,
        });
        if let Some(text) = text {
            down["text"] = json!(text);
        }
        if key == Key::SelectAll {
            down["commands"] = json!(["selectAll"]);
        }
        self.key_event(down).await?;
        self.key_event(json!({
            "type": "keyUp",
            "key": name,
            "code": code,
            "windowsVirtualKeyCode": vk,
            "modifiers": modifiers,
        }))
        .await
    }

    async fn type_text(&self, text: &str, delay: Duration) -> Result<(), AutomationError> {
        self.pace().await;
        for ch in text.chars() {
            let s = ch.to_string();
            self.key_event(json!({ "type": "keyDown", "key": s, "text": s }))
                .await?;
            self.key_event(json!({ "type": "keyUp", "key": s })).await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn save_session(&self, path: &Path) -> Result<(), AutomationError> {
        let response = self.conn.call("Network.getAllCookies", json!({})).await?;
        let cookies: Vec<StoredCookie> = response["cookies"]
            .as_array()
            .map(|all| all.iter().filter_map(StoredCookie::from_protocol).collect())
            .unwrap_or_default();
        let body = serde_json::to_string_pretty(&json!({ "cookies": cookies }))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AutomationError::SessionStore(format!("{}: {e}", parent.display())))?;
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| AutomationError::SessionStore(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), count = cookies.len(), "Session saved");
        Ok(())
    }

    async fn restore_session(&self, path: &Path) -> Result<(), AutomationError> {
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AutomationError::SessionStore(format!("{}: {e}", path.display())))?;
        let stored: Value = serde_json::from_str(&body)
            .map_err(|e| AutomationError::SessionStore(format!("{}: {e}", path.display())))?;
        let cookies: Vec<StoredCookie> =
            serde_json::from_value(stored["cookies"].clone()).unwrap_or_default();
        if cookies.is_empty() {
            return Ok(());
        }
        self.conn
            .call("Network.setCookies", json!({ "cookies": cookies }))
            .await?;
        info!(path = %path.display(), count = cookies.len(), "Session restored");
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        if let Err(e) = self.conn.call("Browser.close", json!({})).await {
            debug!("Browser.close failed: {}", e);
        }
        self.process.lock().await.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_tree_is_flattened_main_first() {
        let tree = json!({
            "frame": {"id": "main", "url": "https://erp.example.com/"},
            "childFrames": [
                {"frame": {"id": "menu", "parentId": "main", "url": "https://erp.example.com/menu"}},
                {
                    "frame": {"id": "content", "parentId": "main", "url": "https://erp.example.com/ContentContainer.aspx"},
                    "childFrames": [
                        {"frame": {"id": "inner", "parentId": "content", "url": "about:blank"}}
                    ]
                }
            ]
        });
        let mut frames = Vec::new();
        collect_frames(&tree, &mut frames);
        let ids: Vec<_> = frames.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["main", "menu", "content", "inner"]);
        assert!(frames[0].is_main);
        assert!(!frames[2].is_main);
    }

    #[test]
    fn test_session_cookie_drops_expiry() {
        let cookie = StoredCookie::from_protocol(&json!({
            "name": "ASP.NET_SessionId",
            "value": "abc",
            "domain": "erp.example.com",
            "path": "/",
            "expires": -1,
            "size": 20,
            "httpOnly": true,
            "secure": true,
            "session": true
        }))
        .unwrap();
        assert_eq!(cookie.expires, None);
        assert!(cookie.http_only);
        let out = serde_json::to_value(&cookie).unwrap();
        assert!(out.get("size").is_none());
        assert!(out.get("expires").is_none());
    }

    #[test]
    fn test_helper_bundle_is_an_expression() {
        assert!(DOM_HELPERS.trim_start().starts_with("(function"));
        assert!(DOM_HELPERS.trim_end().ends_with("})()"));
        assert!(DOM_HELPERS.contains(DETACHED_TAG));
    }

    #[test]
    fn test_helper_registry_holds_weak_references() {
        assert!(DOM_HELPERS.contains("new WeakRef(el)"));
        assert!(DOM_HELPERS.contains("const ids = new WeakMap()"));
        assert!(!DOM_HELPERS.contains("nodes.push"));
        // removed nodes are dropped before every query
        let query = DOM_HELPERS.find("case \"query\": {").unwrap();
        let body = DOM_HELPERS[query..]
            .trim_start_matches("case \"query\": {")
            .trim_start();
        assert!(body.starts_with("prune();"));
    }

    #[test]
    fn test_button_lookup_prefers_exact_caption() {
        let start = DOM_HELPERS.find("case \"button\"").unwrap();
        let end = start + DOM_HELPERS[start..].find("case \"attr_contains\"").unwrap();
        let button = &DOM_HELPERS[start..end];
        let exact = button.find("if (exact.length > 0) return").unwrap();
        let partial = button.find(".includes(wanted)").unwrap();
        assert!(exact < partial);
        assert_eq!(button.matches(".includes(wanted)").count(), 1);
    }
}
