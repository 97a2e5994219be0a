//! Driver for a Chromium instance reached over the DevTools protocol.
//!
//! Process spawning stays with the caller; this module only attaches to a
//! browser that is already listening on a debugging WebSocket or port. The
//! attached root models the classic shape: the browser doubles as the
//! default context and reports its product version directly.

use crate::BrowserError;
use crate::Result;
use crate::config::OuterBounds;
use crate::config::ViewportSize;
use crate::driver::BoundsSession;
use crate::driver::CloseListener;
use crate::driver::ContextDriver;
use crate::driver::CreationOptions;
use crate::driver::PageDriver;
use crate::driver::RootDriver;
use crate::lifecycle::ClosedSignal;
use async_trait::async_trait;
use chromiumoxide::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;

type SharedBrowser = Arc<Mutex<Option<Browser>>>;

#[derive(Deserialize)]
struct JsonVersion {
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: String,
}

/// Resolve the debugging WebSocket of a Chrome listening on `port`.
async fn discover_ws_via_port(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let resp = reqwest::Client::new()
        .get(&url)
        .send()
        .await
        .map_err(|err| BrowserError::Transport(format!("failed to reach debug port: {err}")))?;

    if !resp.status().is_success() {
        return Err(BrowserError::Transport(format!(
            "{url} returned {}",
            resp.status()
        )));
    }

    let body: JsonVersion = resp.json().await.map_err(|err| {
        BrowserError::Transport(format!("invalid /json/version response: {err}"))
    })?;

    Ok(body.web_socket_debugger_url)
}

/// Raw CDP command: serializes only the params as the payload.
#[derive(Debug, Clone)]
struct RawCommand {
    method: String,
    params: Value,
}

impl RawCommand {
    fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }
}

impl serde::Serialize for RawCommand {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.params.serialize(serializer)
    }
}

impl chromiumoxide_types::Method for RawCommand {
    fn identifier(&self) -> chromiumoxide_types::MethodId {
        self.method.clone().into()
    }
}

impl chromiumoxide_types::Command for RawCommand {
    type Response = Value;
}

/// Execute a raw CDP command at browser scope.
async fn execute_browser(browser: &SharedBrowser, method: &str, params: Value) -> Result<Value> {
    let guard = browser.lock().await;
    let browser = guard.as_ref().ok_or(BrowserError::NotConnected)?;
    let resp = browser.execute(RawCommand::new(method, params)).await?;
    Ok(resp.result)
}

/// A Chromium root attached over the DevTools protocol.
pub struct ChromiumRoot {
    browser: SharedBrowser,
    version: String,
    closed: Arc<ClosedSignal>,
}

impl ChromiumRoot {
    /// Attach to a browser over its debugging WebSocket.
    pub async fn connect(ws_url: impl Into<String>) -> Result<Arc<Self>> {
        let ws_url = ws_url.into();
        info!("connecting to browser via WebSocket: {ws_url}");
        let (browser, mut handler) = Browser::connect(ws_url).await?;

        let closed = Arc::new(ClosedSignal::new());
        let signal = Arc::clone(&closed);
        tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
            debug!("browser event stream ended");
            signal.fire();
        });

        let browser: SharedBrowser = Arc::new(Mutex::new(Some(browser)));
        let version = browser_version(&browser).await?;
        debug!("attached to {version}");

        Ok(Arc::new(Self {
            browser,
            version,
            closed,
        }))
    }

    /// Attach to a browser listening on a local debugging port.
    pub async fn connect_port(port: u16) -> Result<Arc<Self>> {
        let ws_url = discover_ws_via_port(port).await?;
        Self::connect(ws_url).await
    }
}

async fn browser_version(browser: &SharedBrowser) -> Result<String> {
    let result = execute_browser(browser, "Browser.getVersion", json!({})).await?;
    result
        .get("product")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| BrowserError::Protocol("missing product in Browser.getVersion".to_string()))
}

#[async_trait]
impl RootDriver for ChromiumRoot {
    fn version(&self) -> Option<String> {
        Some(self.version.clone())
    }

    async fn new_context(&self, options: CreationOptions) -> Result<Arc<dyn ContextDriver>> {
        let result =
            execute_browser(&self.browser, "Target.createBrowserContext", json!({})).await?;
        let context_id = result
            .get("browserContextId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                BrowserError::Protocol(
                    "missing browserContextId in Target.createBrowserContext".to_string(),
                )
            })?;
        debug!("created isolated browsing context {context_id}");

        Ok(Arc::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id: Some(context_id),
            default_viewport: options.viewport,
        }))
    }

    fn default_context(&self) -> Option<Arc<dyn ContextDriver>> {
        Some(Arc::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            context_id: None,
            default_viewport: None,
        }))
    }

    async fn pages(&self) -> Result<Vec<Arc<dyn PageDriver>>> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or(BrowserError::NotConnected)?;
        let pages = browser.pages().await?;
        Ok(pages
            .into_iter()
            .map(|page| Arc::new(ChromiumPage::new(page)) as Arc<dyn PageDriver>)
            .collect())
    }

    fn on_disconnect(&self, listener: CloseListener) {
        self.closed.subscribe(listener);
    }
}

/// A browsing context: the browser's default one, or an isolated context
/// created through `Target.createBrowserContext`.
struct ChromiumContext {
    browser: SharedBrowser,
    context_id: Option<String>,
    default_viewport: Option<ViewportSize>,
}

#[async_trait]
impl ContextDriver for ChromiumContext {
    async fn new_page(&self, options: CreationOptions) -> Result<Arc<dyn PageDriver>> {
        let mut params = CreateTargetParams::builder().url("about:blank");
        if let Some(context_id) = &self.context_id {
            params = params.browser_context_id(context_id.clone());
        }
        let params = params.build().map_err(BrowserError::Protocol)?;

        let page = {
            let guard = self.browser.lock().await;
            let browser = guard.as_ref().ok_or(BrowserError::NotConnected)?;
            browser.new_page(params).await?
        };

        let page = ChromiumPage::new(page);
        if let Some(viewport) = options.viewport.or(self.default_viewport) {
            page.override_viewport(viewport).await?;
        }
        Ok(Arc::new(page))
    }
}

/// One page of an attached browser.
#[derive(Debug)]
pub struct ChromiumPage {
    page: Arc<CdpPage>,
}

impl ChromiumPage {
    pub fn new(page: CdpPage) -> Self {
        Self {
            page: Arc::new(page),
        }
    }

    async fn execute_raw(&self, method: &str, params: Value) -> Result<Value> {
        let resp = self.page.execute(RawCommand::new(method, params)).await?;
        Ok(resp.result)
    }
}

#[async_trait]
impl PageDriver for ChromiumPage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        match self.page.evaluate(expression).await {
            Ok(result) => Ok(result.value().cloned().unwrap_or(Value::Null)),
            Err(CdpError::Chrome(err)) => Err(BrowserError::Evaluation(err.to_string())),
            Err(other) => Err(BrowserError::Transport(other.to_string())),
        }
    }

    async fn bounds_session(&self) -> Result<Box<dyn BoundsSession>> {
        let result = self
            .execute_raw("Browser.getWindowForTarget", json!({}))
            .await?;
        let window_id = result
            .get("windowId")
            .and_then(Value::as_i64)
            .ok_or_else(|| BrowserError::Protocol("missing windowId for target".to_string()))?;
        debug!("acquired window bounds session for window {window_id}");

        Ok(Box::new(CdpBoundsSession {
            page: Arc::clone(&self.page),
            window_id,
        }))
    }

    async fn override_viewport(&self, size: ViewportSize) -> Result<()> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(size.width))
            .height(i64::from(size.height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::Protocol)?;
        self.page.execute(params).await?;
        Ok(())
    }
}

/// Window-bounds session bound to the OS window hosting one page.
struct CdpBoundsSession {
    page: Arc<CdpPage>,
    window_id: i64,
}

impl CdpBoundsSession {
    async fn execute_raw(&self, method: &str, params: Value) -> Result<Value> {
        let resp = self.page.execute(RawCommand::new(method, params)).await?;
        Ok(resp.result)
    }
}

#[async_trait]
impl BoundsSession for CdpBoundsSession {
    async fn bounds(&mut self) -> Result<OuterBounds> {
        let result = self
            .execute_raw("Browser.getWindowBounds", json!({ "windowId": self.window_id }))
            .await?;
        let bounds = result
            .get("bounds")
            .ok_or_else(|| BrowserError::Protocol("missing bounds for window".to_string()))?;
        let read = |key: &str| bounds.get(key).and_then(Value::as_i64);
        match (read("width"), read("height")) {
            (Some(width), Some(height)) => Ok(OuterBounds { width, height }),
            _ => Err(BrowserError::Protocol(format!(
                "malformed window bounds: {bounds}"
            ))),
        }
    }

    async fn set_bounds(&mut self, bounds: OuterBounds) -> Result<()> {
        self.execute_raw(
            "Browser.setWindowBounds",
            json!({
                "windowId": self.window_id,
                "bounds": { "width": bounds.width, "height": bounds.height },
            }),
        )
        .await?;
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        // Bounds commands ride the page's own flat session; there is no
        // separate attachment to tear down on this transport.
        debug!("released window bounds session for window {}", self.window_id);
        Ok(())
    }
}
