//! Chromium sessions over the DevTools protocol
//!
//! One browser process is launched per audit and shared by every session.
//! Each session gets its own incognito browser context, so persisted storage
//! written by one check is invisible to the next.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                   Browser process                      │
//! ├───────────────────────────────────────────────────────┤
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐    │
//! │  │  Context 1   │ │  Context 2   │ │  Context 3   │    │
//! │  │ shared checks│ │ reduced mot. │ │ blocked .mp3 │    │
//! │  └──────────────┘ └──────────────┘ └──────────────┘    │
//! └───────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown, RemoteObject,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, instrument, trace, warn};

use super::{PageDriver, SessionConfig, SessionProvider};
use crate::config::AuditConfig;
use crate::error::HarnessError;
use crate::faults::{motion, network, storage};
use crate::query::{Point, Query};

/// How to start the browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    /// Pass `--no-sandbox`; needed when running as root in containers
    pub no_sandbox: bool,
    /// Explicit browser binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// Upper bound for navigations and individual protocol commands
    pub navigation_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            no_sandbox: false,
            chrome_path: None,
            user_data_dir: None,
            navigation_timeout: Duration::from_secs(15),
        }
    }
}

impl LaunchOptions {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            navigation_timeout: config.timing.navigation_timeout,
            ..Self::default()
        }
    }
}

/// Session provider backed by a single Chromium process
pub struct ChromeSessionManager {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
    next_id: AtomicU64,
}

impl ChromeSessionManager {
    /// Launch the browser.
    ///
    /// # Errors
    ///
    /// [`HarnessError::EngineUnavailable`] when the browser cannot be found or started.
    #[instrument(skip(options), fields(headless = options.headless))]
    pub async fn launch(options: LaunchOptions) -> Result<Self, HarnessError> {
        info!("Launching browser for audit");

        let mut builder = BrowserConfig::builder().request_timeout(options.navigation_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if options.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(path) = &options.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(dir) = &options.user_data_dir {
            builder = builder.user_data_dir(dir);
        }
        let config = builder.build().map_err(HarnessError::EngineUnavailable)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| HarnessError::EngineUnavailable(e.to_string()))?;

        // Spawn handler to process browser events
        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        info!("Browser launched successfully");
        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler: handle,
            navigation_timeout: options.navigation_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Close the browser process
    pub async fn shutdown(&self) -> Result<(), HarnessError> {
        let result = {
            let mut browser = self.browser.lock().await;
            browser.close().await.map(|_| ())
        };
        self.handler.abort();
        result.map_err(|e| HarnessError::Protocol(format!("Failed to close browser: {}", e)))
    }

    async fn open_page(&self) -> Result<(Page, BrowserContextId), HarnessError> {
        let mut browser = self.browser.lock().await;
        let context_id = browser
            .create_browser_context(CreateBrowserContextParams::default())
            .await
            .map_err(|e| {
                HarnessError::EngineUnavailable(format!("Failed to create context: {}", e))
            })?;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(HarnessError::Protocol)?;

        match browser.new_page(params).await {
            Ok(page) => Ok((page, context_id)),
            Err(e) => {
                if let Err(dispose) = browser.dispose_browser_context(context_id).await {
                    trace!("Failed to dispose context after page error: {}", dispose);
                }
                Err(HarnessError::EngineUnavailable(format!("Failed to open page: {}", e)))
            }
        }
    }
}

#[async_trait]
impl SessionProvider for ChromeSessionManager {
    #[instrument(skip(self, config), fields(label = %config.label))]
    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn PageDriver>, HarnessError> {
        let id = format!(
            "{}-{}",
            config.label,
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        let (page, context_id) = self.open_page().await?;
        let errors = Arc::new(Mutex::new(Vec::new()));

        let configured = bounded(self.navigation_timeout, configure(&page, &config, &errors)).await;
        let tasks = match configured {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("Failed to configure session {}: {}", id, e);
                release(page, context_id, self.browser.clone()).await;
                return Err(e);
            }
        };

        debug!(
            "Session {} ready (motion={:?}, rules={}, storage faults={})",
            id,
            config.motion,
            config.network_rules.len(),
            config.storage_faults.len()
        );

        Ok(Arc::new(ChromeSession {
            id,
            config,
            page,
            context_id,
            browser: self.browser.clone(),
            navigation_timeout: self.navigation_timeout,
            errors,
            tasks,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Apply everything fixed at creation; returns the background tasks it started
async fn configure(
    page: &Page,
    config: &SessionConfig,
    errors: &Arc<Mutex<Vec<String>>>,
) -> Result<Vec<JoinHandle<()>>, HarnessError> {
    let viewport = SetDeviceMetricsOverrideParams::builder()
        .width(i64::from(config.viewport.width))
        .height(i64::from(config.viewport.height))
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
        .map_err(HarnessError::Protocol)?;
    page.execute(viewport)
        .await
        .map_err(|e| HarnessError::Protocol(format!("Failed to set viewport: {}", e)))?;

    motion::apply(page, config.motion).await?;
    storage::install(page, &config.storage_faults).await?;

    let mut tasks = capture_script_errors(page, errors).await?;
    match network::install(page, &config.network_rules).await {
        Ok(interceptor) => tasks.extend(interceptor),
        Err(e) => {
            tasks.iter().for_each(JoinHandle::abort);
            return Err(e);
        }
    }
    Ok(tasks)
}

fn describe_remote(object: &RemoteObject) -> String {
    match (&object.value, &object.description) {
        (Some(Value::String(s)), _) => s.clone(),
        (Some(value), _) => value.to_string(),
        (None, Some(description)) => description.clone(),
        (None, None) => String::new(),
    }
}

/// Record uncaught exceptions and `console.error` calls into `sink`
async fn capture_script_errors(
    page: &Page,
    sink: &Arc<Mutex<Vec<String>>>,
) -> Result<Vec<JoinHandle<()>>, HarnessError> {
    let subscribe = |e: chromiumoxide::error::CdpError| {
        HarnessError::Protocol(format!("Failed to subscribe to runtime events: {}", e))
    };

    let mut console = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(subscribe)?;
    let mut exceptions = page
        .event_listener::<EventExceptionThrown>()
        .await
        .map_err(subscribe)?;

    let console_sink = sink.clone();
    let console_task = tokio::spawn(async move {
        while let Some(event) = console.next().await {
            if event.r#type != ConsoleApiCalledType::Error {
                continue;
            }
            let message = event
                .args
                .iter()
                .map(describe_remote)
                .collect::<Vec<_>>()
                .join(" ");
            debug!("console.error: {}", message);
            console_sink.lock().await.push(message);
        }
    });

    let exception_sink = sink.clone();
    let exception_task = tokio::spawn(async move {
        while let Some(event) = exceptions.next().await {
            let details = &event.exception_details;
            let message = details
                .exception
                .as_ref()
                .and_then(|e| e.description.clone())
                .unwrap_or_else(|| details.text.clone());
            debug!("Uncaught exception: {}", message);
            exception_sink.lock().await.push(message);
        }
    });

    Ok(vec![console_task, exception_task])
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, HarnessError>
where
    F: Future<Output = Result<T, HarnessError>>,
{
    timeout(limit, fut)
        .await
        .map_err(|_| HarnessError::Protocol(format!("Browser did not respond within {:?}", limit)))?
}

async fn release(page: Page, context_id: BrowserContextId, browser: Arc<Mutex<Browser>>) {
    if let Err(e) = page.close().await {
        trace!("Page already gone: {}", e);
    }
    if let Err(e) = browser.lock().await.dispose_browser_context(context_id).await {
        trace!("Context already disposed: {}", e);
    }
}

/// Physical key description sent with key events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    pub key: String,
    pub code: String,
    pub key_code: i64,
    pub text: Option<String>,
}

/// Resolve a key name (`Tab`, `Escape`, `ArrowDown`, `a`, ...) to its key event fields
pub fn key_definition(key: &str) -> Option<KeyDefinition> {
    let named = |code: &str, key_code: i64, text: Option<&str>| KeyDefinition {
        key: key.to_string(),
        code: code.to_string(),
        key_code,
        text: text.map(str::to_string),
    };

    let definition = match key {
        "Tab" => named("Tab", 9, None),
        "Enter" => named("Enter", 13, Some("\r")),
        "Escape" => named("Escape", 27, None),
        " " | "Space" => KeyDefinition {
            key: " ".to_string(),
            code: "Space".to_string(),
            key_code: 32,
            text: Some(" ".to_string()),
        },
        "Backspace" => named("Backspace", 8, None),
        "ArrowLeft" => named("ArrowLeft", 37, None),
        "ArrowUp" => named("ArrowUp", 38, None),
        "ArrowRight" => named("ArrowRight", 39, None),
        "ArrowDown" => named("ArrowDown", 40, None),
        other => {
            let mut chars = other.chars();
            let c = chars.next()?;
            if chars.next().is_some() || !c.is_ascii_alphanumeric() {
                return None;
            }
            let upper = c.to_ascii_uppercase();
            let code = if c.is_ascii_digit() {
                format!("Digit{}", c)
            } else {
                format!("Key{}", upper)
            };
            KeyDefinition {
                key: c.to_string(),
                code,
                key_code: i64::from(upper as u8),
                text: Some(c.to_string()),
            }
        }
    };
    Some(definition)
}

/// A page in its own browser context
pub struct ChromeSession {
    id: String,
    config: SessionConfig,
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Mutex<Browser>>,
    navigation_timeout: Duration,
    errors: Arc<Mutex<Vec<String>>>,
    tasks: Vec<JoinHandle<()>>,
    closed: AtomicBool,
}

impl ChromeSession {
    fn ensure_open(&self) -> Result<(), HarnessError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(HarnessError::SessionClosed(self.id.clone()))
        } else {
            Ok(())
        }
    }

    async fn load(&self, url: &str, reload: bool) -> Result<(), HarnessError> {
        self.ensure_open()?;
        self.errors.lock().await.clear();

        let navigation = async {
            if reload {
                self.page.reload().await.map(|_| ())
            } else {
                self.page.goto(url).await.map(|_| ())
            }
        };

        match timeout(self.navigation_timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HarnessError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(HarnessError::Navigation {
                url: url.to_string(),
                message: format!("timed out after {:?}", self.navigation_timeout),
            }),
        }
    }

    /// Evaluate an expression and return its JSON value (`undefined` becomes `null`)
    async fn evaluate(&self, expression: &str) -> Result<Value, HarnessError> {
        self.ensure_open()?;
        let wrapped = format!("JSON.stringify({{ v: ({}) }})", expression);

        let raw: String = bounded(self.navigation_timeout, async {
            self.page
                .evaluate(wrapped)
                .await
                .map_err(|e| HarnessError::Evaluation(e.to_string()))?
                .into_value()
                .map_err(|e| HarnessError::Evaluation(e.to_string()))
        })
        .await?;

        let mut envelope: Value = serde_json::from_str(&raw)
            .map_err(|e| HarnessError::Evaluation(format!("Malformed result {}: {}", raw, e)))?;
        Ok(envelope.get_mut("v").map(Value::take).unwrap_or(Value::Null))
    }

    async fn mouse(&self, params: DispatchMouseEventParams) -> Result<(), HarnessError> {
        bounded(self.navigation_timeout, async {
            self.page
                .execute(params)
                .await
                .map(|_| ())
                .map_err(|e| HarnessError::Protocol(format!("Mouse event failed: {}", e)))
        })
        .await
    }

    async fn key(&self, params: DispatchKeyEventParams) -> Result<(), HarnessError> {
        bounded(self.navigation_timeout, async {
            self.page
                .execute(params)
                .await
                .map(|_| ())
                .map_err(|e| HarnessError::Protocol(format!("Key event failed: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[instrument(skip(self), fields(session = %self.id))]
    async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        debug!("Navigating to {}", url);
        self.load(url, false).await
    }

    async fn reload(&self) -> Result<(), HarnessError> {
        let current = self.page.url().await.ok().flatten().unwrap_or_default();
        debug!("Reloading {}", current);
        self.load(&current, true).await
    }

    async fn query(&self, query: &Query) -> Result<Value, HarnessError> {
        trace!("Query {:?}", query);
        self.evaluate(&query.to_expression()).await
    }

    async fn click_at(&self, point: Point) -> Result<(), HarnessError> {
        self.ensure_open()?;
        trace!("Click at ({}, {})", point.x, point.y);

        let moved = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseMoved)
            .x(point.x)
            .y(point.y)
            .build()
            .map_err(HarnessError::Protocol)?;
        self.mouse(moved).await?;

        for kind in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let params = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(point.x)
                .y(point.y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(HarnessError::Protocol)?;
            self.mouse(params).await?;
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), HarnessError> {
        self.ensure_open()?;
        let definition = key_definition(key)
            .ok_or_else(|| HarnessError::Protocol(format!("Unsupported key: {}", key)))?;
        trace!("Press {}", definition.key);

        let mut down = DispatchKeyEventParams::builder()
            .r#type(if definition.text.is_some() {
                DispatchKeyEventType::KeyDown
            } else {
                DispatchKeyEventType::RawKeyDown
            })
            .key(definition.key.clone())
            .code(definition.code.clone())
            .windows_virtual_key_code(definition.key_code)
            .native_virtual_key_code(definition.key_code);
        if let Some(text) = &definition.text {
            down = down.text(text.clone()).unmodified_text(text.clone());
        }
        self.key(down.build().map_err(HarnessError::Protocol)?).await?;

        let up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key(definition.key)
            .code(definition.code)
            .windows_virtual_key_code(definition.key_code)
            .native_virtual_key_code(definition.key_code)
            .build()
            .map_err(HarnessError::Protocol)?;
        self.key(up).await
    }

    async fn focus(&self, selector: &str) -> Result<bool, HarnessError> {
        let expression = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; el.focus(); return true; }})()",
            Value::String(selector.to_string())
        );
        let focused = self.evaluate(&expression).await?;
        Ok(focused.as_bool().unwrap_or(false))
    }

    async fn script_errors(&self) -> Vec<String> {
        self.errors.lock().await.clone()
    }

    #[instrument(skip(self), fields(session = %self.id))]
    async fn close(&self) -> Result<(), HarnessError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.tasks.iter().for_each(JoinHandle::abort);

        let closed = self.page.clone().close().await;
        let disposed = self
            .browser
            .lock()
            .await
            .dispose_browser_context(self.context_id.clone())
            .await;
        debug!("Session closed");

        closed.map_err(|e| HarnessError::Protocol(format!("Failed to close page: {}", e)))?;
        disposed.map_err(|e| HarnessError::Protocol(format!("Failed to dispose context: {}", e)))
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // Dropped without close, e.g. a check cancelled at its deadline
        self.tasks.iter().for_each(JoinHandle::abort);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            warn!("Session {} dropped while open; releasing in background", self.id);
            runtime.spawn(release(
                self.page.clone(),
                self.context_id.clone(),
                self.browser.clone(),
            ));
        }
    }
}
