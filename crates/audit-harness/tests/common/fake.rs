//! In-memory stand-in for the audited timer app
//!
//! `FakePage` answers harness queries from a small state machine that mimics
//! the real app: a settings panel opened by a toggle, a start/reset pair, a
//! pool surface that spawns ripples, and settings persisted as JSON. Each
//! field of [`Bugs`] breaks one behavior so that the matching check can be
//! seen to fail.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use audit_harness::config::AppContract;
use audit_harness::error::HarnessError;
use audit_harness::faults::{MotionPreference, RuleAction, RuleMatcher};
use audit_harness::query::{Point, Query, Rect};
use audit_harness::session::{PageDriver, SessionConfig, SessionProvider};
use serde_json::{json, Value};

/// Defects the fake app can be built with
#[derive(Debug, Clone, Default)]
pub struct Bugs {
    pub engine_down: bool,
    pub unreachable: bool,
    pub hang_on_title: bool,
    pub wrong_title: bool,
    pub console_error_on_load: bool,
    pub dead_zone: bool,
    pub missing_label: bool,
    pub pool_not_focusable: bool,
    pub no_inert: bool,
    pub outside_click_ignored: bool,
    pub escape_ignored: bool,
    pub focus_leak: bool,
    pub frozen_timer: bool,
    pub sticky_reset: bool,
    pub both_controls: bool,
    pub forget_theme: bool,
    pub theme_click_ignored: bool,
    pub animate_despite_reduced_motion: bool,
    pub crash_on_corrupt: bool,
    pub no_fallback: bool,
    pub audio_crash: bool,
    pub settings_button_disabled: bool,
}

pub const TITLE: &str = "Kenshō | Meditation Timer";
pub const AUDIO_URL: &str = "http://localhost:8000/audio/rain.mp3";

const TOGGLE: Rect = Rect { x: 1220.0, y: 20.0, width: 40.0, height: 40.0 };
const PANEL: Rect = Rect { x: 900.0, y: 80.0, width: 360.0, height: 400.0 };
const THEME_OPTION: Rect = Rect { x: 920.0, y: 100.0, width: 100.0, height: 40.0 };
const TIME_OPTION: Rect = Rect { x: 920.0, y: 160.0, width: 100.0, height: 40.0 };
const CONTROL: Rect = Rect { x: 590.0, y: 600.0, width: 100.0, height: 40.0 };
const DISPLAY: Rect = Rect { x: 540.0, y: 300.0, width: 200.0, height: 80.0 };
const VIEWPORT: Rect = Rect { x: 0.0, y: 0.0, width: 1280.0, height: 720.0 };

/// Ids of the focusable elements inside the panel, in tab order
const PANEL_FOCUSABLE: [&str; 4] = ["close-settings", "theme-default", "theme-sunrise", "time-25"];

fn contains(rect: &Rect, p: Point) -> bool {
    p.x >= rect.x && p.x < rect.x + rect.width && p.y >= rect.y && p.y < rect.y + rect.height
}

/// Band between the control row and the pool content above it
fn in_gap(p: Point) -> bool {
    p.x >= CONTROL.x
        && p.x < CONTROL.x + CONTROL.width
        && p.y >= CONTROL.y - 20.0
        && p.y < CONTROL.y
}

#[derive(Debug, Clone, PartialEq)]
enum Focus {
    Body,
    Outside(String),
    Panel(usize),
}

#[derive(Debug)]
struct AppState {
    loads: u32,
    storage: Option<String>,
    theme: String,
    time: String,
    panel_open: bool,
    running: bool,
    ripples: u64,
    focus: Focus,
    errors: Vec<String>,
    closed: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            loads: 0,
            storage: None,
            theme: String::new(),
            time: "15".to_string(),
            panel_open: false,
            running: false,
            ripples: 0,
            focus: Focus::Body,
            errors: Vec::new(),
            closed: false,
        }
    }
}

/// Element geometry and state: (rect, visible, enabled, receives pointer)
type Element = (Rect, bool, bool, bool);

pub struct FakePage {
    id: String,
    config: SessionConfig,
    bugs: Bugs,
    app: AppContract,
    state: Mutex<AppState>,
    closes: Arc<AtomicUsize>,
}

impl FakePage {
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        bugs: Bugs,
        closes: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            id: id.into(),
            config,
            bugs,
            app: AppContract::default(),
            state: Mutex::new(AppState::default()),
            closes,
        }
    }

    /// A page with no faults and the given defects
    pub fn standalone(bugs: Bugs) -> Arc<Self> {
        Arc::new(Self::new(
            "fake",
            SessionConfig::new("fake", Default::default()),
            bugs,
            Arc::new(AtomicUsize::new(0)),
        ))
    }

    pub fn ripples(&self) -> u64 {
        self.state.lock().unwrap().ripples
    }

    pub fn panel_open(&self) -> bool {
        self.state.lock().unwrap().panel_open
    }

    pub fn running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    fn audio_blocked(&self) -> bool {
        RuleMatcher::compile(&self.config.network_rules)
            .map(|m| m.action_for(AUDIO_URL) == Some(RuleAction::Abort))
            .unwrap_or(false)
    }

    fn load(&self) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(HarnessError::SessionClosed(self.id.clone()));
        }

        state.loads += 1;
        state.errors.clear();
        if state.loads == 1 {
            for fault in &self.config.storage_faults {
                if fault.key == self.app.storage_key {
                    state.storage = Some(fault.payload.clone());
                }
            }
        }

        state.panel_open = false;
        state.running = false;
        state.ripples = 0;
        state.focus = Focus::Body;

        let parsed = state.storage.as_deref().map(serde_json::from_str::<Value>);
        match parsed {
            None => {
                state.theme = String::new();
                state.time = "15".to_string();
            }
            Some(Ok(settings)) => {
                state.theme = settings["theme"].as_str().unwrap_or_default().to_string();
                state.time = settings["time"].as_str().unwrap_or("15").to_string();
            }
            Some(Err(e)) => {
                if self.bugs.crash_on_corrupt {
                    state.errors.push(format!("Uncaught SyntaxError: {}", e));
                }
                state.theme = if self.bugs.no_fallback {
                    "theme-undefined".to_string()
                } else {
                    String::new()
                };
                state.time = "15".to_string();
            }
        }

        if self.bugs.console_error_on_load {
            state.errors.push("Uncaught TypeError: pool is null".to_string());
        }
        if self.bugs.audio_crash && self.audio_blocked() {
            state
                .errors
                .push("Uncaught (in promise) NotSupportedError: no supported source".to_string());
        }
        Ok(())
    }

    fn persist(&self, state: &mut AppState) {
        let mut settings = json!({ "time": state.time });
        if !self.bugs.forget_theme {
            settings["theme"] = Value::String(state.theme.clone());
        }
        state.storage = Some(settings.to_string());
    }

    fn start_visible(&self, state: &AppState) -> bool {
        !state.running || self.bugs.both_controls
    }

    fn reset_visible(&self, state: &AppState) -> bool {
        state.running || self.bugs.both_controls
    }

    fn inert(&self, state: &AppState) -> bool {
        state.panel_open && !self.bugs.no_inert
    }

    fn element(&self, state: &AppState, selector: &str) -> Option<Element> {
        let app = &self.app;
        let open = state.panel_open;
        let inert = self.inert(state);

        if selector == app.settings_toggle {
            Some((TOGGLE, true, !self.bugs.settings_button_disabled, true))
        } else if selector == app.settings_panel {
            Some((PANEL, open, true, open))
        } else if selector == app.theme_option() {
            Some((THEME_OPTION, open, true, open))
        } else if selector == app.time_option() {
            Some((TIME_OPTION, open, true, open))
        } else if selector == app.start_control {
            let visible = self.start_visible(state);
            Some((CONTROL, visible, !inert, visible))
        } else if selector == app.reset_control {
            let visible = self.reset_visible(state);
            // Start sits on top when both are shown
            Some((CONTROL, visible, !inert, visible && !self.start_visible(state)))
        } else if selector == app.pool_surface
            || selector == app.timer_container
            || selector == app.main_region
        {
            Some((VIEWPORT, true, !inert, !open))
        } else if selector == app.timer_display {
            Some((DISPLAY, true, true, true))
        } else if selector == app.selected_time || selector == app.pattern_path {
            Some((DISPLAY, true, true, false))
        } else {
            None
        }
    }

    fn attribute_value(&self, state: &AppState, selector: &str, name: &str) -> Value {
        let app = &self.app;
        let value: Option<String> = if selector == app.settings_toggle {
            match name {
                "aria-label" if !self.bugs.missing_label => Some("Settings".into()),
                "aria-expanded" => Some(state.panel_open.to_string()),
                _ => None,
            }
        } else if selector == app.main_region && name == "inert" {
            self.inert(state).then(String::new)
        } else if selector == app.timer_container && !self.bugs.pool_not_focusable {
            match name {
                "role" => Some("button".into()),
                "tabindex" => Some("0".into()),
                _ => None,
            }
        } else if selector == app.selected_time && name == app.time_attribute {
            Some(state.time.clone())
        } else {
            None
        };
        value.map(Value::String).unwrap_or(Value::Null)
    }

    fn answer(&self, query: &Query) -> Result<Value, HarnessError> {
        let state = self.state.lock().unwrap();
        if state.closed {
            return Err(HarnessError::SessionClosed(self.id.clone()));
        }
        let app = &self.app;

        let value = match query {
            Query::Title if self.bugs.wrong_title => json!("Timer"),
            Query::Title => json!(TITLE),
            Query::BodyClass => json!(state.theme),
            Query::ClassList { selector } => {
                let mut classes = Vec::new();
                if *selector == app.settings_panel && state.panel_open {
                    classes.push(app.active_class.clone());
                }
                if *selector == app.timer_container && state.running {
                    classes.push(app.timer_active_class.clone());
                }
                match self.element(&state, selector) {
                    Some(_) => json!(classes),
                    None => Value::Null,
                }
            }
            Query::Attribute { selector, name } => self.attribute_value(&state, selector, name),
            Query::Text { selector } if *selector == app.timer_display => {
                if state.running && !self.bugs.frozen_timer {
                    json!("14:59")
                } else {
                    json!(app.default_timer_text)
                }
            }
            Query::Text { .. } => Value::Null,
            Query::Count { selector } if *selector == app.ripple => json!(state.ripples),
            Query::Count { selector } => json!(u64::from(self.element(&state, selector).is_some())),
            Query::Visible { selector } => {
                let visible = matches!(self.element(&state, selector), Some((_, true, _, _)));
                json!(visible)
            }
            Query::BoundingBox { selector } => match self.element(&state, selector) {
                Some((rect, ..)) => serde_json::to_value(rect).unwrap(),
                None => Value::Null,
            },
            Query::Actionability { selector } => match self.element(&state, selector) {
                Some((rect, visible, enabled, receives)) => {
                    let center = visible.then(|| rect.center());
                    json!({
                        "found": true,
                        "visible": visible,
                        "enabled": enabled,
                        "receives_pointer": receives,
                        "center": center,
                    })
                }
                None => json!({
                    "found": false,
                    "visible": false,
                    "enabled": false,
                    "receives_pointer": false,
                    "center": null,
                }),
            },
            Query::ActiveElement { within } => {
                let in_panel = *within == app.settings_panel;
                match &state.focus {
                    Focus::Body => json!({ "id": null, "inside": false }),
                    Focus::Outside(id) => json!({ "id": id, "inside": false }),
                    Focus::Panel(i) => json!({ "id": PANEL_FOCUSABLE[*i], "inside": in_panel }),
                }
            }
            Query::InlineStyle { selector, property }
                if *selector == app.pattern_path && property == "stroke-dashoffset" =>
            {
                let reduced = self.config.motion == MotionPreference::Reduced
                    && !self.bugs.animate_despite_reduced_motion;
                match (state.running, reduced) {
                    (true, true) => json!("0px"),
                    (true, false) => json!("240.5px"),
                    (false, _) => json!("1000px"),
                }
            }
            Query::InlineStyle { .. } => Value::Null,
            Query::FocusableCount { selector } if *selector == app.settings_panel => {
                json!(PANEL_FOCUSABLE.len())
            }
            Query::FocusableCount { .. } => json!(0),
        };
        Ok(value)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    fn id(&self) -> &str {
        &self.id
    }

    fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        if self.bugs.unreachable {
            return Err(HarnessError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        self.load()
    }

    async fn reload(&self) -> Result<(), HarnessError> {
        self.load()
    }

    async fn query(&self, query: &Query) -> Result<Value, HarnessError> {
        if self.bugs.hang_on_title && *query == Query::Title {
            std::future::pending::<()>().await;
        }
        self.answer(query)
    }

    async fn click_at(&self, point: Point) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(HarnessError::SessionClosed(self.id.clone()));
        }

        if state.panel_open {
            if contains(&PANEL, point) {
                if contains(&THEME_OPTION, point) {
                    if !self.bugs.theme_click_ignored {
                        state.theme = self.app.theme_choice.clone();
                    }
                } else if contains(&TIME_OPTION, point) {
                    state.time = self.app.time_choice.clone();
                } else {
                    return Ok(());
                }
                self.persist(&mut state);
                state.panel_open = false;
            } else if contains(&TOGGLE, point) || !self.bugs.outside_click_ignored {
                state.panel_open = false;
            }
            return Ok(());
        }

        if contains(&TOGGLE, point) {
            state.panel_open = true;
        } else if contains(&CONTROL, point) && self.start_visible(&state) {
            state.running = true;
        } else if contains(&CONTROL, point) && self.reset_visible(&state) {
            state.running = self.bugs.sticky_reset;
        } else if !(self.bugs.dead_zone && in_gap(point)) {
            state.ripples += 1;
        }
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(HarnessError::SessionClosed(self.id.clone()));
        }

        match key {
            "Escape" if state.panel_open && !self.bugs.escape_ignored => {
                state.panel_open = false;
                state.focus = Focus::Outside("settings-button".into());
            }
            "Tab" => {
                state.focus = match state.focus {
                    Focus::Panel(i) if i + 1 >= PANEL_FOCUSABLE.len() && self.bugs.focus_leak => {
                        Focus::Outside("start-button".into())
                    }
                    Focus::Panel(i) => Focus::Panel((i + 1) % PANEL_FOCUSABLE.len()),
                    _ => Focus::Outside("settings-button".into()),
                };
            }
            _ => {}
        }
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<bool, HarnessError> {
        let mut state = self.state.lock().unwrap();
        if selector == self.app.settings_panel && state.panel_open {
            state.focus = Focus::Panel(0);
            Ok(true)
        } else if selector == self.app.settings_toggle {
            state.focus = Focus::Outside("settings-button".into());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn script_errors(&self) -> Vec<String> {
        self.state.lock().unwrap().errors.clone()
    }

    async fn close(&self) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        if !state.closed {
            state.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Hands out `FakePage`s and counts session lifetimes
#[derive(Default)]
pub struct FakeProvider {
    bugs: Bugs,
    created: AtomicUsize,
    closes: Arc<AtomicUsize>,
    configs: Mutex<Vec<SessionConfig>>,
}

impl FakeProvider {
    pub fn new(bugs: Bugs) -> Self {
        Self {
            bugs,
            ..Self::default()
        }
    }

    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Configurations of every session created so far, in order
    pub fn configs(&self) -> Vec<SessionConfig> {
        self.configs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn PageDriver>, HarnessError> {
        if self.bugs.engine_down {
            return Err(HarnessError::EngineUnavailable(
                "Could not auto detect a chrome executable".to_string(),
            ));
        }

        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.configs.lock().unwrap().push(config.clone());
        Ok(Arc::new(FakePage::new(
            format!("{}-{}", config.label, n),
            config,
            self.bugs.clone(),
            self.closes.clone(),
        )))
    }
}
