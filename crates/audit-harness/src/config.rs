//! Configuration parsing for audit runs
//!
//! This module provides TOML-based configuration describing the application
//! under test (its DOM contract), timing bounds, fault payloads, which checks
//! to run, the contrast palette, and optional scripted scenarios.
//!
//! Every section has defaults matching the audited app, so a minimal file only
//! needs `[audit]` with a `base_url`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::contrast::{default_palette, ColorPair, DEFAULT_THRESHOLD};
use crate::faults::FaultSpec;
use crate::findings::Severity;
use crate::session::Viewport;

/// Main configuration structure loaded from TOML files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Target and session defaults
    pub audit: AuditSection,
    /// Timeouts and poll cadence
    #[serde(default)]
    pub timing: TimingConfig,
    /// DOM contract of the application under test
    #[serde(default)]
    pub app: AppContract,
    /// Fault payloads
    #[serde(default)]
    pub faults: FaultsConfig,
    /// Check selection and tuning
    #[serde(default)]
    pub checks: ChecksConfig,
    /// Color palette evaluated by the contrast check
    #[serde(default)]
    pub contrast: ContrastConfig,
    /// Scripted scenarios run after the built-in checks
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

impl AuditConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The TOML is malformed
    /// - Required fields are missing or a palette color is not a valid hex triplet
    ///
    /// # Example
    ///
    /// ```no_run
    /// use audit_harness::config::AuditConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let config = AuditConfig::from_file("audit.toml")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Example
    ///
    /// ```
    /// use audit_harness::config::AuditConfig;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let toml = r#"
    ///     [audit]
    ///     name = "Smoke"
    ///     base_url = "http://localhost:8000"
    /// "#;
    /// let config = AuditConfig::parse(toml)?;
    /// assert_eq!(config.timing.poll_interval.as_millis(), 50);
    /// # Ok(())
    /// # }
    /// ```
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Configuration pointing at `base_url` with every other value defaulted
    pub fn for_url(base_url: impl Into<String>) -> Self {
        Self {
            audit: AuditSection {
                name: default_name(),
                base_url: base_url.into(),
                viewport: Viewport::default(),
            },
            timing: TimingConfig::default(),
            app: AppContract::default(),
            faults: FaultsConfig::default(),
            checks: ChecksConfig::default(),
            contrast: ContrastConfig::default(),
            scenarios: Vec::new(),
        }
    }

    /// Whether a built-in check id is selected for this run
    pub fn is_enabled(&self, check: &str) -> bool {
        self.checks.enabled.iter().any(|c| c == check)
    }
}

/// Target application and session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSection {
    /// Name of the audit suite
    #[serde(default = "default_name")]
    pub name: String,
    /// URL of the running front-end
    pub base_url: String,
    /// Viewport used by every session
    #[serde(default)]
    pub viewport: Viewport,
}

fn default_name() -> String {
    "UI audit".to_string()
}

/// Upper bounds for every kind of wait
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Page load bound (default: 15000ms)
    #[serde(default = "default_navigation", with = "duration_ms")]
    pub navigation_timeout: Duration,
    /// How long an element may take to become actionable (default: 2000ms)
    #[serde(default = "default_actionability", with = "duration_ms")]
    pub actionability_timeout: Duration,
    /// Default bound for state assertions (default: 2000ms)
    #[serde(default = "default_assertion", with = "duration_ms")]
    pub assertion_timeout: Duration,
    /// Cadence of predicate sampling (default: 50ms)
    #[serde(default = "default_poll_interval", with = "duration_ms")]
    pub poll_interval: Duration,
    /// Deadline wrapping all of a single check's work (default: 30000ms)
    #[serde(default = "default_check_budget", with = "duration_ms")]
    pub check_budget: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: default_navigation(),
            actionability_timeout: default_actionability(),
            assertion_timeout: default_assertion(),
            poll_interval: default_poll_interval(),
            check_budget: default_check_budget(),
        }
    }
}

fn default_navigation() -> Duration {
    Duration::from_millis(15_000)
}

fn default_actionability() -> Duration {
    Duration::from_millis(2_000)
}

fn default_assertion() -> Duration {
    Duration::from_millis(2_000)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_check_budget() -> Duration {
    Duration::from_millis(30_000)
}

/// Element identifiers and state semantics the harness relies on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppContract {
    pub settings_toggle: String,
    pub settings_panel: String,
    /// Class present on the panel while it is open
    pub active_class: String,
    pub start_control: String,
    pub reset_control: String,
    pub timer_display: String,
    /// Element that receives `timer_active_class` while the countdown runs
    pub timer_container: String,
    pub timer_active_class: String,
    /// Clickable surface that spawns ripples
    pub pool_surface: String,
    pub ripple: String,
    /// Animated reveal elements drawn while the timer runs
    pub pattern_path: String,
    /// Region marked `inert` while the panel is open
    pub main_region: String,
    /// Attribute tagging theme choices, e.g. `data-theme="theme-sunrise"`
    pub theme_attribute: String,
    /// Attribute tagging duration choices, e.g. `data-time="25"`
    pub time_attribute: String,
    /// Currently selected duration choice
    pub selected_time: String,
    /// localStorage key holding persisted settings
    pub storage_key: String,
    /// Substring the document title must contain
    pub expected_title: String,
    /// Timer text shown before any interaction
    pub default_timer_text: String,
    /// Theme selected by the persistence check
    pub theme_choice: String,
    /// Duration selected by the persistence check
    pub time_choice: String,
}

impl Default for AppContract {
    fn default() -> Self {
        Self {
            settings_toggle: "#settings-button".to_string(),
            settings_panel: "#settings-menu".to_string(),
            active_class: "active".to_string(),
            start_control: "#start-button".to_string(),
            reset_control: "#reset-button".to_string(),
            timer_display: "#timer-display".to_string(),
            timer_container: "#pool-container".to_string(),
            timer_active_class: "timer-active".to_string(),
            pool_surface: "#pool-surface".to_string(),
            ripple: ".ripple".to_string(),
            pattern_path: "#pattern-container path".to_string(),
            main_region: "main".to_string(),
            theme_attribute: "data-theme".to_string(),
            time_attribute: "data-time".to_string(),
            selected_time: "#time-options .selected".to_string(),
            storage_key: "kensho-settings".to_string(),
            expected_title: "Kenshō".to_string(),
            default_timer_text: "15:00".to_string(),
            theme_choice: "theme-sunrise".to_string(),
            time_choice: "25".to_string(),
        }
    }
}

impl AppContract {
    /// Selector of the option tagged `attribute="value"`
    pub fn option_selector(attribute: &str, value: &str) -> String {
        format!("[{}='{}']", attribute, value)
    }

    pub fn theme_option(&self) -> String {
        Self::option_selector(&self.theme_attribute, &self.theme_choice)
    }

    pub fn time_option(&self) -> String {
        Self::option_selector(&self.time_attribute, &self.time_choice)
    }
}

/// Payloads used by the fault-injecting checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultsConfig {
    /// Syntactically invalid value written under the storage key
    pub corrupt_payload: String,
    /// URL pattern of audio resources to abort
    pub audio_pattern: String,
}

impl Default for FaultsConfig {
    fn default() -> Self {
        Self {
            corrupt_payload: "{garbage_json: true".to_string(),
            audio_pattern: "*.mp3".to_string(),
        }
    }
}

/// Built-in check ids enabled by default
pub const DEFAULT_CHECKS: &[&str] = &[
    "page_load",
    "initial_timer",
    "dead_zone",
    "settings_label",
    "pool_accessibility",
    "inert_containment",
    "outside_click_closes",
    "escape_closes",
    "focus_trap",
    "timer_lifecycle",
    "rapid_toggle",
    "persistence",
    "reduced_motion",
    "storage_corruption",
    "audio_fault",
    "contrast",
];

/// Check selection and tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Ids of the built-in checks to run, in catalogue order
    pub enabled: Vec<String>,
    /// Minimum Tab presses while the panel is open
    pub focus_tab_presses: u32,
    /// Start/reset rounds of the rapid toggle check
    pub rapid_toggle_rounds: u32,
    /// How long the countdown may take to show its first tick
    #[serde(with = "duration_ms")]
    pub countdown_timeout: Duration,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_CHECKS.iter().map(|c| c.to_string()).collect(),
            focus_tab_presses: 20,
            rapid_toggle_rounds: 10,
            countdown_timeout: Duration::from_millis(3_000),
        }
    }
}

/// Palette and threshold for the contrast check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContrastConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_palette")]
    pub pairs: Vec<ColorPair>,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            pairs: default_palette(),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

/// A config-defined check: faults, interaction steps, then expectations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Name of the scenario
    pub name: String,
    /// Severity of each unmet expectation
    #[serde(default = "default_scenario_severity")]
    pub severity: Severity,
    /// Run in a fresh session even without faults
    #[serde(default)]
    pub dedicated: bool,
    /// Faults applied to a dedicated session before navigation
    #[serde(default)]
    pub faults: Vec<FaultSpec>,
    /// Steps to execute in sequence
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
    /// State that must eventually hold once the steps ran
    #[serde(default)]
    pub expect: Vec<Expectation>,
}

impl ScenarioConfig {
    pub fn is_dedicated(&self) -> bool {
        self.dedicated || !self.faults.is_empty()
    }
}

fn default_scenario_severity() -> Severity {
    Severity::Medium
}

/// Individual step of a scripted scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptStep {
    /// Click an element once it is actionable
    Click {
        selector: String,
        #[serde(default)]
        expect_visible: Option<String>,
    },
    /// Click raw viewport coordinates, no actionability wait
    ClickAt {
        x: f64,
        y: f64,
        #[serde(default)]
        expect_visible: Option<String>,
    },
    /// Press a key on whatever currently has focus
    PressKey { key: String },
    /// Focus an element
    Focus { selector: String },
    /// Reload the page, keeping storage
    Reload,
}

/// Observable state a scripted scenario expects
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "expect", rename_all = "snake_case")]
pub enum Expectation {
    HasClass { selector: String, class: String },
    LacksClass { selector: String, class: String },
    TextEquals { selector: String, text: String },
    Visible { selector: String },
    Hidden { selector: String },
    AttributeEquals {
        selector: String,
        name: String,
        value: String,
    },
    NoScriptErrors,
}

/// Serde module for serializing/deserializing Duration as milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
