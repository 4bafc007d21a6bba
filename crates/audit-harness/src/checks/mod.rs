//! Built-in audit checks
//!
//! Each check is an [`AuditCheck`]: it declares the isolation it needs, runs
//! against the page the runner hands it, and returns the findings it
//! detected. Checks never catch their own infrastructure errors; those are
//! returned and turned into findings by the runner.
//!
//! | id | isolation |
//! |---|---|
//! | `page_load`, `initial_timer`, `dead_zone` | shared |
//! | `settings_label`, `pool_accessibility`, `inert_containment` | shared |
//! | `outside_click_closes`, `outside_click_blocked`, `escape_closes`, `focus_trap` | shared |
//! | `timer_lifecycle`, `rapid_toggle` | shared |
//! | `persistence`, `reduced_motion`, `storage_corruption`, `audio_fault` | dedicated |
//! | `contrast` | standalone |

pub mod contrast;
pub mod load;
pub mod resilience;
pub mod scripted;
pub mod settings;
pub mod timer;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{AppContract, AuditConfig};
use crate::error::HarnessError;
use crate::faults::FaultSpec;
use crate::findings::{Finding, Severity};
use crate::interaction::Interactor;
use crate::poller::Poller;
use crate::query::PageQueries;
use crate::session::PageDriver;

/// Where a check runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// No browser session at all
    Standalone,
    /// The run's shared session, re-navigated to the baseline first
    Shared,
    /// A fresh session prepared with these faults, closed afterwards
    Dedicated(Vec<FaultSpec>),
}

/// What a check gets to work with
pub struct CheckContext {
    pub config: Arc<AuditConfig>,
    pub page: Option<Arc<dyn PageDriver>>,
}

impl CheckContext {
    pub fn new(config: Arc<AuditConfig>, page: Option<Arc<dyn PageDriver>>) -> Self {
        Self { config, page }
    }

    pub fn app(&self) -> &AppContract {
        &self.config.app
    }

    /// The session; standalone checks have none
    pub fn page(&self) -> Result<&dyn PageDriver, HarnessError> {
        self.page
            .as_deref()
            .ok_or_else(|| HarnessError::SessionClosed("no session attached".to_string()))
    }

    pub fn interactor(&self) -> Result<Interactor<'_>, HarnessError> {
        let timing = &self.config.timing;
        Ok(Interactor::new(
            self.page()?,
            timing.actionability_timeout,
            timing.poll_interval,
        ))
    }

    /// Poller bounded by the assertion timeout
    pub fn poller(&self) -> Poller {
        let timing = &self.config.timing;
        Poller::new(timing.assertion_timeout, timing.poll_interval)
    }
}

#[async_trait]
pub trait AuditCheck: Send + Sync {
    /// Stable identifier used in config and reports
    fn name(&self) -> &str;

    fn isolation(&self, _config: &AuditConfig) -> Isolation {
        Isolation::Shared
    }

    /// Severity recorded when an element this check needs never becomes actionable
    fn actionability_severity(&self) -> Severity {
        Severity::High
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError>;
}

/// Every built-in check in catalogue order, enabled or not
pub fn catalogue() -> Vec<Box<dyn AuditCheck>> {
    vec![
        Box::new(load::PageLoad),
        Box::new(load::InitialTimer),
        Box::new(load::DeadZone),
        Box::new(settings::SettingsLabel),
        Box::new(settings::PoolAccessibility),
        Box::new(settings::InertContainment),
        Box::new(settings::OutsideClick::closes()),
        Box::new(settings::OutsideClick::blocked()),
        Box::new(settings::EscapeCloses),
        Box::new(settings::FocusTrap),
        Box::new(timer::TimerLifecycle),
        Box::new(timer::RapidToggle),
        Box::new(resilience::Persistence),
        Box::new(resilience::ReducedMotion),
        Box::new(resilience::StorageCorruption),
        Box::new(resilience::AudioFault),
        Box::new(contrast::ContrastCheck),
    ]
}

/// Enabled built-in checks followed by the configured scenarios
pub fn from_config(config: &AuditConfig) -> Vec<Box<dyn AuditCheck>> {
    let mut checks: Vec<Box<dyn AuditCheck>> = catalogue()
        .into_iter()
        .filter(|check| config.is_enabled(check.name()))
        .collect();

    checks.extend(
        config
            .scenarios
            .iter()
            .cloned()
            .map(|scenario| {
                Box::new(scripted::ScriptedCheck::new(scenario)) as Box<dyn AuditCheck>
            }),
    );
    checks
}

/// Open the settings panel and wait for its active class.
///
/// Returns `false` when the panel never opened.
pub(crate) async fn open_settings(ctx: &CheckContext) -> Result<bool, HarnessError> {
    let page = ctx.page()?;
    let app = ctx.app();

    if page.has_class(&app.settings_panel, &app.active_class).await? {
        return Ok(true);
    }
    ctx.interactor()?.click_selector(&app.settings_toggle).await?;

    let opened = ctx
        .poller()
        .until(|| page.has_class(&app.settings_panel, &app.active_class))
        .await?;
    Ok(opened.is_satisfied())
}
