//! Synthetic user interaction
//!
//! Element-targeted actions wait, up to the actionability timeout, for the
//! element to be attached, visible, enabled and the hit target at its own
//! center. Running out of time is reported as
//! [`HarnessError::NotActionable`], distinct from an assertion that fails
//! after the action went through.
//!
//! Coordinate clicks skip that wait on purpose: they are how a check asks
//! "what receives a click at this point?", including points covered by an
//! overlay that is not itself interactive.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::HarnessError;
use crate::poller::{wait_for, Poller};
use crate::query::{ElementProbe, PageQueries, Point};
use crate::session::PageDriver;

/// What an action is aimed at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Locator { selector: String },
    Point { x: f64, y: f64 },
}

impl Target {
    pub fn locator(selector: impl Into<String>) -> Self {
        Target::Locator {
            selector: selector.into(),
        }
    }

    pub fn point(point: Point) -> Self {
        Target::Point {
            x: point.x,
            y: point.y,
        }
    }
}

/// Kind of interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Click(Target),
    KeyPress(String),
    Focus(String),
}

/// One action, optionally gated on an element being visible first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionStep {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_visible: Option<String>,
}

impl InteractionStep {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            expect_visible: None,
        }
    }

    pub fn after_visible(mut self, selector: impl Into<String>) -> Self {
        self.expect_visible = Some(selector.into());
        self
    }
}

/// An ordered sequence of interaction steps
pub type Scenario = Vec<InteractionStep>;

/// Drives one page
pub struct Interactor<'a> {
    page: &'a dyn PageDriver,
    actionability_timeout: Duration,
    poll_interval: Duration,
}

impl<'a> Interactor<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        actionability_timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            page,
            actionability_timeout,
            poll_interval,
        }
    }

    pub fn from_poller(page: &'a dyn PageDriver, actionability: Poller) -> Self {
        Self::new(page, actionability.timeout, actionability.interval)
    }

    /// Wait for `selector` to become actionable and return its last probe
    pub async fn wait_actionable(&self, selector: &str) -> Result<ElementProbe, HarnessError> {
        self.wait_until(selector, ElementProbe::is_actionable).await
    }

    async fn wait_until(
        &self,
        selector: &str,
        ready: fn(&ElementProbe) -> bool,
    ) -> Result<ElementProbe, HarnessError> {
        let page = self.page;
        let latest = Mutex::new(ElementProbe::missing());
        let slot = &latest;

        let outcome = wait_for(
            || async move {
                let probe = page.probe(selector).await?;
                let ok = ready(&probe);
                if let Ok(mut guard) = slot.lock() {
                    *guard = probe;
                }
                Ok(ok)
            },
            self.actionability_timeout,
            self.poll_interval,
        )
        .await?;

        let last = latest.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        if outcome.is_satisfied() {
            Ok(last)
        } else {
            debug!(
                "Element {} not actionable: {}",
                selector,
                last.blocker().unwrap_or("unknown")
            );
            Err(HarnessError::NotActionable {
                selector: selector.to_string(),
                waited: self.actionability_timeout,
            })
        }
    }

    /// Click an element once actionable, or raw coordinates immediately
    #[instrument(skip(self))]
    pub async fn click(&self, target: &Target) -> Result<(), HarnessError> {
        match target {
            Target::Locator { selector } => {
                let probe = self.wait_actionable(selector).await?;
                let center = probe.center.ok_or_else(|| HarnessError::NotActionable {
                    selector: selector.clone(),
                    waited: self.actionability_timeout,
                })?;
                self.page.click_at(center).await
            }
            Target::Point { x, y } => self.page.click_at(Point::new(*x, *y)).await,
        }
    }

    pub async fn click_selector(&self, selector: &str) -> Result<(), HarnessError> {
        self.click(&Target::locator(selector)).await
    }

    #[instrument(skip(self))]
    pub async fn press_key(&self, key: &str) -> Result<(), HarnessError> {
        self.page.press_key(key).await
    }

    /// Focus an element once it is attached and visible
    #[instrument(skip(self))]
    pub async fn focus(&self, selector: &str) -> Result<(), HarnessError> {
        self.wait_until(selector, |p| p.found && p.visible).await?;
        if self.page.focus(selector).await? {
            Ok(())
        } else {
            Err(HarnessError::NotActionable {
                selector: selector.to_string(),
                waited: self.actionability_timeout,
            })
        }
    }

    pub async fn perform(&self, step: &InteractionStep) -> Result<(), HarnessError> {
        if let Some(selector) = &step.expect_visible {
            self.wait_until(selector, |p| p.found && p.visible).await?;
        }
        match &step.action {
            Action::Click(target) => self.click(target).await,
            Action::KeyPress(key) => self.press_key(key).await,
            Action::Focus(selector) => self.focus(selector).await,
        }
    }

    /// Execute steps in order, stopping at the first failure
    pub async fn perform_all(&self, scenario: &[InteractionStep]) -> Result<(), HarnessError> {
        for step in scenario {
            self.perform(step).await?;
        }
        Ok(())
    }
}
