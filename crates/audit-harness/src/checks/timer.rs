//! Timer start/reset behavior

use async_trait::async_trait;
use tracing::debug;

use super::{AuditCheck, CheckContext};
use crate::error::HarnessError;
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::query::PageQueries;

/// Start marks the timer active and counts down; reset clears the active state
pub struct TimerLifecycle;

#[async_trait]
impl AuditCheck for TimerLifecycle {
    fn name(&self) -> &str {
        "timer_lifecycle"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let app = ctx.app();
        let interactor = ctx.interactor()?;
        let poller = ctx.poller();
        let mut findings = FindingsCollector::new();

        let initial = page.text(&app.timer_display).await?.unwrap_or_default();
        interactor.click_selector(&app.start_control).await?;

        let active = || async move {
            page.has_class(&app.timer_container, &app.timer_active_class).await
        };

        if !poller.until(active).await?.is_satisfied() {
            findings.record(Severity::High, "Timer failed to start (UI state not updated).");
            return Ok(findings.into_findings());
        }

        let initial_ref = initial.as_str();
        let ticked = poller
            .with_timeout(ctx.config.checks.countdown_timeout)
            .until(|| async move {
                let text = page.text(&app.timer_display).await?.unwrap_or_default();
                Ok(text != initial_ref)
            })
            .await?;
        if !ticked.is_satisfied() {
            findings.record(Severity::High, "Timer not counting down.");
        }

        interactor.click_selector(&app.reset_control).await?;
        let reset = poller
            .until(|| async move { Ok(!active().await?) })
            .await?;
        if !reset.is_satisfied() {
            findings.record(Severity::Medium, "Timer failed to reset (UI state).");
        }

        Ok(findings.into_findings())
    }
}

/// Interleaved start/reset clicks leave exactly one of the two controls visible
pub struct RapidToggle;

#[async_trait]
impl AuditCheck for RapidToggle {
    fn name(&self) -> &str {
        "rapid_toggle"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let app = ctx.app();
        let poller = ctx.poller();
        let rounds = ctx.config.checks.rapid_toggle_rounds;

        for round in 1..=rounds {
            // Click whichever control is actionable right now, without waiting
            let start = page.probe(&app.start_control).await?;
            let target = if start.is_actionable() {
                start.center
            } else {
                let reset = page.probe(&app.reset_control).await?;
                reset.is_actionable().then_some(reset.center).flatten()
            };

            match target {
                Some(point) => page.click_at(point).await?,
                None => debug!("Round {}: neither control actionable", round),
            }
        }

        let settled = poller
            .until(|| async move {
                let start = page.is_visible(&app.start_control).await?;
                let reset = page.is_visible(&app.reset_control).await?;
                Ok(start != reset)
            })
            .await?;
        if settled.is_satisfied() {
            return Ok(Vec::new());
        }

        let start = page.is_visible(&app.start_control).await?;
        let message = if start {
            "UI State Inconsistent: Both Start and Reset buttons visible."
        } else {
            "UI State Inconsistent: Neither Start nor Reset buttons visible."
        };
        Ok(vec![Finding::new(Severity::High, message)])
    }
}
