//! Baseline checks run right after the page loads

use async_trait::async_trait;
use tracing::debug;

use super::{AuditCheck, CheckContext};
use crate::error::HarnessError;
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::query::PageQueries;

/// No script errors during load and the expected document title
pub struct PageLoad;

#[async_trait]
impl AuditCheck for PageLoad {
    fn name(&self) -> &str {
        "page_load"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let mut findings = FindingsCollector::new();

        let errors = page.script_errors().await;
        if !errors.is_empty() {
            findings.record(
                Severity::High,
                format!("Console errors detected on load: {}", errors.join("; ")),
            );
        }

        let title = page.title().await?;
        if !title.contains(&ctx.app().expected_title) {
            findings.record(Severity::Medium, format!("Title incorrect: {}", title));
        }

        Ok(findings.into_findings())
    }
}

/// Timer display shows the default duration before any interaction
pub struct InitialTimer;

#[async_trait]
impl AuditCheck for InitialTimer {
    fn name(&self) -> &str {
        "initial_timer"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let app = ctx.app();

        let shown = ctx
            .poller()
            .until(|| async move {
                let text = page.text(&app.timer_display).await?;
                Ok(text.as_deref().map(str::trim) == Some(app.default_timer_text.as_str()))
            })
            .await?;

        if shown.is_satisfied() {
            return Ok(Vec::new());
        }

        let text = page.text(&app.timer_display).await?.unwrap_or_default();
        Ok(vec![Finding::new(
            Severity::Medium,
            format!(
                "Initial timer display is '{}' (expected {})",
                text.trim(),
                app.default_timer_text
            ),
        )])
    }
}

/// A click in the gap just above the start control must reach the pool
pub struct DeadZone;

/// Distance above the start control's top edge that is probed
const GAP_OFFSET: f64 = 10.0;

#[async_trait]
impl AuditCheck for DeadZone {
    fn name(&self) -> &str {
        "dead_zone"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let app = ctx.app();

        let Some(start) = page.bounding_box(&app.start_control).await? else {
            return Ok(vec![Finding::new(
                Severity::High,
                format!("Dead Zone: start control {} not found", app.start_control),
            )]);
        };

        let baseline = page.count(&app.ripple).await?;
        let probe = start.center().offset(0.0, -(start.height / 2.0 + GAP_OFFSET));
        debug!("Probing gap at ({}, {}), {} ripples before", probe.x, probe.y, baseline);

        // Raw coordinates: the gap itself is not an interactive element
        page.click_at(probe).await?;

        let rippled = ctx
            .poller()
            .until(|| async move { Ok(page.count(&app.ripple).await? > baseline) })
            .await?;

        if rippled.is_satisfied() {
            Ok(Vec::new())
        } else {
            Ok(vec![Finding::new(
                Severity::High,
                "Dead Zone Detected: Clicks on control gaps do not trigger pool interaction.",
            )])
        }
    }
}
