//! Settings panel accessibility and containment

use async_trait::async_trait;
use tracing::debug;

use super::{open_settings, AuditCheck, CheckContext};
use crate::error::HarnessError;
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::query::{PageQueries, Point};

fn panel_did_not_open(ctx: &CheckContext) -> Finding {
    Finding::new(
        Severity::High,
        format!(
            "Settings panel {} did not open after clicking {}",
            ctx.app().settings_panel,
            ctx.app().settings_toggle
        ),
    )
}

/// The settings toggle carries an accessible name
pub struct SettingsLabel;

#[async_trait]
impl AuditCheck for SettingsLabel {
    fn name(&self) -> &str {
        "settings_label"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let label = ctx
            .page()?
            .attribute(&ctx.app().settings_toggle, "aria-label")
            .await?;

        match label {
            Some(label) if !label.trim().is_empty() => Ok(Vec::new()),
            _ => Ok(vec![Finding::new(
                Severity::Low,
                "Accessibility: Settings button missing aria-label.",
            )]),
        }
    }
}

/// The interactive pool exposes a role and is keyboard reachable
pub struct PoolAccessibility;

#[async_trait]
impl AuditCheck for PoolAccessibility {
    fn name(&self) -> &str {
        "pool_accessibility"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let pool = &ctx.app().timer_container;
        let mut findings = FindingsCollector::new();

        if page.attribute(pool, "role").await?.is_none() {
            findings.record(
                Severity::Low,
                format!("Accessibility: {} has no role attribute.", pool),
            );
        }
        if page.attribute(pool, "tabindex").await?.is_none() {
            findings.record(
                Severity::Low,
                format!("Accessibility: {} is not keyboard focusable (no tabindex).", pool),
            );
        }

        Ok(findings.into_findings())
    }
}

/// The main region is marked inert while the panel is open
pub struct InertContainment;

#[async_trait]
impl AuditCheck for InertContainment {
    fn name(&self) -> &str {
        "inert_containment"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        if !open_settings(ctx).await? {
            return Ok(vec![panel_did_not_open(ctx)]);
        }

        let page = ctx.page()?;
        let main = &ctx.app().main_region;
        let marked = ctx
            .poller()
            .until(|| async move { Ok(page.attribute(main, "inert").await?.is_some()) })
            .await?;

        if marked.is_satisfied() {
            Ok(Vec::new())
        } else {
            Ok(vec![Finding::new(
                Severity::Low,
                "Accessibility: Main content not marked 'inert' when settings open.",
            )])
        }
    }
}

/// Clicking outside the open panel, at raw coordinates on the pool.
///
/// Two readings of the product exist: the panel is dismissed by an outside
/// click, or it is modal and ignores it. Each reading is its own check.
pub struct OutsideClick {
    expect_close: bool,
}

impl OutsideClick {
    pub fn closes() -> Self {
        Self { expect_close: true }
    }

    pub fn blocked() -> Self {
        Self {
            expect_close: false,
        }
    }
}

/// Offset into the pool surface from its top-left corner
const POOL_INSET: f64 = 10.0;

#[async_trait]
impl AuditCheck for OutsideClick {
    fn name(&self) -> &str {
        if self.expect_close {
            "outside_click_closes"
        } else {
            "outside_click_blocked"
        }
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        if !open_settings(ctx).await? {
            return Ok(vec![panel_did_not_open(ctx)]);
        }

        let page = ctx.page()?;
        let app = ctx.app();
        let Some(pool) = page.bounding_box(&app.pool_surface).await? else {
            return Ok(vec![Finding::new(
                Severity::High,
                format!("Pool surface {} not found", app.pool_surface),
            )]);
        };

        let target = Point::new(pool.x + POOL_INSET, pool.y + POOL_INSET);
        debug!("Clicking outside the panel at ({}, {})", target.x, target.y);
        page.click_at(target).await?;

        let closed = || async move {
            Ok::<_, HarnessError>(!page.has_class(&app.settings_panel, &app.active_class).await?)
        };

        if self.expect_close {
            if ctx.poller().until(closed).await?.is_satisfied() {
                return Ok(Vec::new());
            }
            Ok(vec![Finding::new(
                Severity::High,
                "UX: Cannot close Settings by clicking outside (likely due to inert attribute blocking interactions).",
            )])
        } else {
            if ctx.poller().never(closed).await? {
                return Ok(Vec::new());
            }
            Ok(vec![Finding::new(
                Severity::High,
                "Containment: Settings closed on an outside click while the background is inert.",
            )])
        }
    }
}

/// Escape dismisses the panel and the toggle reports its expanded state
pub struct EscapeCloses;

#[async_trait]
impl AuditCheck for EscapeCloses {
    fn name(&self) -> &str {
        "escape_closes"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        if !open_settings(ctx).await? {
            return Ok(vec![panel_did_not_open(ctx)]);
        }

        let page = ctx.page()?;
        let app = ctx.app();
        let poller = ctx.poller();
        let mut findings = FindingsCollector::new();

        let expanded_is = |expected: &'static str| async move {
            let value = page.attribute(&app.settings_toggle, "aria-expanded").await?;
            Ok::<_, HarnessError>(value.as_deref() == Some(expected))
        };

        if !poller.until(|| expanded_is("true")).await?.is_satisfied() {
            findings.record(
                Severity::Low,
                "Accessibility: Settings button aria-expanded is not 'true' while the panel is open.",
            );
        }

        ctx.interactor()?.press_key("Escape").await?;

        let closed = poller
            .until(|| async move {
                Ok(!page.has_class(&app.settings_panel, &app.active_class).await?)
            })
            .await?;
        if !closed.is_satisfied() {
            findings.record(Severity::Medium, "Escape key did not close the settings panel.");
            return Ok(findings.into_findings());
        }

        if !poller.until(|| expanded_is("false")).await?.is_satisfied() {
            findings.record(
                Severity::Low,
                "Accessibility: Settings button aria-expanded is not 'false' after closing.",
            );
        }

        Ok(findings.into_findings())
    }
}

/// Repeated Tab presses never move focus out of the open panel
pub struct FocusTrap;

#[async_trait]
impl AuditCheck for FocusTrap {
    fn name(&self) -> &str {
        "focus_trap"
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        if !open_settings(ctx).await? {
            return Ok(vec![panel_did_not_open(ctx)]);
        }

        let page = ctx.page()?;
        let panel = &ctx.app().settings_panel;
        let interactor = ctx.interactor()?;
        interactor.focus(panel).await?;

        let focusable = page.focusable_count(panel).await?;
        let presses = focusable.max(u64::from(ctx.config.checks.focus_tab_presses));
        debug!("Pressing Tab {} times ({} focusable in panel)", presses, focusable);

        for press in 1..=presses {
            interactor.press_key("Tab").await?;
            let focus = page.focus_state(panel).await?;
            if !focus.inside {
                let escaped_to = focus.id.unwrap_or_else(|| "document body".to_string());
                return Ok(vec![Finding::new(
                    Severity::High,
                    format!(
                        "Focus Trap Failed: Focus escaped to {} after {} Tab presses",
                        escaped_to, press
                    ),
                )]);
            }
        }

        Ok(Vec::new())
    }
}
