//! Checks that need a session of their own: persisted settings and faults

use async_trait::async_trait;
use tracing::debug;

use super::{open_settings, AuditCheck, CheckContext, Isolation};
use crate::config::AuditConfig;
use crate::error::HarnessError;
use crate::faults::FaultSpec;
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::query::PageQueries;

/// Chosen theme and duration survive a reload
pub struct Persistence;

#[async_trait]
impl AuditCheck for Persistence {
    fn name(&self) -> &str {
        "persistence"
    }

    fn isolation(&self, _config: &AuditConfig) -> Isolation {
        // Fresh storage, no faults
        Isolation::Dedicated(Vec::new())
    }

    fn actionability_severity(&self) -> Severity {
        Severity::Medium
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let app = ctx.app();
        let interactor = ctx.interactor()?;
        let poller = ctx.poller();
        let mut findings = FindingsCollector::new();

        // Choosing an option closes the panel, so reopen it for each choice
        for option in [app.theme_option(), app.time_option()] {
            if !open_settings(ctx).await? {
                findings.record(
                    Severity::Medium,
                    format!("Settings panel did not open to select {}", option),
                );
                return Ok(findings.into_findings());
            }
            interactor.click_selector(&option).await?;
        }

        let theme = app.theme_choice.as_str();
        let theme_applied = || async move {
            let classes = page.body_class().await?;
            Ok::<_, HarnessError>(classes.split_whitespace().any(|c| c == theme))
        };
        if !poller.until(theme_applied).await?.is_satisfied() {
            findings.record(
                Severity::Medium,
                format!("Theme selection did not apply: body never gained {}", theme),
            );
            return Ok(findings.into_findings());
        }

        debug!("Reloading to verify persisted settings");
        page.reload().await?;

        if !poller.until(theme_applied).await?.is_satisfied() {
            findings.record(
                Severity::Medium,
                "Settings Persistence Failed: Theme did not persist.",
            );
        }

        let time_persisted = poller
            .until(|| async move {
                let selected = page.attribute(&app.selected_time, &app.time_attribute).await?;
                Ok(selected.as_deref() == Some(app.time_choice.as_str()))
            })
            .await?;
        if !time_persisted.is_satisfied() {
            findings.record(
                Severity::Medium,
                "Settings Persistence Failed: Time did not persist.",
            );
        }

        Ok(findings.into_findings())
    }
}

/// With reduced motion the pattern is drawn fully, without animation
pub struct ReducedMotion;

#[async_trait]
impl AuditCheck for ReducedMotion {
    fn name(&self) -> &str {
        "reduced_motion"
    }

    fn isolation(&self, _config: &AuditConfig) -> Isolation {
        Isolation::Dedicated(vec![FaultSpec::ReducedMotion])
    }

    fn actionability_severity(&self) -> Severity {
        Severity::Medium
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let app = ctx.app();

        ctx.interactor()?.click_selector(&app.start_control).await?;

        let path = app.pattern_path.as_str();
        let revealed = ctx
            .poller()
            .until(|| async move {
                let offset = page.inline_style(path, "stroke-dashoffset").await?;
                Ok(matches!(offset.as_deref(), Some("0") | Some("0px")))
            })
            .await?;
        if revealed.is_satisfied() {
            return Ok(Vec::new());
        }

        let offset = page
            .inline_style(path, "stroke-dashoffset")
            .await?
            .unwrap_or_else(|| "missing".to_string());
        Ok(vec![Finding::new(
            Severity::Medium,
            format!("Reduced Motion Failed: StrokeDashOffset is {} (expected 0).", offset),
        )])
    }
}

/// Malformed persisted settings fall back to defaults without crashing
pub struct StorageCorruption;

#[async_trait]
impl AuditCheck for StorageCorruption {
    fn name(&self) -> &str {
        "storage_corruption"
    }

    fn isolation(&self, config: &AuditConfig) -> Isolation {
        Isolation::Dedicated(vec![FaultSpec::CorruptStorage {
            key: config.app.storage_key.clone(),
            payload: config.faults.corrupt_payload.clone(),
        }])
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let mut findings = FindingsCollector::new();

        let errors = page.script_errors().await;
        if !errors.is_empty() {
            findings.record(
                Severity::High,
                format!("App crashed on invalid LocalStorage: {}", errors.join("; ")),
            );
        }

        let theme = page.body_class().await?;
        if !theme.trim().is_empty() {
            findings.record(
                Severity::Medium,
                "LocalStorage Corruption: App did not fallback to default theme on invalid JSON.",
            );
        }

        Ok(findings.into_findings())
    }
}

/// Failing audio requests leave the app interactive and error-free
pub struct AudioFault;

#[async_trait]
impl AuditCheck for AudioFault {
    fn name(&self) -> &str {
        "audio_fault"
    }

    fn isolation(&self, config: &AuditConfig) -> Isolation {
        Isolation::Dedicated(vec![FaultSpec::BlockNetwork {
            pattern: config.faults.audio_pattern.clone(),
        }])
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let mut findings = FindingsCollector::new();

        if !open_settings(ctx).await? {
            findings.record(
                Severity::High,
                "UI Not Interactive (Likely Crash): settings panel did not open with audio unavailable.",
            );
        }

        // Give late audio failures the assertion window to surface
        let clean = ctx
            .poller()
            .never(|| async move { Ok(!page.script_errors().await.is_empty()) })
            .await?;
        if !clean {
            findings.record(
                Severity::High,
                format!(
                    "Script errors with audio unavailable: {}",
                    page.script_errors().await.join("; ")
                ),
            );
        }

        Ok(findings.into_findings())
    }
}
