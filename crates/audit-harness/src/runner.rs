//! Audit execution orchestration
//!
//! The runner walks the selected checks in order, one at a time, and gives
//! each the environment it asks for:
//!
//! ```text
//! Standalone ─────────────────────────────► check.run(no page)
//! Shared ──── shared session ─ navigate ──► check.run(page)
//! Dedicated ─ FaultInjector::prepare ─ scoped session ─ navigate ─► check.run(page) ─ close
//! ```
//!
//! Every check runs under a deadline. Errors and panics never escape a check:
//! they are converted into findings, and only an unreachable browser engine
//! stops the run. A failed navigation of the shared session makes it unusable, and the
//! remaining shared checks are skipped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use audit_harness::config::AuditConfig;
//! use audit_harness::runner::AuditRunner;
//! use audit_harness::session::{ChromeSessionManager, LaunchOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AuditConfig::from_file("audit.toml")?;
//! let manager = ChromeSessionManager::launch(LaunchOptions::from_config(&config)).await?;
//! let runner = AuditRunner::new(Arc::new(manager), config);
//! let report = runner.run_configured().await;
//!
//! for finding in &report.findings {
//!     println!("{}", finding);
//! }
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::checks::{self, AuditCheck, CheckContext, Isolation};
use crate::config::AuditConfig;
use crate::error::HarnessError;
use crate::faults::FaultInjector;
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::session::{with_scoped_session, PageDriver, SessionConfig, SessionProvider};

/// Lifecycle of one check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CheckState {
    Pending,
    Running,
    Passed,
    Failed { findings: Vec<Finding> },
    Errored { finding: Finding },
    Skipped { reason: String },
}

impl CheckState {
    pub fn label(&self) -> &'static str {
        match self {
            CheckState::Pending => "PENDING",
            CheckState::Running => "RUNNING",
            CheckState::Passed => "PASS",
            CheckState::Failed { .. } => "FAIL",
            CheckState::Errored { .. } => "ERROR",
            CheckState::Skipped { .. } => "SKIP",
        }
    }

    /// The check body ran to completion, with or without findings
    pub fn completed(&self) -> bool {
        matches!(self, CheckState::Passed | CheckState::Failed { .. })
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub name: String,
    pub state: CheckState,
    pub duration_ms: u64,
}

/// Results of a complete audit run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Name of the audit suite
    pub suite_name: String,
    /// Base URL that was audited
    pub base_url: String,
    /// Timestamp when the audit started
    pub started_at: String,
    /// Total duration of the audit run
    pub total_duration_ms: u64,
    /// Outcome per check, in execution order
    pub checks: Vec<CheckRecord>,
    /// Every finding in discovery order
    pub findings: Vec<Finding>,
    /// Why the run stopped early, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl AuditReport {
    /// At least one check ran to completion
    pub fn did_run(&self) -> bool {
        self.checks.iter().any(|c| c.state.completed())
    }

    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }

    pub fn worst(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// One-line verdict; a run that never started is not a clean run
    pub fn summary(&self) -> String {
        match (&self.aborted, self.did_run(), self.worst()) {
            (Some(reason), false, _) => format!("audit did not run: {}", reason),
            (None, false, None) => "audit did not run: no checks completed".to_string(),
            (_, _, None) => "no issues found".to_string(),
            (aborted, _, Some(worst)) => {
                let mut line = format!(
                    "{} finding{} (worst: {})",
                    self.findings.len(),
                    if self.findings.len() == 1 { "" } else { "s" },
                    worst
                );
                if let Some(reason) = aborted {
                    line.push_str(&format!("; aborted: {}", reason));
                }
                line
            }
        }
    }
}

/// Finding recorded when a check fails with `error`
pub fn error_finding(check: &dyn AuditCheck, error: &HarnessError) -> Finding {
    let severity = match error {
        HarnessError::NotActionable { .. } => check.actionability_severity(),
        other => other.severity(),
    };
    let message = match error {
        HarnessError::EngineUnavailable(_) => "Browser engine unavailable".to_string(),
        HarnessError::Navigation { url, .. } => format!("Page load failed: {}", url),
        HarnessError::NotActionable { selector, .. } => {
            format!("Element {} was never actionable", selector)
        }
        HarnessError::DeadlineExceeded(budget) => {
            format!("Check did not finish within {:?}", budget)
        }
        HarnessError::CheckPanicked(_) => "Check crashed".to_string(),
        _ => "Check could not complete".to_string(),
    };

    Finding::new(severity, format!("{}: {}", check.name(), message))
        .with_cause(error.to_string())
        .from_check(check.name())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn with_deadline<F>(budget: Duration, fut: F) -> Result<Vec<Finding>, HarnessError>
where
    F: Future<Output = Result<Vec<Finding>, HarnessError>>,
{
    timeout(budget, fut)
        .await
        .unwrap_or(Err(HarnessError::DeadlineExceeded(budget)))
}

enum SharedSession {
    NotStarted,
    Ready(Arc<dyn PageDriver>),
    Poisoned(String),
}

/// Sequential audit runner
pub struct AuditRunner {
    provider: Arc<dyn SessionProvider>,
    config: Arc<AuditConfig>,
}

impl AuditRunner {
    pub fn new(provider: Arc<dyn SessionProvider>, config: AuditConfig) -> Self {
        Self {
            provider,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Run the built-in checks and scenarios selected by the configuration
    pub async fn run_configured(&self) -> AuditReport {
        let checks = checks::from_config(&self.config);
        self.run(&checks).await
    }

    fn base_session(&self, label: &str) -> SessionConfig {
        SessionConfig::new(label, self.config.audit.viewport)
    }

    /// Run `checks` in order and collect their findings
    #[instrument(skip(self, checks), fields(suite = %self.config.audit.name))]
    pub async fn run(&self, checks: &[Box<dyn AuditCheck>]) -> AuditReport {
        let start_time = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();

        info!(
            "Starting audit '{}' against {} with {} checks",
            self.config.audit.name,
            self.config.audit.base_url,
            checks.len()
        );

        let mut records: Vec<CheckRecord> = checks
            .iter()
            .map(|check| CheckRecord {
                name: check.name().to_string(),
                state: CheckState::Pending,
                duration_ms: 0,
            })
            .collect();
        let mut findings = FindingsCollector::new();
        let mut shared = SharedSession::NotStarted;
        let mut aborted: Option<String> = None;

        for (check, record) in checks.iter().zip(records.iter_mut()) {
            if let Some(reason) = &aborted {
                record.state = CheckState::Skipped {
                    reason: format!("audit aborted: {}", reason),
                };
                continue;
            }

            let isolation = check.isolation(&self.config);
            if let (Isolation::Shared, SharedSession::Poisoned(reason)) = (&isolation, &shared) {
                debug!("Skipping {}: shared session unusable", check.name());
                record.state = CheckState::Skipped {
                    reason: format!("shared session unusable: {}", reason),
                };
                continue;
            }

            record.state = CheckState::Running;
            info!("Running check: {}", check.name());
            let check_start = Instant::now();

            let dispatch = async {
                match &isolation {
                    Isolation::Standalone => self.run_standalone(check.as_ref()).await,
                    Isolation::Shared => self.run_shared(check.as_ref(), &mut shared).await,
                    Isolation::Dedicated(faults) => {
                        let session =
                            FaultInjector::prepare(self.base_session(check.name()), faults);
                        self.run_dedicated(check.as_ref(), session).await
                    }
                }
            };
            // Scoped sessions are closed before the panic reaches this point
            let outcome = match AssertUnwindSafe(dispatch).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => Err(HarnessError::CheckPanicked(panic_message(payload.as_ref()))),
            };

            record.duration_ms = check_start.elapsed().as_millis() as u64;
            record.state = match outcome {
                Ok(found) if found.is_empty() => {
                    info!("{} passed in {}ms", check.name(), record.duration_ms);
                    CheckState::Passed
                }
                Ok(found) => {
                    let found: Vec<Finding> = found
                        .into_iter()
                        .map(|f| f.from_check(check.name()))
                        .collect();
                    warn!("{} failed with {} findings", check.name(), found.len());
                    findings.extend(found.iter().cloned());
                    CheckState::Failed { findings: found }
                }
                Err(e) => {
                    error!("{} errored: {}", check.name(), e);
                    if e.is_fatal() {
                        aborted = Some(e.to_string());
                    }
                    if isolation == Isolation::Shared && e.poisons_session() {
                        shared = self.poison(shared, &e).await;
                    }
                    let finding = error_finding(check.as_ref(), &e);
                    findings.push(finding.clone());
                    CheckState::Errored { finding }
                }
            };
        }

        if let SharedSession::Ready(page) = shared {
            if let Err(e) = self.provider.close_session(page).await {
                warn!("Failed to close shared session: {}", e);
            }
        }

        let report = AuditReport {
            suite_name: self.config.audit.name.clone(),
            base_url: self.config.audit.base_url.clone(),
            started_at,
            total_duration_ms: start_time.elapsed().as_millis() as u64,
            checks: records,
            findings: findings.into_findings(),
            aborted,
        };

        if report.aborted.is_some() {
            error!("Audit '{}': {}", report.suite_name, report.summary());
        } else {
            info!(
                "Audit '{}' completed in {}ms: {}",
                report.suite_name,
                report.total_duration_ms,
                report.summary()
            );
        }
        report
    }

    async fn run_standalone(&self, check: &dyn AuditCheck) -> Result<Vec<Finding>, HarnessError> {
        let ctx = CheckContext::new(self.config.clone(), None);
        with_deadline(self.config.timing.check_budget, check.run(&ctx)).await
    }

    async fn run_shared(
        &self,
        check: &dyn AuditCheck,
        shared: &mut SharedSession,
    ) -> Result<Vec<Finding>, HarnessError> {
        let page = match shared {
            SharedSession::Ready(page) => page.clone(),
            SharedSession::Poisoned(reason) => {
                return Err(HarnessError::SessionClosed(reason.clone()))
            }
            SharedSession::NotStarted => {
                let page = self.provider.create_session(self.base_session("shared")).await?;
                debug!("Shared session {} created", page.id());
                *shared = SharedSession::Ready(page.clone());
                page
            }
        };

        let base_url = self.config.audit.base_url.as_str();
        let ctx = CheckContext::new(self.config.clone(), Some(page.clone()));
        with_deadline(self.config.timing.check_budget, async {
            page.navigate(base_url).await?;
            check.run(&ctx).await
        })
        .await
    }

    async fn run_dedicated(
        &self,
        check: &dyn AuditCheck,
        session: SessionConfig,
    ) -> Result<Vec<Finding>, HarnessError> {
        let base_url = self.config.audit.base_url.as_str();
        let budget = self.config.timing.check_budget;
        let config = self.config.clone();

        with_scoped_session(self.provider.as_ref(), session, |page| async move {
            let ctx = CheckContext::new(config, Some(page.clone()));
            with_deadline(budget, async {
                page.navigate(base_url).await?;
                check.run(&ctx).await
            })
            .await
        })
        .await
    }

    async fn poison(&self, shared: SharedSession, cause: &HarnessError) -> SharedSession {
        if let SharedSession::Ready(page) = shared {
            warn!("Shared session {} unusable: {}", page.id(), cause);
            if let Err(e) = self.provider.close_session(page).await {
                debug!("Closing poisoned session failed: {}", e);
            }
        }
        SharedSession::Poisoned(cause.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Named(Severity);

    #[async_trait]
    impl AuditCheck for Named {
        fn name(&self) -> &str {
            "named"
        }

        fn actionability_severity(&self) -> Severity {
            self.0
        }

        async fn run(&self, _ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
            Ok(Vec::new())
        }
    }

    fn report(
        checks: Vec<CheckRecord>,
        findings: Vec<Finding>,
        aborted: Option<&str>,
    ) -> AuditReport {
        AuditReport {
            suite_name: "suite".into(),
            base_url: "http://localhost:8000".into(),
            started_at: "2026-01-01T00:00:00Z".into(),
            total_duration_ms: 0,
            checks,
            findings,
            aborted: aborted.map(str::to_string),
        }
    }

    fn record(state: CheckState) -> CheckRecord {
        CheckRecord {
            name: "c".into(),
            state,
            duration_ms: 1,
        }
    }

    #[test]
    fn test_not_actionable_uses_declared_severity() {
        let error = HarnessError::NotActionable {
            selector: "#settings-button".into(),
            waited: Duration::from_secs(2),
        };
        let finding = error_finding(&Named(Severity::Medium), &error);
        assert_eq!(finding.severity, Severity::Medium);
        assert_eq!(finding.message, "named: Element #settings-button was never actionable");
        assert_eq!(finding.check.as_deref(), Some("named"));
        assert!(finding.cause.unwrap().contains("not actionable within 2s"));
    }

    #[test]
    fn test_navigation_failure_is_critical() {
        let error = HarnessError::Navigation {
            url: "http://localhost:8000".into(),
            message: "net::ERR_CONNECTION_REFUSED".into(),
        };
        let finding = error_finding(&Named(Severity::Low), &error);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.message, "named: Page load failed: http://localhost:8000");
    }

    #[test]
    fn test_deadline_is_high() {
        let finding = error_finding(
            &Named(Severity::Low),
            &HarnessError::DeadlineExceeded(Duration::from_secs(30)),
        );
        assert_eq!(finding.severity, Severity::High);
    }

    #[test]
    fn test_summary_distinguishes_clean_from_not_run() {
        let clean = report(vec![record(CheckState::Passed)], Vec::new(), None);
        assert_eq!(clean.summary(), "no issues found");

        let engine_down = Finding::new(Severity::Critical, "shared: Browser engine unavailable");
        let never_ran = report(
            vec![
                record(CheckState::Errored { finding: engine_down.clone() }),
                record(CheckState::Skipped { reason: "audit aborted".into() }),
            ],
            vec![engine_down],
            Some("Browser engine unavailable: no chrome"),
        );
        assert!(!never_ran.did_run());
        assert_eq!(
            never_ran.summary(),
            "audit did not run: Browser engine unavailable: no chrome"
        );
    }

    #[test]
    fn test_summary_without_completed_checks_is_not_clean() {
        let empty = report(Vec::new(), Vec::new(), None);
        assert!(!empty.did_run());
        assert_eq!(empty.summary(), "audit did not run: no checks completed");

        let all_skipped = report(
            vec![record(CheckState::Skipped {
                reason: "shared session unusable".into(),
            })],
            Vec::new(),
            None,
        );
        assert_eq!(all_skipped.summary(), "audit did not run: no checks completed");
    }

    #[test]
    fn test_panic_becomes_high_finding() {
        let finding = error_finding(
            &Named(Severity::Low),
            &HarnessError::CheckPanicked("index out of bounds".into()),
        );
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.message, "named: Check crashed");
        assert_eq!(finding.cause.as_deref(), Some("Check panicked: index out of bounds"));
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(format!("len is {}", 0));
        assert_eq!(panic_message(payload.as_ref()), "len is 0");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_summary_counts_findings() {
        let findings = vec![
            Finding::new(Severity::Low, "a"),
            Finding::new(Severity::High, "b"),
        ];
        let r = report(
            vec![record(CheckState::Failed { findings: findings.clone() })],
            findings,
            None,
        );
        assert_eq!(r.summary(), "2 findings (worst: HIGH)");
        assert_eq!(r.count(Severity::Low), 1);
    }

    #[test]
    fn test_check_state_serializes_tagged() {
        let json = serde_json::to_value(CheckState::Skipped { reason: "x".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "skipped", "reason": "x" }));
    }
}
