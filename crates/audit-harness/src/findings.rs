//! Severity-tagged findings and the append-only collector
//!
//! A [`Finding`] is one detected deviation from the expected behavior of the
//! audited application. Findings are never deduplicated: two identical findings
//! are two independent check failures.
//!
//! # Severity taxonomy
//!
//! - **CRITICAL**: the page fails to load at all
//! - **HIGH**: broken core interaction or accessibility containment
//! - **MEDIUM**: incorrect but non-blocking behavior
//! - **LOW**: minor accessibility omission

use serde::{Deserialize, Serialize};
use std::fmt;

/// Impact level of a finding, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single harness-detected deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// User-impact severity assigned by the check
    pub severity: Severity,
    /// Human-readable description
    pub message: String,
    /// Underlying cause (error text) when the finding comes from a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Name of the check that produced the finding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            cause: None,
            check: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn from_check(mut self, check: impl Into<String>) -> Self {
        self.check = Some(check.into());
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " (cause: {})", cause)?;
        }
        Ok(())
    }
}

/// Append-only accumulator that preserves discovery order
#[derive(Debug, Clone, Default)]
pub struct FindingsCollector {
    findings: Vec<Finding>,
}

impl FindingsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding at the given severity
    pub fn record(&mut self, severity: Severity, message: impl Into<String>) {
        self.push(Finding::new(severity, message));
    }

    /// Record a finding that carries the error which caused it
    pub fn record_with_cause(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        cause: impl Into<String>,
    ) {
        self.push(Finding::new(severity, message).with_cause(cause));
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend<I: IntoIterator<Item = Finding>>(&mut self, findings: I) {
        self.findings.extend(findings);
    }

    /// All findings in insertion order
    pub fn report(&self) -> Vec<Finding> {
        self.findings.clone()
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Highest severity recorded so far
    pub fn worst(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }
}
