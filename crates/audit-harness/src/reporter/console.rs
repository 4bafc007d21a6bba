//! Console reporter for audit results
//!
//! Provides human-readable output with a per-check status table and the
//! findings grouped by severity.

use anyhow::Result;
use std::fmt::Write;

use crate::findings::Severity;
use crate::runner::{AuditReport, CheckRecord, CheckState};

/// Console format reporter
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn format(report: &AuditReport) -> Result<String> {
        let mut output = String::new();

        writeln!(output)?;
        writeln!(output, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(output, "║                        AUDIT RESULTS                         ║")?;
        writeln!(output, "╚══════════════════════════════════════════════════════════════╝")?;
        writeln!(output)?;

        writeln!(output, "Suite:     {}", report.suite_name)?;
        writeln!(output, "Base URL:  {}", report.base_url)?;
        writeln!(output, "Started:   {}", report.started_at)?;
        writeln!(output, "Duration:  {}ms", report.total_duration_ms)?;
        writeln!(output)?;

        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        writeln!(output, "Checks")?;
        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        for record in &report.checks {
            Self::format_check(&mut output, record)?;
        }
        writeln!(output)?;

        if report.has_findings() {
            writeln!(output, "────────────────────────────────────────────────────────────────")?;
            writeln!(output, "Findings")?;
            writeln!(output, "────────────────────────────────────────────────────────────────")?;
            for severity in [
                Severity::Critical,
                Severity::High,
                Severity::Medium,
                Severity::Low,
            ] {
                for finding in report.findings.iter().filter(|f| f.severity == severity) {
                    writeln!(output, "  [{:<8}] {}", finding.severity, finding.message)?;
                    if let Some(cause) = &finding.cause {
                        writeln!(output, "             cause: {}", cause)?;
                    }
                }
            }
            writeln!(output)?;
        }

        writeln!(output, "────────────────────────────────────────────────────────────────")?;
        let symbol = if report.has_findings() || report.aborted.is_some() {
            "✗"
        } else {
            "✓"
        };
        writeln!(output, "Result: {} {}", symbol, report.summary())?;
        writeln!(output)?;
        Ok(output)
    }

    fn format_check(output: &mut String, record: &CheckRecord) -> Result<()> {
        let detail = match &record.state {
            CheckState::Failed { findings } => format!(
                "{} finding{}",
                findings.len(),
                if findings.len() == 1 { "" } else { "s" }
            ),
            CheckState::Errored { finding } => finding.severity.to_string(),
            CheckState::Skipped { reason } => reason.clone(),
            _ => String::new(),
        };

        writeln!(
            output,
            "  {:<5} {:<28} {:>7}ms  {}",
            record.state.label(),
            record.name,
            record.duration_ms,
            detail
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::Finding;
    use crate::reporter::tests::sample_report;

    #[test]
    fn test_console_lists_checks_and_findings() {
        let output = ConsoleReporter::format(&sample_report()).unwrap();

        assert!(output.contains("AUDIT RESULTS"));
        assert!(output.contains("FAIL"));
        assert!(output.contains("PASS"));
        assert!(output.contains("[MEDIUM  ] Title incorrect: Kensho"));
        assert!(output.contains("Result: ✗ 1 finding (worst: MEDIUM)"));
    }

    #[test]
    fn test_console_orders_by_severity() {
        let mut report = sample_report();
        report.findings.push(
            Finding::new(Severity::Critical, "page_load: Page load failed").with_cause("refused"),
        );

        let output = ConsoleReporter::format(&report).unwrap();
        let critical = output.find("Page load failed").unwrap();
        let medium = output.find("Title incorrect").unwrap();
        assert!(critical < medium);
        assert!(output.contains("cause: refused"));
    }

    #[test]
    fn test_console_clean_run() {
        let mut report = sample_report();
        report.findings.clear();
        report.checks.truncate(1);
        report.checks[0].state = CheckState::Passed;

        let output = ConsoleReporter::format(&report).unwrap();
        assert!(output.contains("Result: ✓ no issues found"));
        assert!(!output.contains("Findings"));
    }
}
