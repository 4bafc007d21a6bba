//! JSON reporter for audit results

use crate::runner::AuditReport;
use anyhow::Result;

/// JSON format reporter
pub struct JsonReporter;

impl JsonReporter {
    /// Format the report as JSON, optionally pretty-printed
    pub fn format(report: &AuditReport, pretty: bool) -> Result<String> {
        let output = if pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::tests::sample_report;
    use crate::runner::CheckState;

    #[test]
    fn test_json_format_compact() {
        let output = JsonReporter::format(&sample_report(), false).unwrap();

        assert!(!output.contains('\n'));
        assert!(output.contains("\"suite_name\":\"Kenshō audit\""));
        // Clean runs carry no abort reason
        assert!(!output.contains("aborted"));
    }

    #[test]
    fn test_json_format_pretty() {
        let output = JsonReporter::format(&sample_report(), true).unwrap();
        assert!(output.contains('\n'));
        assert!(output.contains("  "));
    }

    #[test]
    fn test_json_shape() {
        let json = JsonReporter::format(&sample_report(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["findings"][0]["severity"], "MEDIUM");
        assert_eq!(value["findings"][0]["check"], "page_load");
        assert_eq!(value["checks"][0]["state"]["state"], "failed");
        assert_eq!(value["checks"][1]["state"]["state"], "passed");
    }

    #[test]
    fn test_json_parses_back() {
        let report = sample_report();
        let json = JsonReporter::format(&report, false).unwrap();
        let parsed: crate::runner::AuditReport = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.suite_name, report.suite_name);
        assert_eq!(parsed.findings, report.findings);
        assert!(matches!(parsed.checks[1].state, CheckState::Passed));
    }
}
