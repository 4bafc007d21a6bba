//! Palette contrast, evaluated without a browser

use async_trait::async_trait;
use tracing::debug;

use super::{AuditCheck, CheckContext, Isolation};
use crate::config::AuditConfig;
use crate::contrast::{evaluate_pair, ContrastVerdict};
use crate::error::HarnessError;
use crate::findings::{Finding, Severity};

/// Every configured palette pair meets the contrast threshold; needs no browser
pub struct ContrastCheck;

#[async_trait]
impl AuditCheck for ContrastCheck {
    fn name(&self) -> &str {
        "contrast"
    }

    fn isolation(&self, _config: &AuditConfig) -> Isolation {
        Isolation::Standalone
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let contrast = &ctx.config.contrast;

        let findings = contrast
            .pairs
            .iter()
            .filter_map(|pair| {
                let eval = evaluate_pair(pair, contrast.threshold);
                debug!("{}: {:.2}:1 {:?}", eval.name, eval.ratio, eval.verdict);
                (eval.verdict == ContrastVerdict::Fail).then(|| {
                    Finding::new(
                        Severity::Medium,
                        format!(
                            "Contrast: {} text {} on {} is {:.2}:1 (minimum {}:1)",
                            pair.name,
                            pair.foreground,
                            pair.background,
                            eval.ratio,
                            contrast.threshold
                        ),
                    )
                })
            })
            .collect();

        Ok(findings)
    }
}
