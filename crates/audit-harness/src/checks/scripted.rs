//! Checks defined in configuration as steps plus expected state

use async_trait::async_trait;

use super::{AuditCheck, CheckContext, Isolation};
use crate::config::{AuditConfig, Expectation, ScenarioConfig, ScriptStep};
use crate::error::HarnessError;
use crate::findings::{Finding, FindingsCollector, Severity};
use crate::interaction::{Action, InteractionStep, Target};
use crate::query::{PageQueries, Point};
use crate::session::PageDriver;

/// A `[[scenarios]]` entry run as a check
pub struct ScriptedCheck {
    scenario: ScenarioConfig,
}

impl ScriptedCheck {
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self { scenario }
    }
}

/// Interaction step for a config step; `None` for page-level steps
pub fn to_interaction(step: &ScriptStep) -> Option<InteractionStep> {
    let (action, expect_visible) = match step {
        ScriptStep::Click {
            selector,
            expect_visible,
        } => (
            Action::Click(Target::locator(selector.clone())),
            expect_visible.clone(),
        ),
        ScriptStep::ClickAt {
            x,
            y,
            expect_visible,
        } => (
            Action::Click(Target::point(Point::new(*x, *y))),
            expect_visible.clone(),
        ),
        ScriptStep::PressKey { key } => (Action::KeyPress(key.clone()), None),
        ScriptStep::Focus { selector } => (Action::Focus(selector.clone()), None),
        ScriptStep::Reload => return None,
    };
    Some(InteractionStep {
        action,
        expect_visible,
    })
}

fn describe(expectation: &Expectation) -> String {
    match expectation {
        Expectation::HasClass { selector, class } => {
            format!("{} to have class {}", selector, class)
        }
        Expectation::LacksClass { selector, class } => {
            format!("{} not to have class {}", selector, class)
        }
        Expectation::TextEquals { selector, text } => format!("{} to read '{}'", selector, text),
        Expectation::Visible { selector } => format!("{} to be visible", selector),
        Expectation::Hidden { selector } => format!("{} to be hidden", selector),
        Expectation::AttributeEquals {
            selector,
            name,
            value,
        } => format!("{} to have {}='{}'", selector, name, value),
        Expectation::NoScriptErrors => "no script errors".to_string(),
    }
}

async fn holds(page: &dyn PageDriver, expectation: &Expectation) -> Result<bool, HarnessError> {
    Ok(match expectation {
        Expectation::HasClass { selector, class } => page.has_class(selector, class).await?,
        Expectation::LacksClass { selector, class } => !page.has_class(selector, class).await?,
        Expectation::TextEquals { selector, text } => {
            page.text(selector).await?.as_deref().map(str::trim) == Some(text.as_str())
        }
        Expectation::Visible { selector } => page.is_visible(selector).await?,
        Expectation::Hidden { selector } => !page.is_visible(selector).await?,
        Expectation::AttributeEquals {
            selector,
            name,
            value,
        } => page.attribute(selector, name).await?.as_deref() == Some(value.as_str()),
        Expectation::NoScriptErrors => page.script_errors().await.is_empty(),
    })
}

#[async_trait]
impl AuditCheck for ScriptedCheck {
    fn name(&self) -> &str {
        &self.scenario.name
    }

    fn isolation(&self, _config: &AuditConfig) -> Isolation {
        if self.scenario.is_dedicated() {
            Isolation::Dedicated(self.scenario.faults.clone())
        } else {
            Isolation::Shared
        }
    }

    fn actionability_severity(&self) -> Severity {
        self.scenario.severity
    }

    async fn run(&self, ctx: &CheckContext) -> Result<Vec<Finding>, HarnessError> {
        let page = ctx.page()?;
        let interactor = ctx.interactor()?;

        for step in &self.scenario.steps {
            match to_interaction(step) {
                Some(interaction) => interactor.perform(&interaction).await?,
                None => page.reload().await?,
            }
        }

        let poller = ctx.poller();
        let mut findings = FindingsCollector::new();
        for expectation in &self.scenario.expect {
            let met = poller.until(|| holds(page, expectation)).await?;
            if !met.is_satisfied() {
                findings.record(
                    self.scenario.severity,
                    format!(
                        "Scenario '{}': expected {}",
                        self.scenario.name,
                        describe(expectation)
                    ),
                );
            }
        }

        Ok(findings.into_findings())
    }
}
