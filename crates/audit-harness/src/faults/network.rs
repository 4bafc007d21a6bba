//! Network fault rules via the Chrome DevTools `Fetch` domain
//!
//! Requests whose URL matches a rule pattern are paused by the browser and
//! resolved by a background task: the first matching rule decides whether the
//! request is failed (`BlockedByClient`) or continued untouched. Patterns use
//! the same wildcards the browser does: `*` matches any run of characters and
//! `?` matches exactly one.

use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::ErrorReason;
use chromiumoxide::Page;
use futures::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use crate::error::HarnessError;

/// What to do with a request matching a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Abort,
    Passthrough,
}

/// URL pattern and the action applied to matching requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRule {
    pub pattern: String,
    pub action: RuleAction,
}

impl NetworkRule {
    pub fn abort(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: RuleAction::Abort,
        }
    }

    pub fn passthrough(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: RuleAction::Passthrough,
        }
    }
}

/// Translate a wildcard pattern into an anchored regular expression
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}

/// Ordered rules compiled for matching; the first match wins
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    rules: Vec<(Regex, RuleAction)>,
}

impl RuleMatcher {
    pub fn compile(rules: &[NetworkRule]) -> Result<Self, HarnessError> {
        let rules = rules
            .iter()
            .map(|rule| {
                Regex::new(&glob_to_regex(&rule.pattern))
                    .map(|re| (re, rule.action))
                    .map_err(|e| {
                        HarnessError::Protocol(format!(
                            "Invalid URL pattern {}: {}",
                            rule.pattern, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Action of the first rule matching `url`; `None` when nothing matches
    pub fn action_for(&self, url: &str) -> Option<RuleAction> {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(url))
            .map(|(_, action)| *action)
    }
}

/// Start intercepting requests on `page` according to `rules`.
///
/// Must run before the first navigation. Returns the interceptor task, or
/// `None` when there are no rules and interception stays disabled.
#[instrument(skip(page, rules), fields(rules = rules.len()))]
pub async fn install(
    page: &Page,
    rules: &[NetworkRule],
) -> Result<Option<JoinHandle<()>>, HarnessError> {
    if rules.is_empty() {
        return Ok(None);
    }

    let matcher = RuleMatcher::compile(rules)?;

    // Subscribe before enabling so no paused request is missed
    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| {
            HarnessError::Protocol(format!("Failed to subscribe to paused requests: {}", e))
        })?;

    let patterns: Vec<RequestPattern> = rules
        .iter()
        .map(|rule| RequestPattern::builder().url_pattern(rule.pattern.clone()).build())
        .collect();

    page.execute(EnableParams::builder().patterns(patterns).build())
        .await
        .map_err(|e| {
            HarnessError::Protocol(format!("Failed to enable request interception: {}", e))
        })?;

    let page = page.clone();
    let task = tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let url = event.request.url.as_str();
            let resolved = match matcher.action_for(url) {
                Some(RuleAction::Abort) => {
                    debug!("Aborting request to {}", url);
                    page.execute(FailRequestParams::new(
                        event.request_id.clone(),
                        ErrorReason::BlockedByClient,
                    ))
                    .await
                    .map(|_| ())
                }
                Some(RuleAction::Passthrough) | None => page
                    .execute(ContinueRequestParams::new(event.request_id.clone()))
                    .await
                    .map(|_| ()),
            };
            if let Err(e) = resolved {
                // The page may have navigated away or closed
                trace!("Paused request {} not resolved: {}", url, e);
            }
        }
    });

    debug!("Request interception enabled");
    Ok(Some(task))
}
