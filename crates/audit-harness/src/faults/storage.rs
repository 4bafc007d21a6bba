//! Persisted-state corruption
//!
//! Writes a payload under a `localStorage` key before any page script runs,
//! exactly once per tab. Later reloads in the same session see whatever the
//! app itself stored afterwards.

use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::HarnessError;

const APPLIED_FLAG: &str = "__audit_storage_fault_applied";

/// Value forced into persisted storage before the app loads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageFault {
    pub key: String,
    pub payload: String,
}

impl StorageFault {
    pub fn new(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            payload: payload.into(),
        }
    }
}

/// Script run on every new document that applies `faults` once per tab
pub fn init_script(faults: &[StorageFault]) -> String {
    let writes: String = faults
        .iter()
        .map(|f| {
            format!(
                "localStorage.setItem({}, {});",
                Value::String(f.key.clone()),
                Value::String(f.payload.clone())
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "(() => {{ try {{ if (sessionStorage.getItem('{flag}') === null) {{ {writes} \
         sessionStorage.setItem('{flag}', '1'); }} }} catch (e) {{}} }})();",
        flag = APPLIED_FLAG,
    )
}

/// Register the corruption script on `page`; a no-op without faults
#[instrument(skip(page, faults), fields(faults = faults.len()))]
pub async fn install(page: &Page, faults: &[StorageFault]) -> Result<(), HarnessError> {
    if faults.is_empty() {
        return Ok(());
    }

    page.execute(AddScriptToEvaluateOnNewDocumentParams::new(init_script(faults)))
        .await
        .map_err(|e| HarnessError::Protocol(format!("Failed to register storage fault: {}", e)))?;

    debug!("Storage faults registered");
    Ok(())
}
