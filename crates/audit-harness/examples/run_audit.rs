//! Run a UI audit against a locally served app
//!
//! Usage: cargo run -p audit-harness --example run_audit -- [config.toml | base_url]

use anyhow::Result;
use audit_harness::config::AuditConfig;
use audit_harness::reporter::{OutputFormat, Reporter};
use audit_harness::runner::AuditRunner;
use audit_harness::session::{ChromeSessionManager, LaunchOptions};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let arg = env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8000".to_string());
    let config = if arg.starts_with("http://") || arg.starts_with("https://") {
        AuditConfig::for_url(arg)
    } else {
        println!("Loading config from: {}", arg);
        AuditConfig::from_file(&arg)?
    };

    println!("Starting audit: {}", config.audit.name);
    println!("  Base URL:  {}", config.audit.base_url);
    println!("  Checks:    {}", config.checks.enabled.len());
    println!("  Scenarios: {}", config.scenarios.len());
    println!();

    let options = LaunchOptions::from_config(&config);
    let manager = Arc::new(ChromeSessionManager::launch(options).await?);
    let runner = AuditRunner::new(manager.clone(), config);
    let report = runner.run_configured().await;
    manager.shutdown().await?;

    let format = env::var("AUDIT_FORMAT")
        .ok()
        .map(|f| f.parse())
        .transpose()?
        .unwrap_or(OutputFormat::Console);
    Reporter::new(format).report(&report)?;

    Ok(())
}
