//! Browser-driven UI quality audits
//!
//! This crate drives a real Chromium instance against a single-page web app
//! and reports severity-tagged findings about its interactive behavior:
//! dead zones, settings panel containment, focus traps, timer state,
//! persistence, reduced motion, resilience to corrupted storage and failed
//! audio requests, and color contrast.
//!
//! # Features
//!
//! - **Isolated sessions**: every session gets its own browser context
//! - **Fault injection**: corrupted storage, blocked requests, and reduced
//!   motion fixed at session creation, before the first navigation
//! - **Actionability-aware interaction**: clicks wait for a visible, enabled,
//!   unobstructed target; coordinate clicks go where they are told
//! - **Bounded polling**: every assertion has a timeout; nothing sleeps blindly
//! - **Scripted scenarios**: extra checks declared in TOML
//! - **Multiple Output Formats**: JSON and Console reports
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use audit_harness::{AuditConfig, AuditRunner, OutputFormat, Reporter};
//! use audit_harness::session::{ChromeSessionManager, LaunchOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AuditConfig::from_file("audit.toml")?;
//! let manager = ChromeSessionManager::launch(LaunchOptions::from_config(&config)).await?;
//!
//! let report = AuditRunner::new(Arc::new(manager), config)
//!     .run_configured()
//!     .await;
//!
//! Reporter::new(OutputFormat::Console).report(&report)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! [audit]
//! name = "Kenshō audit"
//! base_url = "http://localhost:8000"
//!
//! [timing]
//! actionability_timeout = 2000
//! assertion_timeout = 2000
//!
//! [checks]
//! enabled = ["page_load", "dead_zone", "focus_trap", "contrast"]
//!
//! [[scenarios]]
//! name = "Escape closes settings"
//! steps = [
//!     { type = "click", selector = "#settings-button", expect_visible = "#settings-menu" },
//!     { type = "press_key", key = "Escape" },
//! ]
//! expect = [{ expect = "lacks_class", selector = "#settings-menu", class = "active" }]
//! ```

pub mod checks;
pub mod config;
pub mod contrast;
pub mod error;
pub mod faults;
pub mod findings;
pub mod interaction;
pub mod poller;
pub mod query;
pub mod reporter;
pub mod runner;
pub mod session;

// Re-export main types for convenience
pub use config::AuditConfig;
pub use error::HarnessError;
pub use findings::{Finding, FindingsCollector, Severity};
pub use reporter::{OutputFormat, Reporter};
pub use runner::{AuditReport, AuditRunner, CheckRecord, CheckState};
