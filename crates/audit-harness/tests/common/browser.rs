//! Browser helpers for tests that need a real Chromium

#![allow(dead_code)]

use audit_harness::session::{ChromeSessionManager, LaunchOptions};
use audit_harness::HarnessError;

/// Check if browser tests should be skipped (when Chrome isn't available)
pub fn should_skip() -> bool {
    std::env::var("SKIP_BROWSER_TESTS").is_ok()
}

/// Macro to skip test if Chrome isn't available
#[macro_export]
macro_rules! skip_if_no_chrome {
    () => {
        if browser::should_skip() {
            eprintln!("Skipping test: SKIP_BROWSER_TESTS is set");
            return;
        }
    };
}

/// Find Chrome for Testing installed by Puppeteer
pub fn find_chrome_for_testing() -> Option<std::path::PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let puppeteer_cache = std::path::Path::new(&home).join(".cache/puppeteer/chrome");

    let mut versions: Vec<_> = std::fs::read_dir(&puppeteer_cache)
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .collect();
    versions.sort_by_key(|v| std::cmp::Reverse(v.path()));

    versions.into_iter().find_map(|version_dir| {
        [
            "chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
            "chrome-linux64/chrome",
        ]
        .iter()
        .map(|rel| version_dir.path().join(rel))
        .find(|p| p.exists())
    })
}

/// Launch options with a unique profile directory per browser
pub fn launch_options() -> LaunchOptions {
    use std::sync::atomic::{AtomicU64, Ordering};
    static BROWSER_ID: AtomicU64 = AtomicU64::new(0);

    let browser_id = BROWSER_ID.fetch_add(1, Ordering::SeqCst);
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let user_data_dir = std::env::temp_dir().join(format!(
        "audit-harness-{}-{}-{}",
        std::process::id(),
        browser_id,
        timestamp
    ));

    LaunchOptions {
        chrome_path: find_chrome_for_testing(),
        user_data_dir: Some(user_data_dir),
        no_sandbox: std::env::var("CI").is_ok(),
        ..LaunchOptions::default()
    }
}

/// Launch the browser, or `None` when Chrome is not installed
pub async fn require_manager() -> Option<ChromeSessionManager> {
    match ChromeSessionManager::launch(launch_options()).await {
        Ok(manager) => Some(manager),
        Err(HarnessError::EngineUnavailable(e)) => {
            eprintln!("Skipping: Chrome not available ({})", e);
            None
        }
        Err(e) => panic!("Unexpected browser error: {}", e),
    }
}

/// Inline page as a `data:` URL
pub fn data_url(html: &str) -> String {
    let encoded: String = html
        .chars()
        .map(|c| match c {
            '%' => "%25".to_string(),
            '#' => "%23".to_string(),
            '\n' => " ".to_string(),
            other => other.to_string(),
        })
        .collect();
    format!("data:text/html;charset=utf-8,{}", encoded)
}
