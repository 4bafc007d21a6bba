//! Browser sessions
//!
//! A session is one isolated page (its own browser context, so storage and
//! cookies are never shared) configured once at creation time. The harness
//! talks to sessions only through [`PageDriver`] and obtains them from a
//! [`SessionProvider`], which lets checks run unchanged against the Chromium
//! backend in [`chrome`] or an in-memory double in tests.
//!
//! ```text
//! SessionProvider::create_session(config)
//!     └─ viewport, motion, storage faults, network rules applied
//!         └─ PageDriver (about:blank, ready for the first navigation)
//! ```

pub mod chrome;

pub use chrome::{ChromeSession, ChromeSessionManager, LaunchOptions};

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HarnessError;
use crate::faults::{MotionPreference, NetworkRule, StorageFault};
use crate::query::{Point, Query};

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Everything fixed about a session at creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Human-readable label used in logs and session ids
    pub label: String,
    pub viewport: Viewport,
    pub motion: MotionPreference,
    /// Ordered; the first rule matching a request URL decides its fate
    pub network_rules: Vec<NetworkRule>,
    pub storage_faults: Vec<StorageFault>,
}

impl SessionConfig {
    pub fn new(label: impl Into<String>, viewport: Viewport) -> Self {
        Self {
            label: label.into(),
            viewport,
            motion: MotionPreference::Normal,
            network_rules: Vec::new(),
            storage_faults: Vec::new(),
        }
    }

    /// No faults of any kind
    pub fn is_pristine(&self) -> bool {
        self.motion == MotionPreference::Normal
            && self.network_rules.is_empty()
            && self.storage_faults.is_empty()
    }
}

/// One live page
#[async_trait]
pub trait PageDriver: Send + Sync {
    fn id(&self) -> &str;

    fn config(&self) -> &SessionConfig;

    /// Navigate and wait for the load to finish; clears captured script errors
    async fn navigate(&self, url: &str) -> Result<(), HarnessError>;

    /// Reload the current document, keeping storage; clears captured script errors
    async fn reload(&self) -> Result<(), HarnessError>;

    /// Answer a read-only query; see [`crate::query::PageQueries`] for typed helpers
    async fn query(&self, query: &Query) -> Result<Value, HarnessError>;

    /// Press and release the primary button at a viewport coordinate
    async fn click_at(&self, point: Point) -> Result<(), HarnessError>;

    /// Send a real key down/up pair to the focused element
    async fn press_key(&self, key: &str) -> Result<(), HarnessError>;

    /// Move focus to the element; `false` when it does not exist
    async fn focus(&self, selector: &str) -> Result<bool, HarnessError>;

    /// Uncaught exceptions and `console.error` output since the last navigation
    async fn script_errors(&self) -> Vec<String>;

    /// Release the page and its context; calling it again is a no-op
    async fn close(&self) -> Result<(), HarnessError>;
}

/// Source of fresh, fully configured sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<dyn PageDriver>, HarnessError>;

    async fn close_session(&self, session: Arc<dyn PageDriver>) -> Result<(), HarnessError> {
        session.close().await
    }
}

/// Run `body` with a fresh session that is closed on every exit path.
///
/// The session is released whether `body` succeeds, fails, or panics; a
/// panic is resumed after the session is closed. A close failure is only
/// reported when `body` itself succeeded.
pub async fn with_scoped_session<T, F, Fut>(
    provider: &dyn SessionProvider,
    config: SessionConfig,
    body: F,
) -> Result<T, HarnessError>
where
    F: FnOnce(Arc<dyn PageDriver>) -> Fut,
    Fut: Future<Output = Result<T, HarnessError>>,
{
    let session = provider.create_session(config).await?;
    let id = session.id().to_string();
    debug!("Scoped session {} opened", id);

    let outcome = AssertUnwindSafe(body(session.clone())).catch_unwind().await;
    let closed = provider.close_session(session).await;
    if let Err(e) = &closed {
        warn!("Failed to close session {}: {}", id, e);
    }

    match outcome {
        Err(panic) => std::panic::resume_unwind(panic),
        Ok(result) => {
            let value = result?;
            closed?;
            Ok(value)
        }
    }
}
