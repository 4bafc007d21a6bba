//! Reduced-motion media emulation

use chromiumoxide::cdp::browser_protocol::emulation::{MediaFeature, SetEmulatedMediaParams};
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::HarnessError;

/// Value reported for the `prefers-reduced-motion` media feature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionPreference {
    #[default]
    Normal,
    Reduced,
}

impl MotionPreference {
    pub fn media_value(&self) -> &'static str {
        match self {
            MotionPreference::Normal => "no-preference",
            MotionPreference::Reduced => "reduce",
        }
    }
}

/// Emulate the motion preference on `page`; `Normal` leaves the browser default
#[instrument(skip(page))]
pub async fn apply(page: &Page, motion: MotionPreference) -> Result<(), HarnessError> {
    if motion == MotionPreference::Normal {
        return Ok(());
    }

    let params = SetEmulatedMediaParams::builder()
        .features(vec![MediaFeature::new(
            "prefers-reduced-motion",
            motion.media_value(),
        )])
        .build();

    page.execute(params)
        .await
        .map_err(|e| {
            HarnessError::Protocol(format!("Failed to emulate motion preference: {}", e))
        })?;

    debug!("Emulating prefers-reduced-motion: {}", motion.media_value());
    Ok(())
}
