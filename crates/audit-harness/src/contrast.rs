//! WCAG 2.x relative luminance and contrast ratio
//!
//! Pure functions, no browser involved. Colors are validated once by
//! [`HexColor::parse`]; everything after that is infallible.
//!
//! # Examples
//!
//! ```
//! use audit_harness::contrast::{contrast_ratio, HexColor};
//!
//! let white = HexColor::parse("#fff").unwrap();
//! let black = HexColor::parse("000000").unwrap();
//! let ratio = contrast_ratio(white, black);
//! assert!((ratio - 21.0).abs() < 0.01);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Conventional AA threshold for normal-size text
pub const DEFAULT_THRESHOLD: f64 = 4.5;

/// An sRGB color parsed from a 3- or 6-digit hex triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Rejected hex input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid hex color `{0}`: expected 3 or 6 hex digits, optionally prefixed with '#'")]
pub struct InvalidHexColor(pub String);

impl HexColor {
    /// Parse `#rgb`, `rgb`, `#rrggbb` or `rrggbb`
    pub fn parse(input: &str) -> Result<Self, InvalidHexColor> {
        let digits = input.strip_prefix('#').unwrap_or(input);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidHexColor(input.to_string()));
        }

        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_string(),
            _ => return Err(InvalidHexColor(input.to_string())),
        };

        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| InvalidHexColor(input.to_string()))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl FromStr for HexColor {
    type Err = InvalidHexColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = InvalidHexColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

fn linearize(channel: u8) -> f64 {
    let c = f64::from(channel) / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Relative luminance in [0, 1]
pub fn relative_luminance(color: HexColor) -> f64 {
    0.2126 * linearize(color.r) + 0.7152 * linearize(color.g) + 0.0722 * linearize(color.b)
}

/// Contrast ratio in [1, 21]; symmetric in its arguments
pub fn contrast_ratio(a: HexColor, b: HexColor) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    let (lighter, darker) = if la >= lb { (la, lb) } else { (lb, la) };
    (lighter + 0.05) / (darker + 0.05)
}

/// PASS/FAIL against a caller-supplied threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContrastVerdict {
    Pass,
    Fail,
}

pub fn classify(ratio: f64, threshold: f64) -> ContrastVerdict {
    if ratio >= threshold {
        ContrastVerdict::Pass
    } else {
        ContrastVerdict::Fail
    }
}

/// A named foreground/background combination from a theme palette
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPair {
    pub name: String,
    pub foreground: HexColor,
    pub background: HexColor,
}

/// Outcome of evaluating one [`ColorPair`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEvaluation {
    pub name: String,
    pub ratio: f64,
    pub verdict: ContrastVerdict,
}

pub fn evaluate_pair(pair: &ColorPair, threshold: f64) -> PairEvaluation {
    let ratio = contrast_ratio(pair.foreground, pair.background);
    PairEvaluation {
        name: pair.name.clone(),
        ratio,
        verdict: classify(ratio, threshold),
    }
}

/// Accent/text-on-accent pairs of the four shipped themes
pub fn default_palette() -> Vec<ColorPair> {
    [
        ("default", "#2d2d3f", "#f2b7a8"),
        ("sunrise", "#3d2b20", "#f4a261"),
        ("forest", "#1a2b1d", "#a3b18a"),
        ("twilight", "#1a222b", "#e07a5f"),
    ]
    .into_iter()
    .filter_map(|(name, fg, bg)| {
        Some(ColorPair {
            name: name.to_string(),
            foreground: HexColor::parse(fg).ok()?,
            background: HexColor::parse(bg).ok()?,
        })
    })
    .collect()
}
