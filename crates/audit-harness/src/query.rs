//! Read-only observations of page state
//!
//! Checks never run arbitrary script. Everything they observe goes through a
//! [`Query`], a closed vocabulary of side-effect-free reads that every
//! [`PageDriver`](crate::session::PageDriver) backend knows how to answer.
//! The Chrome backend compiles each query to a small expression with
//! [`Query::to_expression`]; in-memory test doubles match on the variants.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HarnessError;
use crate::session::PageDriver;

/// A viewport coordinate in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Element bounds relative to the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Snapshot of everything that decides whether an element can be clicked
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementProbe {
    pub found: bool,
    pub visible: bool,
    /// Not disabled, not `aria-disabled`, not inside an inert subtree
    pub enabled: bool,
    /// The element (or a descendant) is the hit target at its own center
    pub receives_pointer: bool,
    pub center: Option<Point>,
}

impl ElementProbe {
    pub fn missing() -> Self {
        Self {
            found: false,
            visible: false,
            enabled: false,
            receives_pointer: false,
            center: None,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.found && self.visible && self.enabled && self.receives_pointer && self.center.is_some()
    }

    /// First unmet condition, for error messages and debug logs
    pub fn blocker(&self) -> Option<&'static str> {
        if !self.found {
            Some("not attached")
        } else if !self.visible {
            Some("not visible")
        } else if !self.enabled {
            Some("disabled or inert")
        } else if !self.receives_pointer {
            Some("covered by another element")
        } else if self.center.is_none() {
            Some("no clickable point")
        } else {
            None
        }
    }
}

/// Where keyboard focus currently is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusState {
    /// Id of the focused element, or its tag name when it has none
    pub id: Option<String>,
    /// Whether focus sits inside the container the query asked about
    pub inside: bool,
}

/// Side-effect-free page reads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Title,
    BodyClass,
    ClassList { selector: String },
    /// `null` when the attribute is absent, `""` when present but empty
    Attribute { selector: String, name: String },
    Text { selector: String },
    Count { selector: String },
    Visible { selector: String },
    BoundingBox { selector: String },
    Actionability { selector: String },
    ActiveElement { within: String },
    /// Inline `style` property value; `""` when unset
    InlineStyle { selector: String, property: String },
    FocusableCount { selector: String },
}

const FOCUSABLE: &str = "a[href], button:not([disabled]), input:not([disabled]), \
select:not([disabled]), textarea:not([disabled]), [tabindex]:not([tabindex=\"-1\"])";

const VISIBLE_FN: &str = "const isVisible = (el) => { \
const r = el.getBoundingClientRect(); const s = getComputedStyle(el); \
return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; };";

fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn with_element(selector: &str, body: &str, missing: &str) -> String {
    format!(
        "(() => {{ {VISIBLE_FN} const el = document.querySelector({sel}); \
         if (!el) return {missing}; {body} }})()",
        sel = js_string(selector),
    )
}

impl Query {
    pub fn class_list(selector: impl Into<String>) -> Self {
        Query::ClassList { selector: selector.into() }
    }

    pub fn attribute(selector: impl Into<String>, name: impl Into<String>) -> Self {
        Query::Attribute { selector: selector.into(), name: name.into() }
    }

    pub fn text(selector: impl Into<String>) -> Self {
        Query::Text { selector: selector.into() }
    }

    pub fn count(selector: impl Into<String>) -> Self {
        Query::Count { selector: selector.into() }
    }

    pub fn visible(selector: impl Into<String>) -> Self {
        Query::Visible { selector: selector.into() }
    }

    pub fn actionability(selector: impl Into<String>) -> Self {
        Query::Actionability { selector: selector.into() }
    }

    /// Expression evaluated in the page; its value is the query result
    pub fn to_expression(&self) -> String {
        match self {
            Query::Title => "document.title".to_string(),
            Query::BodyClass => "document.body ? document.body.className : null".to_string(),
            Query::ClassList { selector } => {
                with_element(selector, "return Array.from(el.classList);", "null")
            }
            Query::Attribute { selector, name } => with_element(
                selector,
                &format!("return el.getAttribute({});", js_string(name)),
                "null",
            ),
            Query::Text { selector } => with_element(selector, "return el.textContent;", "null"),
            Query::Count { selector } => {
                format!("document.querySelectorAll({}).length", js_string(selector))
            }
            Query::Visible { selector } => {
                with_element(selector, "return isVisible(el);", "false")
            }
            Query::BoundingBox { selector } => with_element(
                selector,
                "const r = el.getBoundingClientRect(); \
                 return { x: r.left, y: r.top, width: r.width, height: r.height };",
                "null",
            ),
            Query::Actionability { selector } => with_element(
                selector,
                "const r = el.getBoundingClientRect(); \
                 const visible = isVisible(el); \
                 const enabled = !el.disabled && el.getAttribute('aria-disabled') !== 'true' \
                   && !el.closest('[inert]'); \
                 const x = r.left + r.width / 2; const y = r.top + r.height / 2; \
                 const hit = visible ? document.elementFromPoint(x, y) : null; \
                 const receives = !!hit && (hit === el || el.contains(hit)); \
                 return { found: true, visible, enabled, receives_pointer: receives, \
                   center: visible ? { x, y } : null };",
                "{ found: false, visible: false, enabled: false, receives_pointer: false, center: null }",
            ),
            Query::ActiveElement { within } => format!(
                "(() => {{ const a = document.activeElement; \
                 const c = document.querySelector({sel}); \
                 return {{ id: a && a !== document.body ? (a.id || a.tagName.toLowerCase()) : null, \
                   inside: !!(a && c && c.contains(a)) }}; }})()",
                sel = js_string(within),
            ),
            Query::InlineStyle { selector, property } => with_element(
                selector,
                &format!("return el.style.getPropertyValue({});", js_string(property)),
                "null",
            ),
            Query::FocusableCount { selector } => with_element(
                selector,
                &format!("return el.querySelectorAll({}).length;", js_string(FOCUSABLE)),
                "0",
            ),
        }
    }
}

fn decode<T: DeserializeOwned>(query: &Query, value: Value) -> Result<T, HarnessError> {
    serde_json::from_value(value).map_err(|e| {
        HarnessError::Evaluation(format!("Unexpected result for {:?}: {}", query, e))
    })
}

/// Typed helpers over [`PageDriver::query`]
#[async_trait]
pub trait PageQueries {
    async fn read<T: DeserializeOwned + Send>(&self, query: Query) -> Result<T, HarnessError>;

    async fn title(&self) -> Result<String, HarnessError> {
        self.read(Query::Title).await
    }

    async fn body_class(&self) -> Result<String, HarnessError> {
        Ok(self.read::<Option<String>>(Query::BodyClass).await?.unwrap_or_default())
    }

    /// Whether the element carries `class`; a missing element has no classes
    async fn has_class(&self, selector: &str, class: &str) -> Result<bool, HarnessError> {
        let classes: Option<Vec<String>> = self.read(Query::class_list(selector)).await?;
        Ok(classes.is_some_and(|list| list.iter().any(|c| c == class)))
    }

    async fn attribute(&self, selector: &str, name: &str) -> Result<Option<String>, HarnessError> {
        self.read(Query::attribute(selector, name)).await
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, HarnessError> {
        self.read(Query::text(selector)).await
    }

    async fn count(&self, selector: &str) -> Result<u64, HarnessError> {
        self.read(Query::count(selector)).await
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, HarnessError> {
        self.read(Query::visible(selector)).await
    }

    async fn bounding_box(&self, selector: &str) -> Result<Option<Rect>, HarnessError> {
        self.read(Query::BoundingBox { selector: selector.to_string() }).await
    }

    async fn probe(&self, selector: &str) -> Result<ElementProbe, HarnessError> {
        self.read(Query::actionability(selector)).await
    }

    async fn focus_state(&self, within: &str) -> Result<FocusState, HarnessError> {
        self.read(Query::ActiveElement { within: within.to_string() }).await
    }

    async fn inline_style(
        &self,
        selector: &str,
        property: &str,
    ) -> Result<Option<String>, HarnessError> {
        self.read(Query::InlineStyle {
            selector: selector.to_string(),
            property: property.to_string(),
        })
        .await
    }

    async fn focusable_count(&self, selector: &str) -> Result<u64, HarnessError> {
        self.read(Query::FocusableCount { selector: selector.to_string() }).await
    }
}

#[async_trait]
impl<P: PageDriver + ?Sized> PageQueries for P {
    async fn read<T: DeserializeOwned + Send>(&self, query: Query) -> Result<T, HarnessError> {
        let value = self.query(&query).await?;
        decode(&query, value)
    }
}
