//! Resolution of logical controls to live elements.
//!
//! A [`LocatorSpec`] is an ordered list of [`LocateStrategy`] values for one
//! logical control, e.g. "hint button = accessibility id `lightbulb`, else any
//! button whose label contains `Hint`". The [`Locator`] walks the list in order
//! and returns the first strategy's first match.
//!
//! Absence is not an error here. [`Locator::locate`] returns `None` when
//! nothing matched before the timeout, and a strategy whose remote call fails
//! simply counts as a miss so the next strategy still gets its turn.
//!
//! # Example
//!
//! ```
//! use gridcheck_core::locator::{AttributeMatch, Band, LocatorSpec, TextMatch};
//!
//! let empty_top_row = LocatorSpec::new("empty cell in row 1")
//!     .by_class_filtered(
//!         "XCUIElementTypeButton",
//!         Some(AttributeMatch::any_of(&["name", "label"], TextMatch::equals(" "))),
//!         Some(Band::new(80.0, 150.0)),
//!     );
//! assert_eq!(empty_top_row.strategies().len(), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::clock::Clock;
use crate::driver::{AutomationDriver, LocateBy};
use crate::element::ElementRef;

/// How an attribute value is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    Equals(String),
    Contains(String),
    ContainsIgnoreCase(String),
}

impl TextMatch {
    pub fn equals(text: impl Into<String>) -> Self {
        TextMatch::Equals(text.into())
    }

    pub fn contains(text: impl Into<String>) -> Self {
        TextMatch::Contains(text.into())
    }

    pub fn contains_ignore_case(text: impl Into<String>) -> Self {
        TextMatch::ContainsIgnoreCase(text.into())
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            TextMatch::Equals(text) => candidate == text,
            TextMatch::Contains(text) => candidate.contains(text.as_str()),
            TextMatch::ContainsIgnoreCase(text) => {
                candidate.to_lowercase().contains(&text.to_lowercase())
            }
        }
    }
}

/// Matches when any of the listed attributes satisfies the text match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatch {
    pub attributes: Vec<String>,
    pub text: TextMatch,
}

impl AttributeMatch {
    pub fn new(attribute: &str, text: TextMatch) -> Self {
        Self {
            attributes: vec![attribute.to_string()],
            text,
        }
    }

    pub fn any_of(attributes: &[&str], text: TextMatch) -> Self {
        Self {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            text,
        }
    }
}

/// A horizontal band of the screen, exclusive on both edges.
///
/// A candidate is inside the band when the top edge of its frame lies
/// strictly between `min_y` and `max_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min_y: f64,
    pub max_y: f64,
}

impl Band {
    pub fn new(min_y: f64, max_y: f64) -> Self {
        Self { min_y, max_y }
    }

    pub fn contains_y(&self, y: f64) -> bool {
        y > self.min_y && y < self.max_y
    }
}

/// One rule for finding an element.
#[derive(Debug, Clone, PartialEq)]
pub enum LocateStrategy {
    /// Accessibility identifier, matched by the endpoint.
    AccessibilityId(String),
    /// Every element of a control class, then filtered locally by attribute
    /// and/or vertical band, keeping endpoint iteration order.
    ClassFilter {
        class: String,
        attribute: Option<AttributeMatch>,
        band: Option<Band>,
    },
    /// Label or name text, matched by the endpoint.
    Text { text: String, partial: bool },
}

impl fmt::Display for LocateStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateStrategy::AccessibilityId(id) => write!(f, "id={id}"),
            LocateStrategy::ClassFilter { class, attribute, band } => {
                write!(f, "class={class}")?;
                if let Some(attr) = attribute {
                    write!(f, " where {:?}~{:?}", attr.attributes, attr.text)?;
                }
                if let Some(band) = band {
                    write!(f, " in y({}, {})", band.min_y, band.max_y)?;
                }
                Ok(())
            }
            LocateStrategy::Text { text, partial: true } => write!(f, "text~={text}"),
            LocateStrategy::Text { text, partial: false } => write!(f, "text={text}"),
        }
    }
}

/// Ordered strategies for one logical control.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorSpec {
    name: String,
    strategies: Vec<LocateStrategy>,
}

impl LocatorSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            strategies: Vec::new(),
        }
    }

    pub fn by_id(mut self, id: impl Into<String>) -> Self {
        self.strategies.push(LocateStrategy::AccessibilityId(id.into()));
        self
    }

    pub fn by_text(mut self, text: impl Into<String>, partial: bool) -> Self {
        self.strategies.push(LocateStrategy::Text {
            text: text.into(),
            partial,
        });
        self
    }

    pub fn by_class_filtered(
        mut self,
        class: impl Into<String>,
        attribute: Option<AttributeMatch>,
        band: Option<Band>,
    ) -> Self {
        self.strategies.push(LocateStrategy::ClassFilter {
            class: class.into(),
            attribute,
            band,
        });
        self
    }

    pub fn then(mut self, strategy: LocateStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategies(&self) -> &[LocateStrategy] {
        &self.strategies
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A resolved element and the index of the strategy that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub element: ElementRef,
    pub strategy: usize,
}

/// Resolves [`LocatorSpec`]s against one automation session.
pub struct Locator {
    driver: Arc<dyn AutomationDriver>,
    clock: Arc<dyn Clock>,
    retry_interval: Duration,
}

impl Locator {
    pub fn new(driver: Arc<dyn AutomationDriver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            driver,
            clock,
            retry_interval: Duration::from_millis(250),
        }
    }

    /// Sets the pause between full passes over the strategy list.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn driver(&self) -> &Arc<dyn AutomationDriver> {
        &self.driver
    }

    /// Resolves `spec` to a live element, retrying the full strategy list
    /// until `timeout` elapses. A zero timeout makes exactly one pass.
    pub async fn locate(&self, spec: &LocatorSpec, timeout: Duration) -> Option<Located> {
        let start = self.clock.now();
        loop {
            for (index, strategy) in spec.strategies().iter().enumerate() {
                if let Some(element) = self.matches(strategy, true).await.into_iter().next() {
                    debug!(control = %spec, strategy = %strategy, "located");
                    return Some(Located {
                        element,
                        strategy: index,
                    });
                }
            }

            let elapsed = self.clock.now().saturating_sub(start);
            if elapsed >= timeout {
                debug!(control = %spec, elapsed_ms = elapsed.as_millis() as u64, "not found");
                return None;
            }
            self.clock
                .sleep(self.retry_interval.min(timeout - elapsed))
                .await;
        }
    }

    /// Every match of the first strategy that matches anything, in one pass.
    pub async fn locate_all(&self, spec: &LocatorSpec) -> Vec<ElementRef> {
        for strategy in spec.strategies() {
            let found = self.matches(strategy, false).await;
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Single-pass presence check.
    pub async fn is_present(&self, spec: &LocatorSpec) -> bool {
        self.locate(spec, Duration::ZERO).await.is_some()
    }

    /// Matches of one strategy in endpoint order. Remote failures yield no
    /// matches. With `first_only`, stops at the first accepted candidate.
    async fn matches(&self, strategy: &LocateStrategy, first_only: bool) -> Vec<ElementRef> {
        let by = match strategy {
            LocateStrategy::AccessibilityId(id) => LocateBy::AccessibilityId(id.clone()),
            LocateStrategy::Text { text, partial } => LocateBy::Text {
                text: text.clone(),
                partial: *partial,
            },
            LocateStrategy::ClassFilter { class, .. } => LocateBy::ClassName(class.clone()),
        };

        let candidates = match self.driver.find_elements(&by).await {
            Ok(candidates) => candidates,
            Err(e) => {
                debug!(strategy = %strategy, error = %e, "strategy failed, treating as miss");
                return Vec::new();
            }
        };

        let (attribute, band) = match strategy {
            LocateStrategy::ClassFilter { attribute, band, .. } => (attribute.as_ref(), band.as_ref()),
            _ => (None, None),
        };
        if attribute.is_none() && band.is_none() {
            return if first_only {
                candidates.into_iter().take(1).collect()
            } else {
                candidates
            };
        }

        let mut accepted = Vec::new();
        for candidate in candidates {
            if self.accepts(&candidate, attribute, band).await {
                accepted.push(candidate);
                if first_only {
                    break;
                }
            }
        }
        accepted
    }

    async fn accepts(
        &self,
        candidate: &ElementRef,
        attribute: Option<&AttributeMatch>,
        band: Option<&Band>,
    ) -> bool {
        if let Some(attr) = attribute {
            let mut hit = false;
            for name in &attr.attributes {
                match self.driver.attribute(candidate, name).await {
                    Ok(Some(value)) if attr.text.matches(&value) => {
                        hit = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        trace!(element = %candidate, attribute = %name, error = %e, "attribute read failed");
                    }
                }
            }
            if !hit {
                return false;
            }
        }

        if let Some(band) = band {
            match self.driver.rect(candidate).await {
                Ok(frame) => band.contains_y(frame.y),
                Err(e) => {
                    trace!(element = %candidate, error = %e, "rect read failed");
                    false
                }
            }
        } else {
            true
        }
    }
}
