//! UI element types for accessibility-based automation.
//!
//! Two kinds of element data flow through the harness:
//!
//! - [`ElementRef`] is the opaque handle the automation endpoint hands back
//!   from a locate call. It is only meaningful for the UI snapshot it was
//!   resolved against and must not be held across navigation.
//! - [`UIElement`] is a parsed node from a page-source dump, carrying the
//!   attributes the locator and the scenario predicates inspect.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a live element on the device.
///
/// Owned transiently by whoever resolved it; the endpoint may invalidate it as
/// soon as the screen changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The endpoint-assigned element id.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The frame (position and dimensions) of a UI element.
///
/// Coordinates are in screen points, with the origin at the top-left
/// corner of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ElementFrame {
    /// The x-coordinate of the element's top-left corner.
    pub x: f64,
    /// The y-coordinate of the element's top-left corner.
    pub y: f64,
    /// The width of the element in points.
    pub width: f64,
    /// The height of the element in points.
    pub height: f64,
}

impl ElementFrame {
    /// Center point of the frame, rounded to whole screen points.
    pub fn center(&self) -> Point {
        Point {
            x: (self.x + self.width / 2.0).round() as i32,
            y: (self.y + self.height / 2.0).round() as i32,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        let (px, py) = (point.x as f64, point.y as f64);
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

/// A screen coordinate in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Size of the application window in points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: i32,
    pub height: i32,
}

impl WindowSize {
    /// A point at the given fractions of the window's width and height.
    pub fn fraction(&self, fx: f64, fy: f64) -> Point {
        Point {
            x: (self.width as f64 * fx) as i32,
            y: (self.height as f64 * fy) as i32,
        }
    }
}

/// A node parsed from the page-source dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    /// Control class, e.g. `XCUIElementTypeButton`.
    #[serde(rename = "type")]
    pub element_type: String,

    /// Accessibility identifier (`name` attribute).
    #[serde(default)]
    pub name: Option<String>,

    /// Accessibility label, typically the user-visible text.
    #[serde(default)]
    pub label: Option<String>,

    /// Current value, e.g. `"1"` for an enabled switch.
    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub frame: Option<ElementFrame>,

    #[serde(default = "default_true")]
    pub visible: bool,
}

fn default_true() -> bool {
    true
}

impl UIElement {
    /// Looks up an attribute by its WebDriver attribute name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match name {
            "name" => self.name.as_deref(),
            "label" => self.label.as_deref(),
            "value" => self.value.as_deref(),
            "type" => Some(self.element_type.as_str()),
            _ => None,
        }
    }

    /// True if either the identifier or the label equals `text`.
    pub fn is_named(&self, text: &str) -> bool {
        self.name.as_deref() == Some(text) || self.label.as_deref() == Some(text)
    }
}
