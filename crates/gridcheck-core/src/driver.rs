//! Automation driver trait for backend-agnostic UI automation.
//!
//! This module defines the [`AutomationDriver`] trait, the single seam between
//! the orchestration engine and the remote automation endpoint. The production
//! implementation is [`WebDriverSession`](crate::webdriver::WebDriverSession),
//! which speaks W3C WebDriver over HTTP to an Appium server; tests substitute a
//! scripted in-memory app.
//!
//! Sessions are opened through a [`DriverFactory`], so the scenario runner can
//! acquire a fresh session per scenario and release it on every exit path.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::element::{ElementFrame, ElementRef, Point, WindowSize};

/// Errors that can occur while talking to the automation endpoint.
///
/// Every variant is a transport-level failure from the harness's point of
/// view. "Element not found" is not represented here: locate calls return an
/// empty list instead.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a WebDriver error payload.
    #[error("{error}: {message}")]
    Endpoint {
        /// WebDriver error code, e.g. `stale element reference`.
        error: String,
        /// Human-readable detail from the endpoint.
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The session was already closed.
    #[error("No active automation session")]
    NoSession,

    /// An operation timed out.
    #[error("Operation timed out")]
    Timeout,

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriverError::Timeout
        } else {
            DriverError::Http(err.to_string())
        }
    }
}

/// How an element is looked up on the endpoint.
///
/// These map onto WebDriver locator strategies: accessibility id, class name,
/// and an iOS predicate string for text matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocateBy {
    /// Match the accessibility identifier exactly.
    AccessibilityId(String),
    /// Match every element of a control class, e.g. `XCUIElementTypeButton`.
    ClassName(String),
    /// Match elements whose label or name contains (or equals) the text.
    Text {
        /// The text to look for.
        text: String,
        /// Substring match when true, exact match otherwise.
        partial: bool,
    },
}

impl LocateBy {
    /// The WebDriver `using` value and query string for this strategy.
    pub fn to_webdriver(&self) -> (&'static str, String) {
        match self {
            LocateBy::AccessibilityId(id) => ("accessibility id", id.clone()),
            LocateBy::ClassName(class) => ("class name", class.clone()),
            LocateBy::Text { text, partial } => {
                let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
                let query = if *partial {
                    format!("label CONTAINS '{escaped}' OR name CONTAINS '{escaped}'")
                } else {
                    format!("label == '{escaped}' OR name == '{escaped}'")
                };
                ("-ios predicate string", query)
            }
        }
    }
}

impl fmt::Display for LocateBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateBy::AccessibilityId(id) => write!(f, "id={id}"),
            LocateBy::ClassName(class) => write!(f, "class={class}"),
            LocateBy::Text { text, partial: true } => write!(f, "text~={text}"),
            LocateBy::Text { text, partial: false } => write!(f, "text={text}"),
        }
    }
}

/// Direction for scroll gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        }
    }
}

/// Trait for backend-agnostic UI automation against one app session.
///
/// Implementors expose the remote commands the harness needs. None of them
/// retry; retry policy belongs to the locator, the navigator and scenarios.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    /// Return every element matching `by`. An empty vector means "not found".
    async fn find_elements(&self, by: &LocateBy) -> Result<Vec<ElementRef>, DriverError>;

    /// Read one attribute of a resolved element.
    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError>;

    /// Read the on-screen frame of a resolved element.
    async fn rect(&self, element: &ElementRef) -> Result<ElementFrame, DriverError>;

    /// Tap a resolved element.
    async fn click(&self, element: &ElementRef) -> Result<(), DriverError>;

    /// Type text into a resolved element.
    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError>;

    /// Tap at screen coordinates.
    async fn tap_at(&self, point: Point) -> Result<(), DriverError>;

    /// Press and hold at screen coordinates for `duration_secs` seconds.
    async fn long_press(&self, point: Point, duration_secs: f64) -> Result<(), DriverError>;

    /// Scroll the frontmost scrollable view.
    async fn scroll(&self, direction: ScrollDirection) -> Result<(), DriverError>;

    /// Dump the full accessibility tree as the endpoint renders it.
    async fn page_source(&self) -> Result<String, DriverError>;

    /// Size of the application window.
    async fn window_size(&self) -> Result<WindowSize, DriverError>;

    /// Capture a PNG screenshot.
    async fn screenshot(&self) -> Result<Vec<u8>, DriverError>;

    /// Close the remote session. Further calls fail with [`DriverError::NoSession`].
    async fn close(&self) -> Result<(), DriverError>;
}

/// Opens automation sessions.
///
/// The runner asks for a new session at the start of every scenario.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn AutomationDriver>, DriverError>;
}
