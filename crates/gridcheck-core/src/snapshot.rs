//! Point-in-time UI snapshots.
//!
//! A [`UiSnapshot`] wraps one page-source dump. Marker checks run against the
//! raw text; element queries parse the `XCUIElementType*` nodes on demand.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::element::{ElementFrame, Point, UIElement};

fn node_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<(XCUIElementType\w+)\b([^>]*?)/?>").expect("valid node pattern"))
}

fn attr_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"([A-Za-z_][\w-]*)="([^"]*)""#).expect("valid attribute pattern"))
}

fn unescape(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// One page-source dump and when it was taken.
#[derive(Debug, Clone)]
pub struct UiSnapshot {
    pub source: String,
    pub captured_at: DateTime<Utc>,
}

impl UiSnapshot {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            captured_at: Utc::now(),
        }
    }

    /// True if `marker` appears anywhere in the dump, raw or XML-escaped.
    pub fn contains(&self, marker: &str) -> bool {
        self.source.contains(marker) || self.source.contains(&escape(marker))
    }

    pub fn contains_any(&self, markers: &[&str]) -> bool {
        markers.iter().any(|m| self.contains(m))
    }

    /// The first marker from `markers` present in the dump.
    pub fn first_marker<'a>(&self, markers: &[&'a str]) -> Option<&'a str> {
        markers.iter().copied().find(|m| self.contains(m))
    }

    /// Every `XCUIElementType*` node in document order.
    pub fn elements(&self) -> Vec<UIElement> {
        node_pattern()
            .captures_iter(&self.source)
            .map(|caps| {
                let mut element = UIElement {
                    element_type: caps[1].to_string(),
                    name: None,
                    label: None,
                    value: None,
                    frame: None,
                    visible: true,
                };
                let mut frame = ElementFrame::default();
                let mut has_frame = false;
                for attr in attr_pattern().captures_iter(&caps[2]) {
                    let value = unescape(&attr[2]);
                    match &attr[1] {
                        "name" => element.name = Some(value),
                        "label" => element.label = Some(value),
                        "value" => element.value = Some(value),
                        "visible" => element.visible = value != "false",
                        "x" | "y" | "width" | "height" => {
                            if let Ok(n) = value.parse::<f64>() {
                                has_frame = true;
                                match &attr[1] {
                                    "x" => frame.x = n,
                                    "y" => frame.y = n,
                                    "width" => frame.width = n,
                                    _ => frame.height = n,
                                }
                            }
                        }
                        _ => {}
                    }
                }
                if has_frame {
                    element.frame = Some(frame);
                }
                element
            })
            .collect()
    }

    /// True if a node's name or label equals `name`.
    pub fn has_element(&self, name: &str) -> bool {
        self.elements().iter().any(|e| e.is_named(name))
    }

    /// Grid cells that hold no digit.
    pub fn empty_cells(&self) -> Vec<UIElement> {
        self.elements()
            .into_iter()
            .filter(|e| e.element_type == crate::controls::BUTTON && e.is_named(" "))
            .collect()
    }

    /// The topmost visible button whose frame contains `point`.
    pub fn button_at(&self, point: Point) -> Option<UIElement> {
        self.elements()
            .into_iter()
            .filter(|e| e.element_type == crate::controls::BUTTON && e.visible)
            .filter(|e| e.frame.is_some_and(|f| f.contains(point)))
            .last()
    }

    /// True if the button at `point` shows no digit. Works when blank cells
    /// carry no usable name.
    pub fn blank_cell_at(&self, point: Point) -> bool {
        self.button_at(point).is_some_and(|cell| {
            [cell.name.as_deref(), cell.label.as_deref()]
                .into_iter()
                .flatten()
                .all(|text| !text.chars().any(|c| c.is_ascii_digit()))
        })
    }
}
