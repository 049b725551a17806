//! Action primitives and their log.
//!
//! Every user-level interaction goes through [`Actions`]: resolve the target
//! (if there is one), issue exactly one remote command, then wait the settle
//! interval so transition animations finish before the next step. Primitives
//! never retry; a missing control is [`ActionError::NotFound`] and a failed
//! remote call is [`ActionError::Transport`].
//!
//! Each call is recorded as an [`ActionLog`] entry and runs inside a tracing
//! span named after the action.
//!
//! # Example
//!
//! ```
//! use gridcheck_core::action::{ActionLog, ActionResult, ActionType};
//!
//! let action = ActionType::TypeDigit { digit: 7 };
//! let log = ActionLog::new(action, ActionResult::Success, Some(12));
//! assert_eq!(log.action.name(), "type_digit");
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::controls;
use crate::driver::{AutomationDriver, DriverError, ScrollDirection};
use crate::element::{ElementRef, Point, WindowSize};
use crate::locator::{Locator, LocatorSpec};
use crate::snapshot::UiSnapshot;

/// Errors from action primitives.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The target control could not be resolved.
    #[error("Control not found: {0}")]
    NotFound(String),

    /// The remote command failed after the target was resolved.
    #[error(transparent)]
    Transport(#[from] DriverError),
}

/// The result of executing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionResult {
    Success,
    Failure(String),
}

/// An interaction with the app, serialized with a `type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionType {
    /// Tap a logical control.
    Tap { control: String },

    /// Tap at screen coordinates.
    TapAt { x: i32, y: i32 },

    /// Press and hold at screen coordinates.
    LongPress { x: i32, y: i32, duration: f64 },

    /// Tap the number-pad key for a digit.
    TypeDigit { digit: u8 },

    /// Type text into a logical control.
    SendKeys { control: String, text: String },

    Scroll { direction: String },

    Screenshot,

    Snapshot,

    WindowSize,
}

impl ActionType {
    /// Short static name for span metadata.
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Tap { .. } => "tap",
            ActionType::TapAt { .. } => "tap_at",
            ActionType::LongPress { .. } => "long_press",
            ActionType::TypeDigit { .. } => "type_digit",
            ActionType::SendKeys { .. } => "send_keys",
            ActionType::Scroll { .. } => "scroll",
            ActionType::Screenshot => "screenshot",
            ActionType::Snapshot => "snapshot",
            ActionType::WindowSize => "window_size",
        }
    }

    /// Whether the action can change what is on screen.
    pub fn mutates_ui(&self) -> bool {
        !matches!(
            self,
            ActionType::Screenshot | ActionType::Snapshot | ActionType::WindowSize
        )
    }
}

/// A logged action with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub action: ActionType,

    pub result: ActionResult,

    /// Wall time of the remote call plus settle, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ActionLog {
    /// Creates a new entry with a fresh id, timestamped now.
    pub fn new(action: ActionType, result: ActionResult, duration_ms: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            result,
            duration_ms,
        }
    }
}

/// Action primitives bound to one session.
pub struct Actions {
    driver: Arc<dyn AutomationDriver>,
    locator: Locator,
    clock: Arc<dyn Clock>,
    settle: Duration,
    locate_timeout: Duration,
    long_press_secs: f64,
    log: Mutex<Vec<ActionLog>>,
}

impl Actions {
    pub fn new(driver: Arc<dyn AutomationDriver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            locator: Locator::new(driver.clone(), clock.clone()),
            driver,
            clock,
            settle: Duration::from_millis(300),
            locate_timeout: Duration::from_secs(5),
            long_press_secs: 2.5,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
        self.locate_timeout = timeout;
        self
    }

    pub fn with_long_press_secs(mut self, secs: f64) -> Self {
        self.long_press_secs = secs;
        self
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn driver(&self) -> &Arc<dyn AutomationDriver> {
        &self.driver
    }

    pub fn long_press_secs(&self) -> f64 {
        self.long_press_secs
    }

    /// Drains the recorded action log.
    pub fn take_log(&self) -> Vec<ActionLog> {
        std::mem::take(&mut *self.log.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Number of actions recorded since the last [`take_log`](Self::take_log).
    pub fn log_len(&self) -> usize {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn resolve(&self, spec: &LocatorSpec) -> Result<ElementRef, ActionError> {
        self.locator
            .locate(spec, self.locate_timeout)
            .await
            .map(|located| located.element)
            .ok_or_else(|| ActionError::NotFound(spec.name().to_string()))
    }

    async fn run<T, F>(&self, action: ActionType, body: F) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>>,
    {
        let settle = action.mutates_ui();
        self.run_with(action, settle, body).await
    }

    async fn run_with<T, F>(&self, action: ActionType, settle: bool, body: F) -> Result<T, ActionError>
    where
        F: Future<Output = Result<T, ActionError>>,
    {
        let span = info_span!("action", action = action.name(), settle);
        async {
            let start = Instant::now();
            let result = body.await;
            if result.is_ok() && settle {
                self.clock.sleep(self.settle).await;
            }
            let elapsed_ms = start.elapsed().as_millis() as u64;
            let logged = match &result {
                Ok(_) => ActionResult::Success,
                Err(e) => ActionResult::Failure(e.to_string()),
            };
            debug!(elapsed_ms, success = result.is_ok(), "action complete");
            self.log
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(ActionLog::new(action, logged, Some(elapsed_ms)));
            result
        }
        .instrument(span)
        .await
    }

    /// Resolves and taps a control.
    pub async fn tap(&self, spec: &LocatorSpec) -> Result<(), ActionError> {
        let action = ActionType::Tap {
            control: spec.name().to_string(),
        };
        self.run(action, async {
            let element = self.resolve(spec).await?;
            self.driver.click(&element).await?;
            Ok(())
        })
        .await
    }

    /// Taps an already-resolved element. The handle must come from the
    /// current screen.
    pub async fn tap_element(&self, element: &ElementRef, label: &str) -> Result<(), ActionError> {
        let action = ActionType::Tap {
            control: label.to_string(),
        };
        self.run(action, async {
            self.driver.click(element).await?;
            Ok(())
        })
        .await
    }

    pub async fn tap_at(&self, point: Point) -> Result<(), ActionError> {
        let action = ActionType::TapAt {
            x: point.x,
            y: point.y,
        };
        self.run(action, async {
            self.driver.tap_at(point).await?;
            Ok(())
        })
        .await
    }

    /// Press and hold for `duration_secs`, or the configured default.
    pub async fn long_press(&self, point: Point, duration_secs: Option<f64>) -> Result<(), ActionError> {
        let duration = duration_secs.unwrap_or(self.long_press_secs);
        let action = ActionType::LongPress {
            x: point.x,
            y: point.y,
            duration,
        };
        self.run(action, async {
            self.driver.long_press(point, duration).await?;
            Ok(())
        })
        .await
    }

    pub async fn type_digit(&self, digit: u8) -> Result<(), ActionError> {
        let action = ActionType::TypeDigit { digit };
        self.run(action, async {
            let element = self.resolve(&controls::digit(digit)).await?;
            self.driver.click(&element).await?;
            Ok(())
        })
        .await
    }

    /// Taps a control and returns as soon as the remote command is done.
    ///
    /// For taps whose feedback is transient (celebrations, hint fills): the
    /// caller polls right away instead of waiting out the settle interval.
    pub async fn trigger_tap(&self, spec: &LocatorSpec) -> Result<(), ActionError> {
        let action = ActionType::Tap {
            control: spec.name().to_string(),
        };
        self.run_with(action, false, async {
            let element = self.resolve(spec).await?;
            self.driver.click(&element).await?;
            Ok(())
        })
        .await
    }

    /// [`type_digit`](Self::type_digit) without the settle interval.
    pub async fn trigger_digit(&self, digit: u8) -> Result<(), ActionError> {
        let action = ActionType::TypeDigit { digit };
        self.run_with(action, false, async {
            let element = self.resolve(&controls::digit(digit)).await?;
            self.driver.click(&element).await?;
            Ok(())
        })
        .await
    }

    pub async fn send_keys(&self, spec: &LocatorSpec, text: &str) -> Result<(), ActionError> {
        let action = ActionType::SendKeys {
            control: spec.name().to_string(),
            text: text.to_string(),
        };
        self.run(action, async {
            let element = self.resolve(spec).await?;
            self.driver.send_keys(&element, text).await?;
            Ok(())
        })
        .await
    }

    pub async fn scroll(&self, direction: ScrollDirection) -> Result<(), ActionError> {
        let action = ActionType::Scroll {
            direction: direction.as_str().to_string(),
        };
        self.run(action, async {
            self.driver.scroll(direction).await?;
            Ok(())
        })
        .await
    }

    /// PNG bytes of the current screen.
    pub async fn screenshot(&self) -> Result<Vec<u8>, ActionError> {
        self.run(ActionType::Screenshot, async { Ok(self.driver.screenshot().await?) })
            .await
    }

    pub async fn snapshot(&self) -> Result<UiSnapshot, ActionError> {
        self.run(ActionType::Snapshot, async {
            Ok(UiSnapshot::new(self.driver.page_source().await?))
        })
        .await
    }

    pub async fn window_size(&self) -> Result<WindowSize, ActionError> {
        self.run(ActionType::WindowSize, async { Ok(self.driver.window_size().await?) })
            .await
    }
}
