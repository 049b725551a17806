//! [`AutomationDriver`] implementation backed by a W3C WebDriver endpoint.
//!
//! This module provides [`WebDriverClient`], which talks to an Appium server
//! over HTTP/JSON, and [`WebDriverSession`], one open session against the app
//! under test. Gestures that WebDriver has no first-class command for (tap at a
//! point, touch-and-hold, scroll) go through the XCUITest `mobile:` script
//! extensions.
//!
//! # Example
//!
//! ```no_run
//! use gridcheck_core::config::Capabilities;
//! use gridcheck_core::driver::AutomationDriver;
//! use gridcheck_core::webdriver::WebDriverClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WebDriverClient::new("http://127.0.0.1:4723", std::time::Duration::from_secs(30))?;
//! let session = client.create_session(&Capabilities::default(), 0).await?;
//! let source = session.page_source().await?;
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::config::{Capabilities, HarnessConfig};
use crate::driver::{AutomationDriver, DriverError, DriverFactory, LocateBy, ScrollDirection};
use crate::element::{ElementFrame, ElementRef, Point, WindowSize};

/// W3C element identifier key.
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Legacy JSON-wire element identifier key, still emitted by some servers.
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// Unwraps the `value` member of a WebDriver response, turning error payloads
/// into [`DriverError::Endpoint`].
fn unwrap_value(status: StatusCode, body: Value) -> Result<Value, DriverError> {
    let value = match body {
        Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
        other => {
            return Err(DriverError::MalformedResponse(format!(
                "expected object, got {other}"
            )))
        }
    };

    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(DriverError::Endpoint {
            error: error.to_string(),
            message,
        });
    }

    if !status.is_success() {
        return Err(DriverError::Endpoint {
            error: status.to_string(),
            message: value.to_string(),
        });
    }

    Ok(value)
}

fn element_id(value: &Value) -> Option<ElementRef> {
    value
        .get(W3C_ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(ElementRef::new)
}

fn attribute_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn number(value: &Value, key: &str) -> Result<f64, DriverError> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| DriverError::MalformedResponse(format!("missing numeric '{key}' in {value}")))
}

fn is_no_such_element(err: &DriverError) -> bool {
    matches!(err, DriverError::Endpoint { error, .. } if error == "no such element")
}

// ---------------------------------------------------------------------------
// WebDriverClient
// ---------------------------------------------------------------------------

/// HTTP client for a WebDriver endpoint, used to probe it and open sessions.
#[derive(Debug, Clone)]
pub struct WebDriverClient {
    base_url: String,
    http: reqwest::Client,
}

impl WebDriverClient {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, DriverError> {
        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| DriverError::MalformedResponse(format!("{method} {path}: {e}")))?;
        unwrap_value(status, body)
    }

    /// Returns true if `GET /status` answers successfully.
    pub async fn is_reachable(&self) -> bool {
        match self.send(Method::GET, "/status", None).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, endpoint = %self.base_url, "status check failed");
                false
            }
        }
    }

    /// Opens a new session with the given capabilities.
    ///
    /// When `implicit_wait_ms` is non-zero it is applied to the session so the
    /// endpoint waits that long before reporting an element as absent.
    #[instrument(skip(self, capabilities), fields(endpoint = %self.base_url))]
    pub async fn create_session(
        &self,
        capabilities: &Capabilities,
        implicit_wait_ms: u64,
    ) -> Result<WebDriverSession, DriverError> {
        let value = self.send(Method::POST, "/session", Some(capabilities.to_w3c())).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::MalformedResponse(format!("no sessionId in {value}")))?
            .to_string();
        info!(session_id = %session_id, "automation session opened");

        let session = WebDriverSession {
            client: self.clone(),
            session_id,
            closed: AtomicBool::new(false),
        };
        if implicit_wait_ms > 0 {
            if let Err(e) = session
                .command(Method::POST, "/timeouts", Some(json!({ "implicit": implicit_wait_ms })))
                .await
            {
                warn!(error = %e, "implicit wait rejected, closing session");
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "session close failed");
                }
                return Err(e);
            }
        }
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// WebDriverSession
// ---------------------------------------------------------------------------

/// One open WebDriver session.
#[derive(Debug)]
pub struct WebDriverSession {
    client: WebDriverClient,
    session_id: String,
    closed: AtomicBool,
}

impl WebDriverSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DriverError::NoSession);
        }
        let full = format!("/session/{}{}", self.session_id, path);
        self.client.send(method, &full, body).await
    }

    async fn execute_mobile(&self, script: &str, args: Value) -> Result<Value, DriverError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": [args] })),
        )
        .await
    }
}

#[async_trait]
impl AutomationDriver for WebDriverSession {
    async fn find_elements(&self, by: &LocateBy) -> Result<Vec<ElementRef>, DriverError> {
        let (using, value) = by.to_webdriver();
        let found = match self
            .command(Method::POST, "/elements", Some(json!({ "using": using, "value": value })))
            .await
        {
            Ok(found) => found,
            Err(e) if is_no_such_element(&e) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let list = found
            .as_array()
            .ok_or_else(|| DriverError::MalformedResponse(format!("expected element list, got {found}")))?;
        Ok(list.iter().filter_map(element_id).collect())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        let path = format!("/element/{}/attribute/{}", element.id(), name);
        Ok(attribute_string(self.command(Method::GET, &path, None).await?))
    }

    async fn rect(&self, element: &ElementRef) -> Result<ElementFrame, DriverError> {
        let path = format!("/element/{}/rect", element.id());
        let value = self.command(Method::GET, &path, None).await?;
        Ok(ElementFrame {
            x: number(&value, "x")?,
            y: number(&value, "y")?,
            width: number(&value, "width")?,
            height: number(&value, "height")?,
        })
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        let path = format!("/element/{}/click", element.id());
        self.command(Method::POST, &path, Some(json!({}))).await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        let path = format!("/element/{}/value", element.id());
        self.command(Method::POST, &path, Some(json!({ "text": text }))).await?;
        Ok(())
    }

    async fn tap_at(&self, point: Point) -> Result<(), DriverError> {
        self.execute_mobile("mobile: tap", json!({ "x": point.x, "y": point.y })).await?;
        Ok(())
    }

    async fn long_press(&self, point: Point, duration_secs: f64) -> Result<(), DriverError> {
        self.execute_mobile(
            "mobile: touchAndHold",
            json!({ "x": point.x, "y": point.y, "duration": duration_secs }),
        )
        .await?;
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<(), DriverError> {
        self.execute_mobile("mobile: scroll", json!({ "direction": direction.as_str() })).await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        let value = self.command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::MalformedResponse("page source is not a string".to_string()))
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        let value = self.command(Method::GET, "/window/rect", None).await?;
        Ok(WindowSize {
            width: number(&value, "width")? as i32,
            height: number(&value, "height")? as i32,
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        let value = self.command(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::MalformedResponse("screenshot is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| DriverError::MalformedResponse(format!("screenshot is not base64: {e}")))
    }

    async fn close(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let path = format!("/session/{}", self.session_id);
        match self.client.send(Method::DELETE, &path, None).await {
            Ok(_) => {
                info!(session_id = %self.session_id, "automation session closed");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "failed to close session");
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// WebDriverFactory
// ---------------------------------------------------------------------------

/// Opens a fresh [`WebDriverSession`] per call.
pub struct WebDriverFactory {
    client: WebDriverClient,
    capabilities: Capabilities,
    implicit_wait_ms: u64,
}

impl WebDriverFactory {
    pub fn new(client: WebDriverClient, capabilities: Capabilities, implicit_wait_ms: u64) -> Self {
        Self {
            client,
            capabilities,
            implicit_wait_ms,
        }
    }

    /// Builds a factory from the harness configuration.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, DriverError> {
        let client = WebDriverClient::new(&config.endpoint, config.request_timeout())?;
        Ok(Self::new(client, config.capabilities.clone(), config.implicit_wait_ms))
    }

    pub fn client(&self) -> &WebDriverClient {
        &self.client
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn open(&self) -> Result<Arc<dyn AutomationDriver>, DriverError> {
        let session = self
            .client
            .create_session(&self.capabilities, self.implicit_wait_ms)
            .await?;
        Ok(Arc::new(session))
    }
}
