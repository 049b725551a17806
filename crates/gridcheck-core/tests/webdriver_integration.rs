//! Integration tests for the WebDriver HTTP driver against a mock endpoint.

mod common;

use std::time::Duration;

use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use common::{expect_webdriver_call, session_mock, webdriver_error, webdriver_mock};
use gridcheck_core::config::Capabilities;
use gridcheck_core::driver::{AutomationDriver, DriverError, LocateBy, ScrollDirection};
use gridcheck_core::element::{ElementRef, Point};
use gridcheck_core::webdriver::{WebDriverClient, WebDriverSession};

const W3C_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

fn client(url: &str) -> WebDriverClient {
    WebDriverClient::new(url, Duration::from_secs(5)).unwrap()
}

/// Opens session `s1` against `server` with no implicit wait.
async fn open_session(server: &mut ServerGuard) -> WebDriverSession {
    session_mock(server).await;
    client(&server.url())
        .create_session(&Capabilities::default(), 0)
        .await
        .unwrap()
}

// -----------------------------------------------------------------------------
// Client
// -----------------------------------------------------------------------------

#[tokio::test]
async fn status_reachability() {
    let mut up = Server::new_async().await;
    webdriver_mock(&mut up, "GET", "/status", 200, json!({ "ready": true })).await;
    assert!(client(&up.url()).is_reachable().await);

    let mut down = Server::new_async().await;
    webdriver_mock(&mut down, "GET", "/status", 500, webdriver_error("unknown error", "starting")).await;
    assert!(!client(&down.url()).is_reachable().await);
}

#[tokio::test]
async fn nothing_listening_is_unreachable() {
    assert!(!client("http://127.0.0.1:1").is_reachable().await);
}

#[tokio::test]
async fn session_is_created_with_prefixed_capabilities() {
    let mut server = Server::new_async().await;
    let created = server
        .mock("POST", "/session")
        .match_body(Matcher::PartialJson(json!({
            "capabilities": { "alwaysMatch": { "platformName": "iOS", "appium:udid": "SIM-1" } }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": { "sessionId": "s1", "capabilities": {} } }).to_string())
        .expect(1)
        .create_async()
        .await;
    let timeouts = expect_webdriver_call(&mut server, "POST", "/session/s1/timeouts", 0).await;

    let caps = Capabilities {
        udid: Some("SIM-1".into()),
        ..Capabilities::default()
    };
    let session = client(&server.url()).create_session(&caps, 0).await.unwrap();
    assert_eq!(session.session_id(), "s1");

    created.assert_async().await;
    timeouts.assert_async().await;
}

#[tokio::test]
async fn implicit_wait_is_applied_when_set() {
    let mut server = Server::new_async().await;
    session_mock(&mut server).await;
    let timeouts = server
        .mock("POST", "/session/s1/timeouts")
        .match_body(Matcher::Json(json!({ "implicit": 5000 })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": null }).to_string())
        .expect(1)
        .create_async()
        .await;

    client(&server.url())
        .create_session(&Capabilities::default(), 5000)
        .await
        .unwrap();
    timeouts.assert_async().await;
}

#[tokio::test]
async fn rejected_implicit_wait_releases_the_session() {
    let mut server = Server::new_async().await;
    session_mock(&mut server).await;
    webdriver_mock(
        &mut server,
        "POST",
        "/session/s1/timeouts",
        500,
        webdriver_error("unknown error", "timeouts unsupported"),
    )
    .await;
    let deleted = expect_webdriver_call(&mut server, "DELETE", "/session/s1", 1).await;

    let err = client(&server.url())
        .create_session(&Capabilities::default(), 5000)
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Endpoint { ref message, .. } if message == "timeouts unsupported"));
    deleted.assert_async().await;
}

#[tokio::test]
async fn session_error_payload_surfaces() {
    let mut server = Server::new_async().await;
    webdriver_mock(&mut server, "POST", "/session", 500, webdriver_error("session not created", "no device")).await;

    let err = client(&server.url())
        .create_session(&Capabilities::default(), 0)
        .await
        .unwrap_err();
    match err {
        DriverError::Endpoint { error, message } => {
            assert_eq!(error, "session not created");
            assert_eq!(message, "no device");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

// -----------------------------------------------------------------------------
// Session commands
// -----------------------------------------------------------------------------

#[tokio::test]
async fn find_elements_reads_both_key_styles() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;
    let lookup = server
        .mock("POST", "/session/s1/elements")
        .match_body(Matcher::Json(json!({ "using": "accessibility id", "value": "New Game" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": [ { W3C_KEY: "el-1" }, { "ELEMENT": "el-2" } ] }).to_string())
        .create_async()
        .await;

    let found = session
        .find_elements(&LocateBy::AccessibilityId("New Game".into()))
        .await
        .unwrap();
    assert_eq!(found, vec![ElementRef::new("el-1"), ElementRef::new("el-2")]);
    lookup.assert_async().await;
}

#[tokio::test]
async fn no_such_element_is_an_empty_list() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;
    webdriver_mock(
        &mut server,
        "POST",
        "/session/s1/elements",
        404,
        webdriver_error("no such element", "not found"),
    )
    .await;

    let found = session
        .find_elements(&LocateBy::AccessibilityId("missing".into()))
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn text_lookup_uses_predicate_string() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;
    let lookup = server
        .mock("POST", "/session/s1/elements")
        .match_body(Matcher::Json(json!({
            "using": "-ios predicate string",
            "value": "label CONTAINS 'Hint' OR name CONTAINS 'Hint'"
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": [] }).to_string())
        .create_async()
        .await;

    let found = session
        .find_elements(&LocateBy::Text {
            text: "Hint".into(),
            partial: true,
        })
        .await
        .unwrap();
    assert!(found.is_empty());
    lookup.assert_async().await;
}

#[tokio::test]
async fn element_queries() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;
    webdriver_mock(&mut server, "GET", "/session/s1/element/el-1/attribute/name", 200, json!("New Game")).await;
    webdriver_mock(&mut server, "GET", "/session/s1/element/el-1/attribute/value", 200, json!(1)).await;
    webdriver_mock(&mut server, "GET", "/session/s1/element/el-1/attribute/hint", 200, json!(null)).await;
    webdriver_mock(
        &mut server,
        "GET",
        "/session/s1/element/el-1/rect",
        200,
        json!({ "x": 12.0, "y": 108.0, "width": 42.0, "height": 42.0 }),
    )
    .await;
    webdriver_mock(
        &mut server,
        "GET",
        "/session/s1/window/rect",
        200,
        json!({ "x": 0, "y": 0, "width": 402, "height": 874 }),
    )
    .await;
    webdriver_mock(&mut server, "GET", "/session/s1/source", 200, json!("<AppiumAUT/>")).await;
    // "PNG" in base64.
    webdriver_mock(&mut server, "GET", "/session/s1/screenshot", 200, json!("UE5H")).await;

    let el = ElementRef::new("el-1");
    assert_eq!(session.attribute(&el, "name").await.unwrap().as_deref(), Some("New Game"));
    assert_eq!(session.attribute(&el, "value").await.unwrap().as_deref(), Some("1"));
    assert_eq!(session.attribute(&el, "hint").await.unwrap(), None);

    let frame = session.rect(&el).await.unwrap();
    assert_eq!((frame.x, frame.y, frame.width, frame.height), (12.0, 108.0, 42.0, 42.0));

    let size = session.window_size().await.unwrap();
    assert_eq!((size.width, size.height), (402, 874));
    assert_eq!(session.page_source().await.unwrap(), "<AppiumAUT/>");
    assert_eq!(session.screenshot().await.unwrap(), b"PNG".to_vec());
}

#[tokio::test]
async fn stale_click_is_endpoint_error() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;
    webdriver_mock(&mut server, "POST", "/session/s1/element/el-1/click", 200, json!(null)).await;
    webdriver_mock(
        &mut server,
        "POST",
        "/session/s1/element/gone/click",
        404,
        webdriver_error("stale element reference", "detached"),
    )
    .await;

    session.click(&ElementRef::new("el-1")).await.unwrap();
    let err = session.click(&ElementRef::new("gone")).await.unwrap_err();
    assert!(matches!(err, DriverError::Endpoint { ref error, .. } if error == "stale element reference"));
}

#[tokio::test]
async fn gestures_go_through_mobile_commands() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;

    let mut scripts = Vec::new();
    for body in [
        json!({ "script": "mobile: tap", "args": [ { "x": 10, "y": 20 } ] }),
        json!({ "script": "mobile: touchAndHold", "args": [ { "x": 201, "y": 291, "duration": 2.5 } ] }),
        json!({ "script": "mobile: scroll", "args": [ { "direction": "down" } ] }),
    ] {
        let mock = server
            .mock("POST", "/session/s1/execute/sync")
            .match_body(Matcher::Json(body))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "value": null }).to_string())
            .expect(1)
            .create_async()
            .await;
        scripts.push(mock);
    }

    session.tap_at(Point::new(10, 20)).await.unwrap();
    session.long_press(Point::new(201, 291), 2.5).await.unwrap();
    session.scroll(ScrollDirection::Down).await.unwrap();

    for mock in &scripts {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn close_is_idempotent_and_final() {
    let mut server = Server::new_async().await;
    let session = open_session(&mut server).await;
    let deleted = expect_webdriver_call(&mut server, "DELETE", "/session/s1", 1).await;

    session.close().await.unwrap();
    session.close().await.unwrap();
    deleted.assert_async().await;

    let err = session.page_source().await.unwrap_err();
    assert!(matches!(err, DriverError::NoSession));
}
