//! # gridcheck-core
//!
//! Orchestration engine for end-to-end checks of a mobile Sudoku app driven
//! through a W3C WebDriver endpoint (Appium with XCUITest).
//!
//! The engine finds controls through prioritized fallback strategies, drives
//! the app between screens with a probe-and-recover state machine, catches
//! transient overlays (celebrations, the solved banner) by bounded polling,
//! and records screenshots and page-source dumps as evidence for every
//! scenario it runs.
//!
//! ## Modules
//!
//! - [`driver`] - The [`AutomationDriver`](driver::AutomationDriver) seam and its errors
//! - [`webdriver`] - W3C WebDriver over HTTP, the production driver
//! - [`locator`] - Fallback strategies resolving logical controls to elements
//! - [`controls`] - The app's controls as locator specs
//! - [`action`] - Action primitives with settle delays and an action log
//! - [`navigation`] - App state probing and recovery
//! - [`poller`] - Deadline-bounded polling for transient evidence
//! - [`scenario`] / [`scenarios`] - Scenario runner and the scenario catalogue
//! - [`evidence`] - Screenshot and page-source files per scenario
//! - [`bootstrap`] - Check-and-launch for the automation server
//! - [`config`] - Persistent configuration in `~/.gridcheck/`
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gridcheck_core::clock::TokioClock;
//! use gridcheck_core::config::HarnessConfig;
//! use gridcheck_core::evidence::EvidenceStore;
//! use gridcheck_core::scenario::ScenarioRunner;
//! use gridcheck_core::scenarios;
//! use gridcheck_core::webdriver::WebDriverFactory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HarnessConfig::load();
//! let factory = Arc::new(WebDriverFactory::from_config(&config)?);
//! let store = EvidenceStore::create(&config.evidence_dir)?;
//! let runner = ScenarioRunner::new(config, factory, Arc::new(TokioClock::new()), store);
//!
//! let report = runner.run_all(&scenarios::catalog()).await;
//! println!("all passed: {}", report.all_passed());
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod controls;
pub mod driver;
pub mod element;
pub mod evidence;
pub mod locator;
pub mod navigation;
pub mod poller;
pub mod report;
pub mod scenario;
pub mod scenarios;
pub mod snapshot;
pub mod webdriver;
