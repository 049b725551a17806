//! Scenario execution.
//!
//! A [`Scenario`] is one end-to-end check against the app. The
//! [`ScenarioRunner`] gives each scenario a fresh session, a fresh
//! [`Navigator`] and its own evidence directory, turns every error into a
//! failed [`ScenarioOutcome`], and closes the session on every exit path. One
//! scenario failing never stops the rest of the run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use crate::action::{ActionError, Actions};
use crate::clock::Clock;
use crate::config::HarnessConfig;
use crate::driver::{AutomationDriver, DriverError, DriverFactory};
use crate::evidence::{EvidenceStore, ScenarioEvidence};
use crate::navigation::{NavError, Navigator};
use crate::poller::{PollResult, Poller, SnapshotPredicate};
use crate::report::{RunReport, ScenarioOutcome};
use crate::snapshot::UiSnapshot;

/// Errors that end a scenario.
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Navigation(#[from] NavError),

    #[error(transparent)]
    Transport(#[from] DriverError),

    #[error("Evidence I/O failed: {0}")]
    Evidence(#[from] std::io::Error),

    /// Expected evidence never showed up.
    #[error("No {expected} within {deadline_ms}ms")]
    DeadlineExceeded { expected: String, deadline_ms: u64 },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Run cancelled")]
    Cancelled,
}

/// One end-to-end check.
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Stable kebab-case name, used on the command line and for evidence paths.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError>;
}

/// Collects notes while a scenario runs. Consumed by
/// [`finalize`](Self::finalize), so an outcome cannot change afterwards.
#[derive(Debug, Default)]
pub struct OutcomeRecorder {
    notes: Vec<String>,
}

impl OutcomeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn finalize(
        mut self,
        name: &str,
        result: &Result<(), ScenarioError>,
        evidence: Vec<std::path::PathBuf>,
        elapsed: Duration,
    ) -> ScenarioOutcome {
        if let Err(e) = result {
            self.notes.push(e.to_string());
        }
        ScenarioOutcome {
            name: name.to_string(),
            passed: result.is_ok(),
            evidence,
            note: self.notes.join("; "),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Everything a scenario body works with.
pub struct ScenarioContext {
    pub navigator: Navigator,
    pub actions: Arc<Actions>,
    pub poller: Poller,
    pub evidence: ScenarioEvidence,
    pub recorder: OutcomeRecorder,
    pub config: Arc<HarnessConfig>,
    pub cancel: CancellationToken,
}

impl ScenarioContext {
    /// Builds a context bound to `driver`.
    pub fn new(
        driver: Arc<dyn AutomationDriver>,
        clock: Arc<dyn Clock>,
        config: Arc<HarnessConfig>,
        evidence: ScenarioEvidence,
        cancel: CancellationToken,
    ) -> Self {
        let actions = Arc::new(
            Actions::new(driver.clone(), clock.clone())
                .with_settle(config.settle())
                .with_locate_timeout(config.locate_timeout())
                .with_long_press_secs(config.long_press_secs),
        );
        let navigator = Navigator::new(actions.clone(), config.difficulty)
            .with_transition_timeout(config.locate_timeout());
        Self {
            navigator,
            actions,
            poller: Poller::new(driver, clock),
            evidence,
            recorder: OutcomeRecorder::new(),
            config,
            cancel,
        }
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.recorder.note(note);
    }

    /// Screenshot saved as the next numbered artifact.
    pub async fn capture(&mut self, label: &str) -> Result<(), ScenarioError> {
        let png = self.actions.screenshot().await?;
        self.evidence.save_screenshot(label, &png)?;
        Ok(())
    }

    pub fn save_snapshot(&mut self, label: &str, snapshot: &UiSnapshot) -> Result<(), ScenarioError> {
        self.evidence.save_snapshot(label, snapshot)?;
        Ok(())
    }

    /// Best-effort evidence for a failed scenario: a screenshot, or the page
    /// source when the screenshot cannot be taken. Never fails.
    async fn capture_failure(&mut self) {
        let Err(capture_err) = self.capture("failure").await else {
            return;
        };
        warn!(error = %capture_err, "failure screenshot not captured, saving page source");
        match self.actions.snapshot().await {
            Ok(snapshot) => {
                if let Err(e) = self.save_snapshot("failure", &snapshot) {
                    warn!(error = %e, "failure page source not saved");
                }
            }
            Err(e) => warn!(error = %e, "failure page source not read"),
        }
    }

    /// Polls with the configured deadline and interval.
    pub async fn await_evidence(&self, predicate: &dyn SnapshotPredicate) -> PollResult {
        self.poller
            .await_evidence_cancellable(
                predicate,
                self.config.poll_deadline(),
                self.config.poll_interval(),
                &self.cancel,
            )
            .await
    }

    /// Fails with [`ScenarioError::Cancelled`] once the run is cancelled.
    pub fn check_cancelled(&self) -> Result<(), ScenarioError> {
        if self.cancel.is_cancelled() {
            Err(ScenarioError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs scenarios one at a time, each in its own session.
pub struct ScenarioRunner {
    config: Arc<HarnessConfig>,
    factory: Arc<dyn DriverFactory>,
    clock: Arc<dyn Clock>,
    store: EvidenceStore,
    cancel: CancellationToken,
}

impl ScenarioRunner {
    pub fn new(
        config: HarnessConfig,
        factory: Arc<dyn DriverFactory>,
        clock: Arc<dyn Clock>,
        store: EvidenceStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            factory,
            clock,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the run between polls and between scenarios.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn evidence_store(&self) -> &EvidenceStore {
        &self.store
    }

    /// Runs one scenario. Never fails; errors become a failed outcome.
    pub async fn run(&self, scenario: &dyn Scenario) -> ScenarioOutcome {
        let name = scenario.name();
        let span = info_span!("scenario", name);
        async {
            let start = self.clock.now();
            let recorder = OutcomeRecorder::new();

            let evidence = match self.store.scenario(name) {
                Ok(evidence) => evidence,
                Err(e) => {
                    error!(error = %e, "cannot create evidence directory");
                    let result = Err(ScenarioError::Evidence(e));
                    return recorder.finalize(name, &result, Vec::new(), self.elapsed(start));
                }
            };

            if self.cancel.is_cancelled() {
                let result = Err(ScenarioError::Cancelled);
                return recorder.finalize(name, &result, Vec::new(), self.elapsed(start));
            }

            let driver = match self.factory.open().await {
                Ok(driver) => driver,
                Err(e) => {
                    error!(error = %e, "cannot open session");
                    let result = Err(ScenarioError::Transport(e));
                    return recorder.finalize(name, &result, Vec::new(), self.elapsed(start));
                }
            };

            let mut ctx = ScenarioContext::new(
                driver.clone(),
                self.clock.clone(),
                self.config.clone(),
                evidence,
                self.cancel.clone(),
            );
            ctx.recorder = recorder;

            let result = scenario.run(&mut ctx).await;

            match &result {
                Ok(()) => info!("passed"),
                Err(e) => {
                    warn!(error = %e, "failed");
                    ctx.capture_failure().await;
                }
            }
            if result.is_ok() && ctx.evidence.artifacts().is_empty() && ctx.actions.log_len() > 0 {
                if let Err(capture_err) = ctx.capture("final").await {
                    warn!(error = %capture_err, "final screenshot not captured");
                }
            }

            if let Err(e) = ctx.evidence.log_actions(&ctx.actions.take_log()) {
                warn!(error = %e, "action log not written");
            }
            if let Err(e) = driver.close().await {
                warn!(error = %e, "session close failed");
            }

            let ScenarioContext { evidence, recorder, .. } = ctx;
            recorder.finalize(name, &result, evidence.artifacts().to_vec(), self.elapsed(start))
        }
        .instrument(span)
        .await
    }

    /// Runs every scenario in order. A failure never stops the rest.
    pub async fn run_all(&self, scenarios: &[Arc<dyn Scenario>]) -> RunReport {
        let mut report = RunReport::new(self.store.run_dir().to_path_buf());
        for scenario in scenarios {
            let outcome = self.run(scenario.as_ref()).await;
            info!(
                scenario = %outcome.name,
                passed = outcome.passed,
                elapsed_ms = outcome.elapsed_ms,
                "scenario finished"
            );
            report.outcomes.push(outcome);
        }
        report
    }

    fn elapsed(&self, start: Duration) -> Duration {
        self.clock.now().saturating_sub(start)
    }
}
