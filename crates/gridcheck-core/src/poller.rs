//! Bounded polling for transient UI evidence.
//!
//! Celebrations and end-of-game overlays appear and vanish on their own, so
//! scenarios cannot assert them with a single look. The [`Poller`] snapshots
//! the page source repeatedly until a [`SnapshotPredicate`] holds or a
//! deadline passes.
//!
//! The first snapshot is taken immediately. Between polls the poller sleeps
//! `min(interval, remaining)`, so the total elapsed time overshoots the
//! deadline by at most one interval plus one snapshot call. Expiry is a normal
//! result (`matched == false`), never an error.
//!
//! # Example
//!
//! ```
//! use gridcheck_core::poller::{Markers, SnapshotPredicate, WIN_MARKERS};
//! use gridcheck_core::snapshot::UiSnapshot;
//!
//! let won = Markers::any_of(WIN_MARKERS);
//! assert!(won.matches(&UiSnapshot::new("<XCUIElementTypeStaticText label=\"SUDOKU SOLVED!\"/>")));
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};

use crate::clock::Clock;
use crate::driver::AutomationDriver;
use crate::snapshot::UiSnapshot;

/// Row, column and box celebration markers.
pub const CELEBRATION_MARKERS: &[&str] = &[
    "Complete",
    "🎉",
    "Row Complete!",
    "Column Complete!",
    "Box Complete!",
    "Nice Row!",
];

/// Markers of the puzzle-solved overlay. See also [`shows_win`].
pub const WIN_MARKERS: &[&str] = &["SOLVED", "🏆", "SUDOKU SOLVED!"];

/// Markers of the game-over overlay.
pub const LOSS_MARKERS: &[&str] = &["GAME OVER", "TOO MANY MISTAKES"];

/// A condition evaluated against one snapshot.
pub trait SnapshotPredicate: Send + Sync {
    fn matches(&self, snapshot: &UiSnapshot) -> bool;

    /// Short description for logs and outcome notes.
    fn describe(&self) -> String;
}

/// Any of the given strings appears in the page source.
#[derive(Debug, Clone)]
pub struct Markers(Vec<String>);

impl Markers {
    pub fn any_of(markers: &[&str]) -> Self {
        Self(markers.iter().map(|m| m.to_string()).collect())
    }
}

impl SnapshotPredicate for Markers {
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        self.0.iter().any(|m| snapshot.contains(m))
    }

    fn describe(&self) -> String {
        format!("any of {:?}", self.0)
    }
}

/// A node named or labelled `name` is present.
#[derive(Debug, Clone)]
pub struct ElementPresent(pub String);

impl SnapshotPredicate for ElementPresent {
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        snapshot.has_element(&self.0)
    }

    fn describe(&self) -> String {
        format!("'{}' present", self.0)
    }
}

/// No node is named or labelled `name`.
#[derive(Debug, Clone)]
pub struct ElementAbsent(pub String);

impl SnapshotPredicate for ElementAbsent {
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        !snapshot.has_element(&self.0)
    }

    fn describe(&self) -> String {
        format!("'{}' absent", self.0)
    }
}

pub struct Not(pub Box<dyn SnapshotPredicate>);

impl SnapshotPredicate for Not {
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        !self.0.matches(snapshot)
    }

    fn describe(&self) -> String {
        format!("not ({})", self.0.describe())
    }
}

/// Every inner predicate holds. Empty means always true.
pub struct All(pub Vec<Box<dyn SnapshotPredicate>>);

impl SnapshotPredicate for All {
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        self.0.iter().all(|p| p.matches(snapshot))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|p| p.describe()).collect();
        parts.join(" and ")
    }
}

/// An arbitrary closure over the snapshot.
pub struct FnPredicate<F> {
    description: String,
    f: F,
}

impl<F> FnPredicate<F>
where
    F: Fn(&UiSnapshot) -> bool + Send + Sync,
{
    pub fn new(description: impl Into<String>, f: F) -> Self {
        Self {
            description: description.into(),
            f,
        }
    }
}

impl<F> SnapshotPredicate for FnPredicate<F>
where
    F: Fn(&UiSnapshot) -> bool + Send + Sync,
{
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        (self.f)(snapshot)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

/// How a game stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEnd {
    /// The solved overlay is showing.
    Solved,
    /// The game-over overlay is showing.
    Lost,
    /// The main menu came back without any win marker.
    ReturnedToMenu,
}

fn won_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bwon\b").expect("valid win pattern"))
}

/// True if the solved overlay shows: a [`WIN_MARKERS`] entry, or "won" as a
/// whole word in any case.
pub fn shows_win(snapshot: &UiSnapshot) -> bool {
    snapshot.contains_any(WIN_MARKERS) || won_pattern().is_match(&snapshot.source)
}

/// Classifies a snapshot as a game end, if it is one. A win marker takes
/// precedence over everything else.
pub fn classify_game_end(snapshot: &UiSnapshot) -> Option<GameEnd> {
    if shows_win(snapshot) {
        Some(GameEnd::Solved)
    } else if snapshot.contains_any(LOSS_MARKERS) {
        Some(GameEnd::Lost)
    } else if snapshot.has_element("New Game") {
        Some(GameEnd::ReturnedToMenu)
    } else {
        None
    }
}

/// Matches once the game has ended in any way.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameEnded;

impl SnapshotPredicate for GameEnded {
    fn matches(&self, snapshot: &UiSnapshot) -> bool {
        classify_game_end(snapshot).is_some()
    }

    fn describe(&self) -> String {
        "game ended".to_string()
    }
}

/// Outcome of one polling run.
#[derive(Debug, Clone)]
pub struct PollResult {
    pub matched: bool,
    /// The matching snapshot, or the last one taken if nothing matched.
    pub evidence: Option<UiSnapshot>,
    pub elapsed: Duration,
    pub polls: u32,
}

/// Polls the page source of one session.
pub struct Poller {
    driver: Arc<dyn AutomationDriver>,
    clock: Arc<dyn Clock>,
}

impl Poller {
    pub fn new(driver: Arc<dyn AutomationDriver>, clock: Arc<dyn Clock>) -> Self {
        Self { driver, clock }
    }

    /// Polls until `predicate` holds or `deadline` passes.
    pub async fn await_evidence(
        &self,
        predicate: &dyn SnapshotPredicate,
        deadline: Duration,
        interval: Duration,
    ) -> PollResult {
        self.await_evidence_cancellable(predicate, deadline, interval, &CancellationToken::new())
            .await
    }

    /// Like [`await_evidence`](Self::await_evidence), but stops early when
    /// `cancel` fires. A cancelled run reports `matched == false`.
    pub async fn await_evidence_cancellable(
        &self,
        predicate: &dyn SnapshotPredicate,
        deadline: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> PollResult {
        let span = debug_span!("poll", predicate = %predicate.describe());
        async {
            let interval = interval.max(Duration::from_millis(1));
            let start = self.clock.now();
            let mut polls = 0u32;
            let mut last = None;

            loop {
                if cancel.is_cancelled() {
                    debug!(polls, "poll cancelled");
                    break;
                }

                polls += 1;
                match self.driver.page_source().await {
                    Ok(source) => {
                        let snapshot = UiSnapshot::new(source);
                        if predicate.matches(&snapshot) {
                            let elapsed = self.clock.now().saturating_sub(start);
                            debug!(polls, elapsed_ms = elapsed.as_millis() as u64, "predicate matched");
                            return PollResult {
                                matched: true,
                                evidence: Some(snapshot),
                                elapsed,
                                polls,
                            };
                        }
                        last = Some(snapshot);
                    }
                    Err(e) => debug!(error = %e, "snapshot failed, counting as miss"),
                }

                let elapsed = self.clock.now().saturating_sub(start);
                if elapsed >= deadline {
                    break;
                }
                let wait = interval.min(deadline - elapsed);
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(polls, "poll cancelled");
                        break;
                    }
                    _ = self.clock.sleep(wait) => {}
                }
            }

            let elapsed = self.clock.now().saturating_sub(start);
            debug!(polls, elapsed_ms = elapsed.as_millis() as u64, "deadline reached without match");
            PollResult {
                matched: false,
                evidence: last,
                elapsed,
                polls,
            }
        }
        .instrument(span)
        .await
    }
}
