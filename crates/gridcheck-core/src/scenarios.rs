//! The scenario catalogue.
//!
//! | name | checks |
//! |---|---|
//! | `main-menu` | menu landmarks are present |
//! | `start-game` | a new game shows the in-game controls |
//! | `settings-celebrations` | settings has a celebrations toggle |
//! | `pause-menu` | the pause menu offers resume and quit |
//! | `hint-fills-cell` | one hint fills exactly one cell |
//! | `row-celebration` | completing a row celebrates |
//! | `win-celebration` | solving the puzzle shows the solved overlay |
//! | `hint-celebration` | hinting through a game celebrates at least once |

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::action::ActionError;
use crate::controls::{self, Difficulty, ROW_ONE_BAND};
use crate::driver::ScrollDirection;
use crate::locator::LocatorSpec;
use crate::navigation::AppState;
use crate::poller::{
    classify_game_end, FnPredicate, GameEnd, GameEnded, Markers, SnapshotPredicate,
    CELEBRATION_MARKERS, LOSS_MARKERS,
};
use crate::scenario::{Scenario, ScenarioContext, ScenarioError};
use crate::snapshot::UiSnapshot;

/// Every scenario, in the default run order.
pub fn catalog() -> Vec<Arc<dyn Scenario>> {
    vec![
        Arc::new(MainMenu),
        Arc::new(StartGame),
        Arc::new(SettingsCelebrations),
        Arc::new(PauseMenu),
        Arc::new(HintFillsCell),
        Arc::new(RowCelebration),
        Arc::new(WinCelebration),
        Arc::new(HintCelebration::default()),
    ]
}

pub fn by_name(name: &str) -> Option<Arc<dyn Scenario>> {
    catalog().into_iter().find(|s| s.name() == name)
}

/// Names of the controls in `specs` that are on screen right now.
async fn present_controls(ctx: &ScenarioContext, specs: &[LocatorSpec]) -> Vec<String> {
    let mut present = Vec::new();
    for spec in specs {
        if ctx.actions.locator().is_present(spec).await {
            present.push(spec.name().to_string());
        }
    }
    present
}

/// Quits whatever is running and starts a fresh game at `difficulty`.
async fn fresh_game(ctx: &mut ScenarioContext, difficulty: Difficulty) -> Result<(), ScenarioError> {
    ctx.navigator.ensure_state(AppState::MainMenu).await?;
    ctx.navigator.start_new_game(difficulty).await?;
    Ok(())
}

/// Taps the debug-menu entry `entry` in a fresh game.
async fn fresh_game_with_debug(
    ctx: &mut ScenarioContext,
    entry: &LocatorSpec,
) -> Result<(), ScenarioError> {
    let difficulty = ctx.config.difficulty;
    fresh_game(ctx, difficulty).await?;
    ctx.capture("game_started").await?;
    ctx.navigator.open_debug_menu().await?;
    ctx.capture("debug_menu").await?;
    ctx.actions.tap(entry).await?;
    ctx.capture("debug_applied").await?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Screens
// -----------------------------------------------------------------------------

pub struct MainMenu;

#[async_trait]
impl Scenario for MainMenu {
    fn name(&self) -> &'static str {
        "main-menu"
    }

    fn description(&self) -> &'static str {
        "Main menu shows New Game, Stats and Settings"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        ctx.navigator.ensure_state(AppState::MainMenu).await?;
        ctx.capture("main_menu").await?;

        let expected = [controls::new_game(), controls::stats(), controls::settings()];
        let present = present_controls(ctx, &expected).await;
        let missing: Vec<&str> = expected
            .iter()
            .map(|s| s.name())
            .filter(|n| !present.iter().any(|p| p.as_str() == *n))
            .collect();
        if missing.is_empty() {
            ctx.note("all menu controls present");
            Ok(())
        } else {
            Err(ScenarioError::Assertion(format!("missing {}", missing.join(", "))))
        }
    }
}

pub struct StartGame;

#[async_trait]
impl Scenario for StartGame {
    fn name(&self) -> &'static str {
        "start-game"
    }

    fn description(&self) -> &'static str {
        "New Game at the configured difficulty shows the game controls"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        let difficulty = ctx.config.difficulty;
        fresh_game(ctx, difficulty).await?;
        ctx.capture("in_game").await?;

        let present = present_controls(
            ctx,
            &[controls::pause(), controls::hint(), controls::notes_mode()],
        )
        .await;
        ctx.note(format!("game controls: {}", present.join(", ")));
        if present.len() >= 2 {
            Ok(())
        } else {
            Err(ScenarioError::Assertion(format!(
                "only {} of 3 game controls present",
                present.len()
            )))
        }
    }
}

pub struct SettingsCelebrations;

#[async_trait]
impl Scenario for SettingsCelebrations {
    fn name(&self) -> &'static str {
        "settings-celebrations"
    }

    fn description(&self) -> &'static str {
        "Settings offers a celebrations toggle"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        ctx.navigator.ensure_state(AppState::SettingsOpen).await?;
        ctx.capture("settings").await?;
        ctx.actions.scroll(ScrollDirection::Down).await?;
        ctx.capture("settings_scrolled").await?;

        let toggle = ctx
            .actions
            .locator()
            .locate(&controls::celebrations_toggle(), ctx.config.locate_timeout())
            .await;

        let result = match toggle {
            Some(located) => {
                let how = if located.strategy == 0 { "switch" } else { "label" };
                let value = ctx
                    .actions
                    .driver()
                    .attribute(&located.element, "value")
                    .await
                    .ok()
                    .flatten();
                ctx.note(format!(
                    "celebrations toggle found by {how} (value {})",
                    value.as_deref().unwrap_or("n/a")
                ));
                Ok(())
            }
            None => Err(ScenarioError::Assertion("no celebrations toggle".to_string())),
        };

        ctx.actions.tap(&controls::settings_done()).await?;
        result
    }
}

pub struct PauseMenu;

#[async_trait]
impl Scenario for PauseMenu {
    fn name(&self) -> &'static str {
        "pause-menu"
    }

    fn description(&self) -> &'static str {
        "Pause menu offers Resume, Save & Exit and Quit Game"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        ctx.navigator.ensure_state(AppState::Paused).await?;
        ctx.capture("paused").await?;

        let present = present_controls(
            ctx,
            &[controls::resume(), controls::save_and_exit(), controls::quit_game()],
        )
        .await;
        ctx.note(format!("pause controls: {}", present.join(", ")));

        ctx.navigator.resume().await?;
        if present.len() >= 2 {
            Ok(())
        } else {
            Err(ScenarioError::Assertion(format!(
                "only {} of 3 pause controls present",
                present.len()
            )))
        }
    }
}

// -----------------------------------------------------------------------------
// Gameplay
// -----------------------------------------------------------------------------

pub struct HintFillsCell;

#[async_trait]
impl Scenario for HintFillsCell {
    fn name(&self) -> &'static str {
        "hint-fills-cell"
    }

    fn description(&self) -> &'static str {
        "One hint fills exactly one empty cell without a celebration"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        fresh_game(ctx, Difficulty::Beginner).await?;

        let before = ctx.actions.snapshot().await?;
        ctx.save_snapshot("before_hint", &before)?;
        let empty_before = before.empty_cells().len();
        if empty_before == 0 {
            return Err(ScenarioError::Assertion("board has no empty cells".into()));
        }
        ctx.note(format!("{empty_before} empty cells before hint"));

        ctx.actions.trigger_tap(&controls::hint()).await?;

        let target = empty_before - 1;
        let filled = FnPredicate::new(format!("{target} empty cells"), move |s: &UiSnapshot| {
            s.empty_cells().len() == target
        });
        let poll = ctx.await_evidence(&filled).await;
        ctx.capture("after_hint").await?;
        if let Some(snapshot) = &poll.evidence {
            ctx.save_snapshot("after_hint", snapshot)?;
        }
        if !poll.matched {
            return Err(ScenarioError::DeadlineExceeded {
                expected: filled.describe(),
                deadline_ms: ctx.config.poll_deadline_ms,
            });
        }

        if let Some(marker) = poll
            .evidence
            .as_ref()
            .and_then(|s| s.first_marker(CELEBRATION_MARKERS))
        {
            return Err(ScenarioError::Assertion(format!(
                "unexpected celebration '{marker}' after one hint"
            )));
        }
        Ok(())
    }
}

/// Selects an empty cell in board `rows`. Tries `spec` first, then taps the
/// cell centers of those rows one by one and keeps the first that still reads
/// blank afterwards.
async fn select_empty_cell(
    ctx: &mut ScenarioContext,
    spec: &LocatorSpec,
    rows: Range<usize>,
    label: &str,
) -> Result<(), ScenarioError> {
    if let Some(cell) = ctx
        .actions
        .locator()
        .locate(spec, ctx.config.locate_timeout())
        .await
    {
        ctx.actions.tap_element(&cell.element, label).await?;
        return Ok(());
    }

    debug!(control = spec.name(), "cell lookup failed, scanning the board");
    let window = ctx.actions.window_size().await?;
    let board = ctx.actions.snapshot().await?;
    for point in controls::cell_centers(window, rows) {
        ctx.check_cancelled()?;
        if !board.blank_cell_at(point) {
            continue;
        }
        ctx.actions.tap_at(point).await?;
        if ctx.actions.snapshot().await?.blank_cell_at(point) {
            ctx.note(format!("{label} found by board scan at ({}, {})", point.x, point.y));
            return Ok(());
        }
    }
    Err(ScenarioError::Assertion(format!("no {label} found")))
}

/// Tries digits 1-9 in the selected cell until `done` matches. Returns the
/// digit and the matching snapshot.
async fn try_digits(
    ctx: &mut ScenarioContext,
    done: &dyn SnapshotPredicate,
) -> Result<Option<(u8, UiSnapshot)>, ScenarioError> {
    for digit in 1..=9u8 {
        ctx.check_cancelled()?;
        ctx.actions.trigger_digit(digit).await?;
        let poll = ctx.await_evidence(done).await;
        debug!(digit, matched = poll.matched, polls = poll.polls, "digit tried");
        match poll.evidence {
            Some(snapshot) if poll.matched => return Ok(Some((digit, snapshot))),
            Some(snapshot) if snapshot.contains_any(LOSS_MARKERS) => {
                ctx.save_snapshot("game_over", &snapshot)?;
                return Err(ScenarioError::Assertion(format!(
                    "game lost after digit {digit}"
                )));
            }
            _ => {}
        }
    }
    Ok(None)
}

pub struct RowCelebration;

#[async_trait]
impl Scenario for RowCelebration {
    fn name(&self) -> &'static str {
        "row-celebration"
    }

    fn description(&self) -> &'static str {
        "Completing a row shows a celebration"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        fresh_game_with_debug(ctx, &controls::debug_fill_row()).await?;

        select_empty_cell(
            ctx,
            &controls::empty_cell_in_band(ROW_ONE_BAND),
            0..1,
            "empty cell in row 1",
        )
        .await?;

        let celebration = Markers::any_of(CELEBRATION_MARKERS);
        match try_digits(ctx, &celebration).await? {
            Some((digit, snapshot)) => {
                ctx.save_snapshot("celebration", &snapshot)?;
                ctx.capture("celebration").await?;
                let marker = snapshot.first_marker(CELEBRATION_MARKERS).unwrap_or("?");
                info!(digit, marker, "row celebration");
                ctx.note(format!("'{marker}' after digit {digit}"));
                Ok(())
            }
            None => Err(ScenarioError::DeadlineExceeded {
                expected: "row celebration".into(),
                deadline_ms: ctx.config.poll_deadline_ms,
            }),
        }
    }
}

pub struct WinCelebration;

#[async_trait]
impl Scenario for WinCelebration {
    fn name(&self) -> &'static str {
        "win-celebration"
    }

    fn description(&self) -> &'static str {
        "Entering the last digit shows the solved overlay"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        fresh_game_with_debug(ctx, &controls::debug_fill_all()).await?;

        select_empty_cell(ctx, &controls::empty_cell(), 0..9, "last empty cell").await?;

        let Some((digit, snapshot)) = try_digits(ctx, &GameEnded).await? else {
            return Err(ScenarioError::DeadlineExceeded {
                expected: "game end".into(),
                deadline_ms: ctx.config.poll_deadline_ms,
            });
        };
        ctx.save_snapshot("game_end", &snapshot)?;
        ctx.capture("game_end").await?;

        match classify_game_end(&snapshot) {
            Some(GameEnd::Solved) => {
                ctx.note(format!("solved after digit {digit}"));
                Ok(())
            }
            Some(other) => Err(ScenarioError::Assertion(format!(
                "game ended as {other:?} after digit {digit}, not solved"
            ))),
            None => Err(ScenarioError::Assertion("game end not classified".into())),
        }
    }
}

/// Hints through a whole game, watching for any celebration.
pub struct HintCelebration {
    pub max_hints: u32,
}

impl Default for HintCelebration {
    fn default() -> Self {
        Self { max_hints: 100 }
    }
}

#[async_trait]
impl Scenario for HintCelebration {
    fn name(&self) -> &'static str {
        "hint-celebration"
    }

    fn description(&self) -> &'static str {
        "Repeated hints trigger at least one celebration"
    }

    async fn run(&self, ctx: &mut ScenarioContext) -> Result<(), ScenarioError> {
        fresh_game(ctx, Difficulty::Beginner).await?;
        ctx.capture("game_started").await?;

        let mut celebrations = 0u32;
        let mut hints = 0u32;
        while hints < self.max_hints {
            ctx.check_cancelled()?;
            match ctx.actions.trigger_tap(&controls::hint()).await {
                Ok(()) => hints += 1,
                Err(ActionError::NotFound(_)) => {
                    debug!(hints, "hint button gone");
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let snapshot = ctx.actions.snapshot().await?;
            if let Some(marker) = snapshot.first_marker(CELEBRATION_MARKERS) {
                celebrations += 1;
                if celebrations == 1 {
                    ctx.save_snapshot("first_celebration", &snapshot)?;
                    ctx.capture("first_celebration").await?;
                    ctx.note(format!("'{marker}' after {hints} hints"));
                }
            }
            if let Some(end) = classify_game_end(&snapshot) {
                ctx.save_snapshot("game_end", &snapshot)?;
                ctx.note(format!("game ended as {end:?} after {hints} hints"));
                break;
            }
            if hints % 10 == 0 {
                ctx.capture(&format!("progress_{hints}")).await?;
            }
        }

        ctx.note(format!("{hints} hints, {celebrations} celebrations"));
        if celebrations > 0 {
            Ok(())
        } else {
            Err(ScenarioError::Assertion("no celebration seen".into()))
        }
    }
}
