//! Navigation between the app's screens.
//!
//! The [`Navigator`] keeps no state of its own. Before and after every
//! transition it asks the app where it is ([`Navigator::probe`]) by checking
//! which landmark controls are present. Recovery steps (dismissing dialogs,
//! quitting to the menu) tolerate absent controls; forward transitions fail
//! with [`NavError::Unreachable`] when their precondition control is missing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::action::{ActionError, Actions};
use crate::controls::{self, Difficulty};
use crate::driver::DriverError;
use crate::locator::LocatorSpec;

/// Where the app is, as far as the harness can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppState {
    Unknown,
    MainMenu,
    InGame,
    Paused,
    SettingsOpen,
    DebugMenuOpen,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppState::Unknown => "unknown",
            AppState::MainMenu => "main menu",
            AppState::InGame => "in game",
            AppState::Paused => "paused",
            AppState::SettingsOpen => "settings",
            AppState::DebugMenuOpen => "debug menu",
        };
        f.write_str(s)
    }
}

/// Errors from navigation.
#[derive(Error, Debug)]
pub enum NavError {
    /// A required control for the transition was not on screen.
    #[error("Cannot reach {target}: {missing} not found")]
    Unreachable { target: AppState, missing: String },

    #[error(transparent)]
    Transport(#[from] DriverError),
}

/// Drives the app between screens.
pub struct Navigator {
    actions: Arc<Actions>,
    difficulty: Difficulty,
    transition_timeout: Duration,
}

impl Navigator {
    pub fn new(actions: Arc<Actions>, difficulty: Difficulty) -> Self {
        Self {
            actions,
            difficulty,
            transition_timeout: Duration::from_secs(5),
        }
    }

    /// How long to wait for the destination screen after a forward transition.
    pub fn with_transition_timeout(mut self, timeout: Duration) -> Self {
        self.transition_timeout = timeout;
        self
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    async fn present(&self, spec: &LocatorSpec) -> bool {
        self.actions.locator().is_present(spec).await
    }

    /// Taps `spec` if it is on screen right now. Returns whether it tapped.
    async fn tap_if_present(&self, spec: &LocatorSpec) -> Result<bool, NavError> {
        self.tap_if_appears(spec, Duration::ZERO).await
    }

    /// Taps `spec` if it shows up within `wait`.
    async fn tap_if_appears(&self, spec: &LocatorSpec, wait: Duration) -> Result<bool, NavError> {
        let Some(located) = self.actions.locator().locate(spec, wait).await else {
            return Ok(false);
        };
        match self.actions.tap_element(&located.element, spec.name()).await {
            Ok(()) => Ok(true),
            Err(ActionError::NotFound(_)) => Ok(false),
            Err(ActionError::Transport(e)) => Err(e.into()),
        }
    }

    /// Taps a control a transition depends on.
    async fn tap_required(&self, spec: &LocatorSpec, target: AppState) -> Result<(), NavError> {
        match self.actions.tap(spec).await {
            Ok(()) => Ok(()),
            Err(ActionError::NotFound(missing)) => Err(NavError::Unreachable { target, missing }),
            Err(ActionError::Transport(e)) => Err(e.into()),
        }
    }

    /// Waits for the landmark of `target` to appear.
    async fn expect_landmark(&self, spec: &LocatorSpec, target: AppState) -> Result<(), NavError> {
        if self
            .actions
            .locator()
            .locate(spec, self.transition_timeout)
            .await
            .is_some()
        {
            Ok(())
        } else {
            Err(NavError::Unreachable {
                target,
                missing: spec.name().to_string(),
            })
        }
    }

    /// Infers the current screen from which landmarks are present.
    ///
    /// Overlays are checked before the screens they cover: the debug menu and
    /// the pause menu sit on top of the game, the settings sheet on top of the
    /// main menu.
    #[instrument(skip(self))]
    pub async fn probe(&self) -> AppState {
        let state = if self.present(&controls::debug_fill_all()).await
            || self.present(&controls::debug_fill_row()).await
        {
            AppState::DebugMenuOpen
        } else if self.present(&controls::settings_done()).await {
            AppState::SettingsOpen
        } else if self.present(&controls::resume()).await {
            AppState::Paused
        } else if self.present(&controls::pause()).await {
            AppState::InGame
        } else if self.present(&controls::new_game()).await {
            AppState::MainMenu
        } else {
            AppState::Unknown
        };
        debug!(%state, "probed");
        state
    }

    /// Closes a confirmation dialog or the pause menu, if either is showing.
    pub async fn dismiss_dialogs(&self) -> Result<(), NavError> {
        if self.tap_if_present(&controls::cancel()).await? {
            debug!("dismissed dialog");
        }
        if self.tap_if_present(&controls::resume()).await? {
            debug!("resumed from pause menu");
        }
        Ok(())
    }

    /// Best-effort return to the main menu from anywhere.
    #[instrument(skip(self))]
    pub async fn exit_to_menu(&self) -> Result<AppState, NavError> {
        self.tap_if_present(&controls::debug_close()).await?;
        self.tap_if_present(&controls::settings_done()).await?;
        self.dismiss_dialogs().await?;
        // After pausing, the quit controls animate in.
        let wait = if self.tap_if_present(&controls::pause()).await? {
            self.transition_timeout
        } else {
            Duration::ZERO
        };
        if self.tap_if_appears(&controls::quit_game(), wait).await? {
            self.tap_if_appears(&controls::confirm_quit(), self.transition_timeout)
                .await?;
        }

        self.expect_landmark(&controls::new_game(), AppState::MainMenu)
            .await?;
        Ok(AppState::MainMenu)
    }

    /// Opens the settings sheet from the main menu.
    pub async fn open_settings(&self) -> Result<AppState, NavError> {
        self.tap_required(&controls::settings(), AppState::SettingsOpen)
            .await?;
        self.expect_landmark(&controls::settings_done(), AppState::SettingsOpen)
            .await?;
        Ok(AppState::SettingsOpen)
    }

    /// Opens the hidden debug menu with a long press on the grid.
    ///
    /// Presses a third of the way down the window first, where the grid sits,
    /// then the window center.
    pub async fn open_debug_menu(&self) -> Result<AppState, NavError> {
        if !self.present(&controls::pause()).await {
            return Err(NavError::Unreachable {
                target: AppState::DebugMenuOpen,
                missing: controls::pause().name().to_string(),
            });
        }
        let size = self.actions.window_size().await.map_err(transport)?;

        for point in [size.fraction(0.5, 1.0 / 3.0), size.fraction(0.5, 0.5)] {
            self.actions.long_press(point, None).await.map_err(transport)?;
            if self
                .actions
                .locator()
                .locate(&controls::debug_fill_all(), self.transition_timeout)
                .await
                .is_some()
                || self.present(&controls::debug_fill_row()).await
            {
                info!(x = point.x, y = point.y, "debug menu open");
                return Ok(AppState::DebugMenuOpen);
            }
            warn!(x = point.x, y = point.y, "long press did not open debug menu");
        }
        Err(NavError::Unreachable {
            target: AppState::DebugMenuOpen,
            missing: "debug menu".to_string(),
        })
    }

    /// Starts a new game at `difficulty` from the main menu.
    pub async fn start_new_game(&self, difficulty: Difficulty) -> Result<AppState, NavError> {
        self.tap_required(&controls::new_game(), AppState::InGame)
            .await?;
        self.tap_required(&controls::difficulty(difficulty), AppState::InGame)
            .await?;
        self.expect_landmark(&controls::pause(), AppState::InGame)
            .await?;
        info!(%difficulty, "new game started");
        Ok(AppState::InGame)
    }

    pub async fn pause(&self) -> Result<AppState, NavError> {
        self.tap_required(&controls::pause(), AppState::Paused).await?;
        self.expect_landmark(&controls::resume(), AppState::Paused)
            .await?;
        Ok(AppState::Paused)
    }

    pub async fn resume(&self) -> Result<AppState, NavError> {
        self.tap_required(&controls::resume(), AppState::InGame).await?;
        self.expect_landmark(&controls::pause(), AppState::InGame)
            .await?;
        Ok(AppState::InGame)
    }

    /// Gets into a running game: resume if paused, otherwise quit to the menu
    /// and start a fresh one.
    async fn reach_game(&self, current: AppState) -> Result<(), NavError> {
        match current {
            AppState::InGame => Ok(()),
            AppState::Paused => self.resume().await.map(|_| ()),
            _ => {
                self.exit_to_menu().await?;
                self.start_new_game(self.difficulty).await.map(|_| ())
            }
        }
    }

    /// Drives the app to `target` from wherever it currently is.
    #[instrument(skip_all, fields(target = %target))]
    pub async fn ensure_state(&self, target: AppState) -> Result<AppState, NavError> {
        let current = self.probe().await;
        if current == target && target != AppState::Unknown {
            return Ok(current);
        }

        match target {
            AppState::Unknown => {
                return Err(NavError::Unreachable {
                    target,
                    missing: "a known screen".to_string(),
                })
            }
            AppState::MainMenu => {
                self.exit_to_menu().await?;
            }
            AppState::InGame => {
                self.reach_game(current).await?;
            }
            AppState::Paused => {
                self.reach_game(current).await?;
                self.pause().await?;
            }
            AppState::SettingsOpen => {
                self.exit_to_menu().await?;
                self.open_settings().await?;
            }
            AppState::DebugMenuOpen => {
                self.reach_game(current).await?;
                self.open_debug_menu().await?;
            }
        }

        let reached = self.probe().await;
        if reached == target {
            info!(%reached, "state reached");
            Ok(reached)
        } else {
            Err(NavError::Unreachable {
                target,
                missing: format!("landmarks (observed {reached})"),
            })
        }
    }
}

fn transport(err: ActionError) -> NavError {
    match err {
        ActionError::Transport(e) => NavError::Transport(e),
        ActionError::NotFound(missing) => NavError::Unreachable {
            target: AppState::Unknown,
            missing,
        },
    }
}
