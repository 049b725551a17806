//! Logical controls of the Sudoku app.
//!
//! Each function returns the [`LocatorSpec`] for one control. Identifiers come
//! first; text and class-filter fallbacks follow for builds where the
//! identifier is missing.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::{Point, WindowSize};
use crate::locator::{AttributeMatch, Band, LocatorSpec, TextMatch};

pub const BUTTON: &str = "XCUIElementTypeButton";
pub const SWITCH: &str = "XCUIElementTypeSwitch";
pub const STATIC_TEXT: &str = "XCUIElementTypeStaticText";

/// Vertical band occupied by the first grid row on the reference device.
pub const ROW_ONE_BAND: Band = Band {
    min_y: 80.0,
    max_y: 150.0,
};

/// Left edge of the board as a fraction of the window width. The board is
/// square and centered horizontally.
const BOARD_LEFT: f64 = 0.03;

/// Top edge of the board as a fraction of the window height.
const BOARD_TOP: f64 = 0.125;

/// Centers of the board cells in `rows` (0-8), row-major, scaled to
/// `window`. Rows past the board are ignored.
pub fn cell_centers(window: WindowSize, rows: Range<usize>) -> Vec<Point> {
    let left = window.width as f64 * BOARD_LEFT;
    let top = window.height as f64 * BOARD_TOP;
    let cell = (window.width as f64 - 2.0 * left) / 9.0;
    let center = |i: usize| (i as f64 + 0.5) * cell;
    (rows.start..rows.end.min(9))
        .flat_map(|row| {
            (0..9).map(move |col| Point::new((left + center(col)).round() as i32, (top + center(row)).round() as i32))
        })
        .collect()
}

/// Puzzle difficulty as offered on the new-game sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Easy,
    Medium,
    Intermediate,
    Hard,
    Expert,
    Master,
    Extreme,
}

impl Difficulty {
    pub const ALL: [Difficulty; 8] = [
        Difficulty::Beginner,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Intermediate,
        Difficulty::Hard,
        Difficulty::Expert,
        Difficulty::Master,
        Difficulty::Extreme,
    ];

    /// Button label on the difficulty sheet.
    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
            Difficulty::Master => "Master",
            Difficulty::Extreme => "Extreme",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .iter()
            .copied()
            .find(|d| d.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown difficulty '{s}'"))
    }
}

fn named(name: &str, id: &str) -> LocatorSpec {
    LocatorSpec::new(name).by_id(id).by_text(id, false)
}

// -----------------------------------------------------------------------------
// Main menu
// -----------------------------------------------------------------------------

pub fn new_game() -> LocatorSpec {
    named("new game", "New Game")
}

pub fn difficulty(d: Difficulty) -> LocatorSpec {
    named(&format!("difficulty {}", d.label()), d.label())
}

pub fn stats() -> LocatorSpec {
    named("stats", "Stats")
}

pub fn settings() -> LocatorSpec {
    named("settings", "Settings")
}

// -----------------------------------------------------------------------------
// Settings sheet
// -----------------------------------------------------------------------------

pub fn settings_done() -> LocatorSpec {
    named("settings done", "Done")
}

/// The celebrations toggle: a switch whose name mentions celebrations, else
/// the static text row that labels it.
pub fn celebrations_toggle() -> LocatorSpec {
    LocatorSpec::new("celebrations toggle")
        .by_class_filtered(
            SWITCH,
            Some(AttributeMatch::new("name", TextMatch::contains_ignore_case("celebration"))),
            None,
        )
        .by_class_filtered(
            STATIC_TEXT,
            Some(AttributeMatch::new("label", TextMatch::contains_ignore_case("celebration"))),
            None,
        )
}

// -----------------------------------------------------------------------------
// In game
// -----------------------------------------------------------------------------

pub fn pause() -> LocatorSpec {
    LocatorSpec::new("pause").by_id("pause").by_id("pause.fill")
}

pub fn hint() -> LocatorSpec {
    LocatorSpec::new("hint").by_id("lightbulb").by_text("Hint", true)
}

/// The notes-mode toggle, which reads "Normal" outside notes mode.
pub fn notes_mode() -> LocatorSpec {
    named("notes mode", "Normal")
}

/// Number-pad key for `digit` (1-9).
pub fn digit(digit: u8) -> LocatorSpec {
    let d = digit.to_string();
    LocatorSpec::new(format!("digit {d}")).by_id(d.clone()).by_class_filtered(
        BUTTON,
        Some(AttributeMatch::any_of(&["name", "label"], TextMatch::equals(d))),
        None,
    )
}

/// Any empty grid cell. Empty cells are buttons whose name is a single space.
pub fn empty_cell() -> LocatorSpec {
    LocatorSpec::new("empty cell").by_class_filtered(
        BUTTON,
        Some(AttributeMatch::any_of(&["name", "label"], TextMatch::equals(" "))),
        None,
    )
}

/// An empty grid cell whose top edge lies inside `band`.
pub fn empty_cell_in_band(band: Band) -> LocatorSpec {
    LocatorSpec::new(format!("empty cell in y({}, {})", band.min_y, band.max_y)).by_class_filtered(
        BUTTON,
        Some(AttributeMatch::any_of(&["name", "label"], TextMatch::equals(" "))),
        Some(band),
    )
}

// -----------------------------------------------------------------------------
// Pause menu and dialogs
// -----------------------------------------------------------------------------

pub fn resume() -> LocatorSpec {
    named("resume", "Resume")
}

pub fn cancel() -> LocatorSpec {
    named("cancel", "Cancel")
}

pub fn save_and_exit() -> LocatorSpec {
    named("save and exit", "Save & Exit")
}

pub fn quit_game() -> LocatorSpec {
    named("quit game", "Quit Game")
}

/// Confirmation button of the quit dialog.
pub fn confirm_quit() -> LocatorSpec {
    named("confirm quit", "Quit")
}

// -----------------------------------------------------------------------------
// Debug menu
// -----------------------------------------------------------------------------

pub fn debug_fill_row() -> LocatorSpec {
    LocatorSpec::new("debug fill row")
        .by_id("Fill Row 1 (except 1 cell)")
        .by_class_filtered(
            BUTTON,
            Some(AttributeMatch::any_of(&["label", "name"], TextMatch::contains("Row"))),
            None,
        )
}

pub fn debug_fill_all() -> LocatorSpec {
    LocatorSpec::new("debug fill all")
        .by_id("Fill All (leave 1 cell) - Win Test")
        .by_class_filtered(
            BUTTON,
            Some(AttributeMatch::any_of(&["label", "name"], TextMatch::contains("Win Test"))),
            None,
        )
        .by_class_filtered(
            BUTTON,
            Some(AttributeMatch::any_of(&["label", "name"], TextMatch::contains("leave 1"))),
            None,
        )
}

pub fn debug_close() -> LocatorSpec {
    named("debug close", "Close")
}
