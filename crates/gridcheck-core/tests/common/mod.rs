//! Shared test helpers for gridcheck-core integration tests.
//!
//! Two kinds of fake endpoint live here:
//!
//! - [`FakeApp`]: an in-memory Sudoku app behind the `AutomationDriver` seam.
//!   It has the real app's screens, its accessibility ids, a solvable board,
//!   the debug menu, and celebration overlays that disappear after a few
//!   page-source reads.
//! - [`webdriver_mock`]: `mockito` routes that answer like Appium, for
//!   exercising the real `WebDriverSession`.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockito::{Mock, ServerGuard};
use serde_json::{json, Value};

use gridcheck_core::clock::ManualClock;
use gridcheck_core::config::HarnessConfig;
use gridcheck_core::driver::{AutomationDriver, DriverError, DriverFactory, LocateBy, ScrollDirection};
use gridcheck_core::element::{ElementFrame, ElementRef, Point, WindowSize};
use gridcheck_core::evidence::EvidenceStore;
use gridcheck_core::scenario::ScenarioRunner;

// ---------------------------------------------------------------------------
// Board geometry
// ---------------------------------------------------------------------------

pub const WINDOW: WindowSize = WindowSize {
    width: 402,
    height: 874,
};
pub const GRID_X: f64 = 12.0;
pub const GRID_Y: f64 = 108.0;
pub const CELL: f64 = 42.0;

pub const DIFFICULTIES: [&str; 8] = [
    "Beginner",
    "Easy",
    "Medium",
    "Intermediate",
    "Hard",
    "Expert",
    "Master",
    "Extreme",
];

pub const FILL_ROW: &str = "Fill Row 1 (except 1 cell)";
pub const FILL_ALL: &str = "Fill All (leave 1 cell) - Win Test";

/// Cell left open by the fill-row debug entry (row 1, column 5).
pub const ROW_GAP: usize = 4;
/// Cell left open by the fill-all debug entry (center of the board).
pub const WIN_GAP: usize = 40;

/// Solved value of a cell. A shifted-row pattern that is a valid Sudoku.
pub fn solution(index: usize) -> u8 {
    let (r, c) = (index / 9, index % 9);
    (((r * 3 + r / 3 + c) % 9) + 1) as u8
}

fn cell_frame(index: usize) -> ElementFrame {
    ElementFrame {
        x: GRID_X + (index % 9) as f64 * CELL,
        y: GRID_Y + (index / 9) as f64 * CELL,
        width: CELL,
        height: CELL,
    }
}

fn grid_contains(point: Point) -> bool {
    let (x, y) = (point.x as f64, point.y as f64);
    x >= GRID_X && x < GRID_X + 9.0 * CELL && y >= GRID_Y && y < GRID_Y + 9.0 * CELL
}

// ---------------------------------------------------------------------------
// FakeApp
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Launch screen with no controls.
    Splash,
    MainMenu,
    DifficultySheet,
    Settings,
    InGame,
    Paused,
    QuitConfirm,
    DebugMenu,
    Solved,
    GameOver,
}

/// Knobs for the simulated app.
#[derive(Debug, Clone)]
pub struct FakeOptions {
    /// Empty cells in a new game.
    pub blanks: usize,
    pub debug_menu: bool,
    /// Settings shows a switch; otherwise only a text row.
    pub celebrations_switch: bool,
    /// Completed rows, columns and boxes show an overlay.
    pub celebrations: bool,
    /// Page-source reads an overlay stays visible for.
    pub overlay_reads: u32,
    /// Page-source reads before a hint lands on the board.
    pub hint_delay_reads: u32,
    pub mistake_limit: Option<u32>,
    /// Accessibility ids replaced in the tree (labels are kept).
    pub renamed: HashMap<String, String>,
    /// Empty cells render with a blank name and label instead of a space.
    pub unnamed_blanks: bool,
    pub fail_find_by_id: bool,
    pub failing_page_sources: u32,
    pub fail_open: bool,
    pub fail_screenshots: bool,
}

impl Default for FakeOptions {
    fn default() -> Self {
        Self {
            blanks: 30,
            debug_menu: true,
            celebrations_switch: true,
            celebrations: true,
            overlay_reads: 2,
            hint_delay_reads: 0,
            mistake_limit: None,
            renamed: HashMap::new(),
            unnamed_blanks: false,
            fail_find_by_id: false,
            failing_page_sources: 0,
            fail_open: false,
            fail_screenshots: false,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    /// Internal identity, stable under renames.
    key: String,
    element_type: &'static str,
    name: String,
    label: String,
    value: Option<String>,
    frame: ElementFrame,
}

fn node(key: &str, element_type: &'static str, name: &str, label: &str, frame: (f64, f64, f64, f64)) -> Node {
    Node {
        key: key.to_string(),
        element_type,
        name: name.to_string(),
        label: label.to_string(),
        value: None,
        frame: ElementFrame {
            x: frame.0,
            y: frame.1,
            width: frame.2,
            height: frame.3,
        },
    }
}

fn button(name: &str, y: f64) -> Node {
    node(name, "XCUIElementTypeButton", name, name, (40.0, y, 322.0, 48.0))
}

fn text(label: &str, y: f64) -> Node {
    node(label, "XCUIElementTypeStaticText", label, label, (40.0, y, 322.0, 30.0))
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Mutable state of the simulated app.
#[derive(Debug)]
pub struct AppModel {
    pub screen: Screen,
    pub settings_scrolled: bool,
    pub board: Vec<Option<u8>>,
    pub selected: Option<usize>,
    pub mistakes: u32,
    pub overlay: Option<(String, u32)>,
    pub pending_hint: Option<u32>,
    pub generation: u64,
    pub calls: Vec<String>,
    pub sessions_opened: u32,
    pub sessions_closed: u32,
    pub page_source_reads: u32,
    /// Element lookups served.
    pub finds: u32,
    pub options: FakeOptions,
}

impl AppModel {
    fn new(options: FakeOptions) -> Self {
        let mut model = Self {
            screen: Screen::MainMenu,
            settings_scrolled: false,
            board: Vec::new(),
            selected: None,
            mistakes: 0,
            overlay: None,
            pending_hint: None,
            generation: 0,
            calls: Vec::new(),
            sessions_opened: 0,
            sessions_closed: 0,
            page_source_reads: 0,
            finds: 0,
            options,
        };
        model.new_board();
        model
    }

    fn new_board(&mut self) {
        let blanks = self.options.blanks;
        // 7 is coprime to 81, so (7i mod 81) visits every cell once.
        self.board = (0..81)
            .map(|i| if (i * 7) % 81 < blanks { None } else { Some(solution(i)) })
            .collect();
        self.selected = None;
        self.mistakes = 0;
        self.overlay = None;
        self.pending_hint = None;
    }

    pub fn empty_cells(&self) -> usize {
        self.board.iter().filter(|c| c.is_none()).count()
    }

    fn render(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        match self.screen {
            Screen::Splash => nodes.push(text("Loading", 400.0)),
            Screen::MainMenu | Screen::DifficultySheet | Screen::Settings => {
                nodes.push(text("Sudoku", 120.0));
                nodes.push(button("New Game", 300.0));
                nodes.push(button("Stats", 360.0));
                nodes.push(button("Settings", 420.0));
                if self.screen == Screen::DifficultySheet {
                    for (i, d) in DIFFICULTIES.iter().enumerate() {
                        nodes.push(button(d, 480.0 + i as f64 * 44.0));
                    }
                    nodes.push(button("Cancel", 840.0));
                }
                if self.screen == Screen::Settings {
                    nodes.push(button("Done", 60.0));
                    nodes.push(text("Sound", 140.0));
                    if self.settings_scrolled {
                        if self.options.celebrations_switch {
                            let mut switch = node(
                                "celebrations-switch",
                                "XCUIElementTypeSwitch",
                                "Celebrations",
                                "Celebrations",
                                (300.0, 600.0, 51.0, 31.0),
                            );
                            switch.value = Some("1".to_string());
                            nodes.push(switch);
                        } else {
                            nodes.push(text("Show Celebrations", 600.0));
                        }
                    }
                }
            }
            Screen::InGame | Screen::Paused | Screen::QuitConfirm | Screen::DebugMenu => {
                nodes.push(node("pause", "XCUIElementTypeButton", "pause", "Pause", (350.0, 50.0, 40.0, 40.0)));
                nodes.push(node("lightbulb", "XCUIElementTypeButton", "lightbulb", "Hint", (300.0, 620.0, 44.0, 44.0)));
                nodes.push(node("Normal", "XCUIElementTypeButton", "Normal", "Normal", (20.0, 620.0, 80.0, 44.0)));
                nodes.push(node("arrow.uturn.backward", "XCUIElementTypeButton", "arrow.uturn.backward", "Undo", (110.0, 620.0, 44.0, 44.0)));
                nodes.push(node("arrow.uturn.forward", "XCUIElementTypeButton", "arrow.uturn.forward", "Redo", (160.0, 620.0, 44.0, 44.0)));
                nodes.push(node("delete.left", "XCUIElementTypeButton", "delete.left", "Erase", (210.0, 620.0, 44.0, 44.0)));
                for d in 1..=9u8 {
                    let name = d.to_string();
                    nodes.push(node(
                        &format!("key:{d}"),
                        "XCUIElementTypeButton",
                        &name,
                        &name,
                        (12.0 + (d - 1) as f64 * 42.0, 700.0, 40.0, 56.0),
                    ));
                }
                let blank = if self.options.unnamed_blanks { "" } else { " " };
                for (i, cell) in self.board.iter().enumerate() {
                    let shown = cell.map(|v| v.to_string()).unwrap_or_else(|| blank.to_string());
                    let f = cell_frame(i);
                    nodes.push(node(
                        &format!("cell:{i}"),
                        "XCUIElementTypeButton",
                        &shown,
                        &shown,
                        (f.x, f.y, f.width, f.height),
                    ));
                }
                match self.screen {
                    Screen::Paused => {
                        nodes.push(button("Resume", 380.0));
                        nodes.push(button("Save & Exit", 440.0));
                        nodes.push(button("Quit Game", 500.0));
                    }
                    Screen::QuitConfirm => {
                        nodes.push(text("Quit this game?", 360.0));
                        nodes.push(button("Quit", 400.0));
                        nodes.push(button("Cancel", 460.0));
                    }
                    Screen::DebugMenu => {
                        nodes.push(text("Debug", 300.0));
                        nodes.push(button(FILL_ROW, 340.0));
                        nodes.push(button(FILL_ALL, 400.0));
                        nodes.push(button("Close", 460.0));
                    }
                    _ => {}
                }
            }
            Screen::Solved => {
                nodes.push(text("SUDOKU SOLVED!", 300.0));
                nodes.push(text("🏆", 340.0));
                nodes.push(button("New Game", 500.0));
            }
            Screen::GameOver => {
                nodes.push(text("GAME OVER", 300.0));
                nodes.push(text("TOO MANY MISTAKES", 340.0));
                nodes.push(button("New Game", 500.0));
            }
        }
        if let Some((overlay, _)) = &self.overlay {
            nodes.push(text(overlay, 60.0));
        }
        for n in nodes.iter_mut() {
            if let Some(renamed) = self.options.renamed.get(&n.name) {
                n.name = renamed.clone();
            }
        }
        nodes
    }

    fn source(&self) -> String {
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<AppiumAUT>\n  <XCUIElementTypeApplication type=\"XCUIElementTypeApplication\" name=\"Sudoku\" label=\"Sudoku\" enabled=\"true\" visible=\"true\" x=\"0\" y=\"0\" width=\"402\" height=\"874\">\n",
        );
        for n in self.render() {
            let value = n
                .value
                .as_ref()
                .map(|v| format!(" value=\"{}\"", xml_escape(v)))
                .unwrap_or_default();
            xml.push_str(&format!(
                "    <{t} type=\"{t}\"{value} name=\"{name}\" label=\"{label}\" enabled=\"true\" visible=\"true\" x=\"{x}\" y=\"{y}\" width=\"{w}\" height=\"{h}\"/>\n",
                t = n.element_type,
                name = xml_escape(&n.name),
                label = xml_escape(&n.label),
                x = n.frame.x,
                y = n.frame.y,
                w = n.frame.width,
                h = n.frame.height,
            ));
        }
        xml.push_str("  </XCUIElementTypeApplication>\n</AppiumAUT>");
        xml
    }

    fn element_id(&self, index: usize) -> ElementRef {
        ElementRef::new(format!("g{}-{}", self.generation, index))
    }

    fn resolve(&self, element: &ElementRef) -> Result<Node, DriverError> {
        let stale = || DriverError::Endpoint {
            error: "stale element reference".to_string(),
            message: format!("{element} is no longer attached"),
        };
        let (generation, index) = element
            .id()
            .trim_start_matches('g')
            .split_once('-')
            .and_then(|(g, i)| Some((g.parse::<u64>().ok()?, i.parse::<usize>().ok()?)))
            .ok_or_else(stale)?;
        if generation != self.generation {
            return Err(stale());
        }
        self.render().into_iter().nth(index).ok_or_else(stale)
    }

    fn find(&mut self, by: &LocateBy) -> Result<Vec<ElementRef>, DriverError> {
        self.finds += 1;
        if self.options.fail_find_by_id && matches!(by, LocateBy::AccessibilityId(_)) {
            return Err(DriverError::Endpoint {
                error: "unknown error".to_string(),
                message: "accessibility id lookup failed".to_string(),
            });
        }
        Ok(self
            .render()
            .iter()
            .enumerate()
            .filter(|(_, n)| match by {
                LocateBy::AccessibilityId(id) => &n.name == id,
                LocateBy::ClassName(class) => n.element_type == class,
                LocateBy::Text { text, partial: true } => n.label.contains(text.as_str()) || n.name.contains(text.as_str()),
                LocateBy::Text { text, partial: false } => &n.label == text || &n.name == text,
            })
            .map(|(i, _)| self.element_id(i))
            .collect())
    }

    fn press(&mut self, key: &str) {
        self.calls.push(format!("click:{key}"));
        match (self.screen, key) {
            (Screen::MainMenu | Screen::Solved | Screen::GameOver, "New Game") => {
                self.screen = Screen::DifficultySheet;
            }
            (Screen::MainMenu, "Settings") => {
                self.screen = Screen::Settings;
                self.settings_scrolled = false;
            }
            (Screen::DifficultySheet, "Cancel") => self.screen = Screen::MainMenu,
            (Screen::DifficultySheet, d) if DIFFICULTIES.contains(&d) => {
                self.new_board();
                self.screen = Screen::InGame;
            }
            (Screen::Settings, "Done") => self.screen = Screen::MainMenu,
            (Screen::InGame, "pause") => self.screen = Screen::Paused,
            (Screen::InGame, "lightbulb") => {
                if self.options.hint_delay_reads > 0 {
                    self.pending_hint = Some(self.options.hint_delay_reads);
                } else {
                    self.apply_hint();
                }
            }
            (Screen::InGame, k) if k.starts_with("key:") => {
                if let Ok(d) = k[4..].parse::<u8>() {
                    self.enter_digit(d);
                }
            }
            (Screen::InGame, k) if k.starts_with("cell:") => {
                self.selected = k[5..].parse::<usize>().ok();
            }
            (Screen::Paused, "Resume") => self.screen = Screen::InGame,
            (Screen::Paused, "Save & Exit") => self.screen = Screen::MainMenu,
            (Screen::Paused, "Quit Game") => self.screen = Screen::QuitConfirm,
            (Screen::QuitConfirm, "Quit") => self.screen = Screen::MainMenu,
            (Screen::QuitConfirm, "Cancel") => self.screen = Screen::Paused,
            (Screen::DebugMenu, FILL_ROW) => {
                for i in 0..9 {
                    if i != ROW_GAP {
                        self.board[i] = Some(solution(i));
                    }
                }
                self.board[ROW_GAP] = None;
                self.screen = Screen::InGame;
            }
            (Screen::DebugMenu, FILL_ALL) => {
                for i in 0..81 {
                    self.board[i] = if i == WIN_GAP { None } else { Some(solution(i)) };
                }
                self.screen = Screen::InGame;
            }
            (Screen::DebugMenu, "Close") => self.screen = Screen::InGame,
            _ => {}
        }
        self.generation += 1;
    }

    fn enter_digit(&mut self, digit: u8) {
        let Some(index) = self.selected else { return };
        if self.board[index].is_some() {
            return;
        }
        if digit == solution(index) {
            self.board[index] = Some(digit);
            self.after_fill(index);
        } else {
            self.mistakes += 1;
            if self.options.mistake_limit.is_some_and(|limit| self.mistakes >= limit) {
                self.screen = Screen::GameOver;
            }
        }
    }

    fn apply_hint(&mut self) {
        if let Some(index) = self.board.iter().position(|c| c.is_none()) {
            self.board[index] = Some(solution(index));
            self.after_fill(index);
        }
    }

    fn after_fill(&mut self, index: usize) {
        if self.board.iter().all(|c| c.is_some()) {
            self.screen = Screen::Solved;
            self.overlay = None;
            return;
        }
        if !self.options.celebrations {
            return;
        }
        let (r, c) = (index / 9, index % 9);
        let row_done = (0..9).all(|k| self.board[r * 9 + k].is_some());
        let col_done = (0..9).all(|k| self.board[k * 9 + c].is_some());
        let (br, bc) = (r / 3 * 3, c / 3 * 3);
        let box_done = (0..9).all(|k| self.board[(br + k / 3) * 9 + bc + k % 3].is_some());
        let message = if row_done {
            Some("Row Complete!")
        } else if col_done {
            Some("Column Complete!")
        } else if box_done {
            Some("Box Complete!")
        } else {
            None
        };
        if let Some(message) = message {
            self.overlay = Some((message.to_string(), self.options.overlay_reads));
        }
    }

    fn read_source(&mut self) -> Result<String, DriverError> {
        self.page_source_reads += 1;
        if self.options.failing_page_sources > 0 {
            self.options.failing_page_sources -= 1;
            return Err(DriverError::Http("connection reset".to_string()));
        }
        let source = self.source();

        if let Some((_, reads)) = self.overlay.as_mut() {
            *reads = reads.saturating_sub(1);
            if *reads == 0 {
                self.overlay = None;
            }
        }
        if let Some(reads) = self.pending_hint.as_mut() {
            *reads -= 1;
            if *reads == 0 {
                self.pending_hint = None;
                self.apply_hint();
                self.generation += 1;
            }
        }
        Ok(source)
    }
}

/// The simulated app. Shared by every session the factory opens.
pub struct FakeApp {
    model: Mutex<AppModel>,
}

impl FakeApp {
    pub fn new(options: FakeOptions) -> Arc<Self> {
        Arc::new(Self {
            model: Mutex::new(AppModel::new(options)),
        })
    }

    pub fn default_app() -> Arc<Self> {
        Self::new(FakeOptions::default())
    }

    /// Runs `f` against the app state.
    pub fn with<R>(&self, f: impl FnOnce(&mut AppModel) -> R) -> R {
        f(&mut self.model.lock().unwrap())
    }

    pub fn screen(&self) -> Screen {
        self.with(|m| m.screen)
    }

    /// Jumps straight to `screen`, starting a game first if it needs one.
    pub fn set_screen(&self, screen: Screen) {
        self.with(|m| {
            m.screen = screen;
            m.generation += 1;
        });
    }

    pub fn calls(&self) -> Vec<String> {
        self.with(|m| m.calls.clone())
    }

    pub fn session(self: &Arc<Self>) -> Arc<FakeSession> {
        self.with(|m| m.sessions_opened += 1);
        Arc::new(FakeSession {
            app: self.clone(),
            closed: AtomicBool::new(false),
        })
    }
}

/// One session against the [`FakeApp`].
pub struct FakeSession {
    app: Arc<FakeApp>,
    closed: AtomicBool,
}

impl FakeSession {
    fn check_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(DriverError::NoSession)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AutomationDriver for FakeSession {
    async fn find_elements(&self, by: &LocateBy) -> Result<Vec<ElementRef>, DriverError> {
        self.check_open()?;
        self.app.with(|m| m.find(by))
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        self.check_open()?;
        let n = self.app.with(|m| m.resolve(element))?;
        Ok(match name {
            "name" => Some(n.name),
            "label" => Some(n.label),
            "value" => n.value,
            "type" => Some(n.element_type.to_string()),
            "visible" => Some("true".to_string()),
            _ => None,
        })
    }

    async fn rect(&self, element: &ElementRef) -> Result<ElementFrame, DriverError> {
        self.check_open()?;
        Ok(self.app.with(|m| m.resolve(element))?.frame)
    }

    async fn click(&self, element: &ElementRef) -> Result<(), DriverError> {
        self.check_open()?;
        self.app.with(|m| -> Result<(), DriverError> {
            let n = m.resolve(element)?;
            m.press(&n.key);
            Ok(())
        })
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), DriverError> {
        self.check_open()?;
        self.app.with(|m| -> Result<(), DriverError> {
            let n = m.resolve(element)?;
            m.calls.push(format!("keys:{}:{text}", n.key));
            Ok(())
        })
    }

    async fn tap_at(&self, point: Point) -> Result<(), DriverError> {
        self.check_open()?;
        self.app.with(|m| -> Result<(), DriverError> {
            m.calls.push(format!("tap_at:{},{}", point.x, point.y));
            let hit = m.render().into_iter().rev().find(|n| n.frame.contains(point));
            if let Some(n) = hit {
                m.press(&n.key);
            }
            Ok(())
        })
    }

    async fn long_press(&self, point: Point, duration_secs: f64) -> Result<(), DriverError> {
        self.check_open()?;
        self.app.with(|m| -> Result<(), DriverError> {
            m.calls.push(format!("long_press:{},{}:{duration_secs}", point.x, point.y));
            if m.screen == Screen::InGame && m.options.debug_menu && duration_secs >= 2.0 && grid_contains(point) {
                m.screen = Screen::DebugMenu;
            }
            m.generation += 1;
            Ok(())
        })
    }

    async fn scroll(&self, direction: ScrollDirection) -> Result<(), DriverError> {
        self.check_open()?;
        self.app.with(|m| -> Result<(), DriverError> {
            m.calls.push(format!("scroll:{}", direction.as_str()));
            if m.screen == Screen::Settings && direction == ScrollDirection::Down {
                m.settings_scrolled = true;
            }
            m.generation += 1;
            Ok(())
        })
    }

    async fn page_source(&self) -> Result<String, DriverError> {
        self.check_open()?;
        self.app.with(|m| m.read_source())
    }

    async fn window_size(&self) -> Result<WindowSize, DriverError> {
        self.check_open()?;
        Ok(WINDOW)
    }

    async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.check_open()?;
        if self.app.with(|m| m.options.fail_screenshots) {
            return Err(DriverError::Endpoint {
                error: "unknown error".to_string(),
                message: "screenshot failed".to_string(),
            });
        }
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(&self) -> Result<(), DriverError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.app.with(|m| m.sessions_closed += 1);
        }
        Ok(())
    }
}

/// Opens [`FakeSession`]s against one shared [`FakeApp`].
pub struct FakeFactory {
    pub app: Arc<FakeApp>,
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn open(&self) -> Result<Arc<dyn AutomationDriver>, DriverError> {
        if self.app.with(|m| m.options.fail_open) {
            return Err(DriverError::Http("connection refused".to_string()));
        }
        Ok(self.app.session())
    }
}

/// A runner over `app` with a manual clock and evidence under `dir`.
pub fn fake_runner(app: &Arc<FakeApp>, dir: &Path) -> ScenarioRunner {
    let config = HarnessConfig {
        evidence_dir: dir.to_path_buf(),
        ..HarnessConfig::default()
    };
    let store = EvidenceStore::create_named(dir, "run").unwrap();
    ScenarioRunner::new(
        config,
        Arc::new(FakeFactory { app: app.clone() }),
        Arc::new(ManualClock::new()),
        store,
    )
}

// ---------------------------------------------------------------------------
// Mock WebDriver endpoint
// ---------------------------------------------------------------------------

/// Mocks `method path` on `server`, answering with `status` and a
/// `{"value": ...}` JSON body.
pub async fn webdriver_mock(server: &mut ServerGuard, method: &str, path: &str, status: usize, value: Value) -> Mock {
    server
        .mock(method, path)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": value }).to_string())
        .create_async()
        .await
}

/// Mocks a successful `method path` that must be called exactly `hits` times.
pub async fn expect_webdriver_call(server: &mut ServerGuard, method: &str, path: &str, hits: usize) -> Mock {
    server
        .mock(method, path)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "value": null }).to_string())
        .expect(hits)
        .create_async()
        .await
}

/// A WebDriver error payload, as Appium sends it.
pub fn webdriver_error(error: &str, message: &str) -> Value {
    json!({ "error": error, "message": message })
}

/// Mocks session creation answering with session id `s1`.
pub async fn session_mock(server: &mut ServerGuard) -> Mock {
    webdriver_mock(server, "POST", "/session", 200, json!({ "sessionId": "s1", "capabilities": {} })).await
}
