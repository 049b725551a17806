//! Evidence files written during a run.
//!
//! Layout:
//!
//! ```text
//! <evidence_dir>/<run-stamp>/<scenario>/NN_<label>.png
//! <evidence_dir>/<run-stamp>/<scenario>/NN_<label>.xml
//! <evidence_dir>/<run-stamp>/<scenario>/actions.jsonl
//! ```
//!
//! `NN` is a per-scenario step counter, so artifacts sort in capture order.
//! Files are only ever added; nothing here overwrites or deletes.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::action::ActionLog;
use crate::snapshot::UiSnapshot;

const ACTIONS_FILENAME: &str = "actions.jsonl";

/// Keeps file names portable: anything outside `[A-Za-z0-9_-]` becomes `_`.
fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned
    }
}

/// Root of one run's evidence.
#[derive(Debug, Clone)]
pub struct EvidenceStore {
    run_dir: PathBuf,
}

impl EvidenceStore {
    /// Creates `<root>/<run-stamp>/`.
    pub fn create(root: &Path) -> std::io::Result<Self> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        Self::create_named(root, &stamp)
    }

    /// Creates `<root>/<run_name>/`.
    pub fn create_named(root: &Path, run_name: &str) -> std::io::Result<Self> {
        let run_dir = root.join(sanitize(run_name));
        std::fs::create_dir_all(&run_dir)?;
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Opens the evidence directory for one scenario.
    pub fn scenario(&self, name: &str) -> std::io::Result<ScenarioEvidence> {
        let dir = self.run_dir.join(sanitize(name));
        std::fs::create_dir_all(&dir)?;
        Ok(ScenarioEvidence {
            dir,
            step: 0,
            artifacts: Vec::new(),
            action_writer: None,
        })
    }
}

/// Evidence for one scenario: numbered artifacts plus an action log.
pub struct ScenarioEvidence {
    dir: PathBuf,
    step: u32,
    artifacts: Vec<PathBuf>,
    action_writer: Option<BufWriter<std::fs::File>>,
}

impl ScenarioEvidence {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Artifacts saved so far, in capture order.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    fn next_path(&mut self, label: &str, extension: &str) -> PathBuf {
        self.step += 1;
        self.dir
            .join(format!("{:02}_{}.{}", self.step, sanitize(label), extension))
    }

    fn write(&mut self, path: PathBuf, bytes: &[u8]) -> std::io::Result<PathBuf> {
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "evidence saved");
        self.artifacts.push(path.clone());
        Ok(path)
    }

    /// Saves a PNG screenshot.
    pub fn save_screenshot(&mut self, label: &str, png: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.next_path(label, "png");
        self.write(path, png)
    }

    /// Saves a page-source dump.
    pub fn save_snapshot(&mut self, label: &str, snapshot: &UiSnapshot) -> std::io::Result<PathBuf> {
        let path = self.next_path(label, "xml");
        self.write(path, snapshot.source.as_bytes())
    }

    /// Appends action log entries to `actions.jsonl`. The file joins the
    /// artifact list the first time anything is written to it.
    pub fn log_actions(&mut self, entries: &[ActionLog]) -> std::io::Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if self.action_writer.is_none() {
            let path = self.dir.join(ACTIONS_FILENAME);
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            self.action_writer = Some(BufWriter::new(file));
            self.artifacts.push(path);
        }
        if let Some(writer) = self.action_writer.as_mut() {
            for entry in entries {
                let json = serde_json::to_string(entry)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                writeln!(writer, "{}", json)?;
            }
            writer.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ScenarioEvidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioEvidence")
            .field("dir", &self.dir)
            .field("step", &self.step)
            .field("artifacts", &self.artifacts)
            .field("action_writer", &"<Option<BufWriter<File>>>")
            .finish()
    }
}
