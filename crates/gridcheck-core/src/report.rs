//! Scenario outcomes and run reports.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final result of one scenario. Built once by the runner and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub passed: bool,
    /// Screenshots and page-source dumps, in capture order.
    pub evidence: Vec<PathBuf>,
    pub note: String,
    pub elapsed_ms: u64,
}

/// Outcomes of a whole run, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub evidence_dir: PathBuf,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn new(evidence_dir: PathBuf) -> Self {
        Self {
            started_at: Utc::now(),
            evidence_dir,
            outcomes: Vec::new(),
        }
    }

    /// True when every scenario passed. An empty run passes.
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }
}
