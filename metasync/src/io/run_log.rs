//! Run records under `.metasync/runs/<run_id>/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{PublishOutcome, Stage, Trigger};

/// Persisted summary of one pipeline run (`summary.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub trigger: Trigger,
    pub repository: Option<String>,
    pub artifact: String,
    /// Diff gate result; `None` if the run ended before the gate.
    pub changed: Option<bool>,
    pub digest: Option<String>,
    pub previous_digest: Option<String>,
    pub outcome: Option<PublishOutcome>,
    pub error_stage: Option<Stage>,
    pub error: Option<String>,
    /// Commit left in the local repository by a failed push.
    pub local_commit: Option<String>,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RunLogPaths {
    pub dir: PathBuf,
    pub summary_path: PathBuf,
    pub generator_log_path: PathBuf,
}

impl RunLogPaths {
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        let dir = run_dir.into();
        Self {
            summary_path: dir.join("summary.json"),
            generator_log_path: dir.join("generator.log"),
            dir,
        }
    }
}

/// Write `summary.json` and, if any, the captured setup/generator output.
pub fn write_run_log(
    paths: &RunLogPaths,
    summary: &RunSummary,
    generator_log: Option<&str>,
) -> Result<()> {
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create run dir {}", paths.dir.display()))?;
    debug!(dir = %paths.dir.display(), "writing run log");
    if let Some(log) = generator_log {
        fs::write(&paths.generator_log_path, log)
            .with_context(|| format!("write {}", paths.generator_log_path.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(summary).context("serialize run summary")?;
    buf.push('\n');
    fs::write(&paths.summary_path, buf)
        .with_context(|| format!("write {}", paths.summary_path.display()))?;
    Ok(())
}

pub fn load_run_summary(path: &Path) -> Result<RunSummary> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read run summary {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse run summary {}", path.display()))
}
