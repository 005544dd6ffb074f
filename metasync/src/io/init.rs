//! Initialization helpers for `.metasync/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::config::{SyncConfig, write_config};

const GITIGNORE: &str = "runs/\n*.tmp\n";

/// All canonical paths within `.metasync/` for a project root.
#[derive(Debug, Clone)]
pub struct MetasyncPaths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub config_path: PathBuf,
    pub gitignore_path: PathBuf,
    pub runs_dir: PathBuf,
}

impl MetasyncPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(".metasync");
        Self {
            root: root.clone(),
            state_dir: state_dir.clone(),
            config_path: state_dir.join("config.toml"),
            gitignore_path: state_dir.join(".gitignore"),
            runs_dir: state_dir.join("runs"),
        }
    }

    /// Directory holding the records of one run.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(run_id)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Overwrite existing files.
    pub force: bool,
}

/// Create `.metasync/config.toml` (defaults) and `.metasync/.gitignore`.
///
/// Existing files are kept unless `force` is set.
pub fn init_metasync(root: &Path, options: &InitOptions) -> Result<MetasyncPaths> {
    let paths = MetasyncPaths::new(root);
    fs::create_dir_all(&paths.state_dir)
        .with_context(|| format!("create {}", paths.state_dir.display()))?;

    if options.force || !paths.config_path.exists() {
        debug!(path = %paths.config_path.display(), "writing default config");
        write_config(&paths.config_path, &SyncConfig::default())?;
    }
    if options.force || !paths.gitignore_path.exists() {
        fs::write(&paths.gitignore_path, GITIGNORE)
            .with_context(|| format!("write {}", paths.gitignore_path.display()))?;
    }
    Ok(paths)
}
