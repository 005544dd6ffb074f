//! Pipeline configuration stored under `.metasync/config.toml`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::repo_id::RepoIdentity;
use crate::core::types::{Identity, PushTarget};
use crate::io::message::CommitMessageTemplate;

/// Pipeline configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to values matching a typical CI setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Artifact path, relative to the repository root.
    pub artifact_path: PathBuf,

    /// `owner/name` of the only repository allowed to push. Unset means never push.
    pub canonical_repository: Option<String>,

    /// Dispatch event types that start a run; others are ignored.
    pub accepted_events: Vec<String>,

    /// Wall-clock budget for each of the setup and generator commands.
    pub generator_timeout_secs: u64,

    /// Truncate captured setup/generator stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    pub fetch: FetchConfig,
    pub setup: SetupConfig,
    pub generator: GeneratorConfig,
    pub identity: Identity,
    pub commit: CommitConfig,
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub enabled: bool,
    pub remote: String,
    pub branch: String,
    /// Clone source used when the working directory is not yet a repository.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SetupConfig {
    /// Optional environment preparation (e.g. `["pip","install","-r","requirements.txt"]`).
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Command that regenerates the artifact (e.g. `["python","sync.py"]`).
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CommitConfig {
    /// minijinja template for the commit message.
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PushConfig {
    /// Remote name or URL of the companion repository.
    pub remote: String,
    pub branch: String,
    /// Environment variable holding the push token. Empty uses ambient git credentials.
    pub token_env: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            url: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".to_string(), "sync.py".to_string()],
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "github-actions[bot]".to_string(),
            email: "41898282+github-actions[bot]@users.noreply.github.com".to_string(),
        }
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            message: "Sync {{ artifact }} ({{ digest_short }})".to_string(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "main".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("metadata.xml"),
            canonical_repository: None,
            accepted_events: vec!["sync".to_string()],
            generator_timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
            fetch: FetchConfig::default(),
            setup: SetupConfig::default(),
            generator: GeneratorConfig::default(),
            identity: Identity::default(),
            commit: CommitConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        validate_artifact_path(&self.artifact_path)?;
        if self.generator_timeout_secs == 0 {
            return Err(anyhow!("generator_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if !is_runnable(&self.generator.command) {
            return Err(anyhow!("generator.command must be a non-empty array"));
        }
        if !self.setup.command.is_empty() && !is_runnable(&self.setup.command) {
            return Err(anyhow!("setup.command must be empty or start with a program"));
        }
        if self.identity.name.trim().is_empty() || self.identity.email.trim().is_empty() {
            return Err(anyhow!("identity.name and identity.email must be non-empty"));
        }
        if self.fetch.enabled
            && (self.fetch.remote.trim().is_empty() || self.fetch.branch.trim().is_empty())
        {
            return Err(anyhow!("fetch.remote and fetch.branch must be non-empty"));
        }
        if self.push.remote.trim().is_empty() || self.push.branch.trim().is_empty() {
            return Err(anyhow!("push.remote and push.branch must be non-empty"));
        }
        self.canonical()
            .context("canonical_repository must be owner/name")?;
        CommitMessageTemplate::new(&self.commit.message).context("commit.message")?;
        Ok(())
    }

    /// Parsed canonical repository, if configured.
    pub fn canonical(&self) -> Result<Option<RepoIdentity>> {
        self.canonical_repository
            .as_deref()
            .map(RepoIdentity::parse)
            .transpose()
    }

    pub fn push_target(&self) -> PushTarget {
        PushTarget {
            remote: self.push.remote.clone(),
            branch: self.push.branch.clone(),
        }
    }

    /// True if `event` is one of the accepted dispatch event types.
    pub fn accepts_event(&self, event: &str) -> bool {
        self.accepted_events.iter().any(|accepted| accepted == event)
    }
}

fn is_runnable(command: &[String]) -> bool {
    command.first().is_some_and(|program| !program.trim().is_empty())
}

fn validate_artifact_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(anyhow!("artifact_path must be non-empty"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(anyhow!(
                    "artifact_path must be relative and stay inside the repository: {}",
                    path.display()
                ));
            }
        }
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SyncConfig::default()`.
pub fn load_config(path: &Path) -> Result<SyncConfig> {
    if !path.exists() {
        let cfg = SyncConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SyncConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SyncConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
