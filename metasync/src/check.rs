//! Dry-run preview for `metasync check`: regenerate and diff, never commit.

use std::path::Path;

use anyhow::{Context, Result};
use similar::TextDiff;
use tracing::{info, instrument};

use crate::core::gate::{changed, digest_hex};
use crate::io::config::SyncConfig;
use crate::io::fetcher::Fetcher;
use crate::io::generator::Generator;
use crate::io::vcs::Vcs;
use crate::pipeline::{RunOptions, regenerate};

/// What a publication run would see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub changed: bool,
    pub digest: String,
    /// `None` when the artifact has never been committed.
    pub previous_digest: Option<String>,
    /// Unified diff of committed vs regenerated content; empty when unchanged.
    pub unified_diff: String,
}

/// Regenerate the artifact and compare it with the committed version.
///
/// The regenerated file is left in the working tree.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn check_artifact<F: Fetcher, G: Generator, V: Vcs>(
    root: &Path,
    cfg: &SyncConfig,
    fetcher: &F,
    generator: &G,
    vcs: &V,
    options: &RunOptions,
) -> Result<CheckReport> {
    let mut log = String::new();
    let artifact = regenerate(
        root,
        cfg,
        fetcher,
        generator,
        options.fetch && cfg.fetch.enabled,
        &mut log,
    )?;
    let previous = vcs
        .read_published(&artifact.path)
        .context("read published artifact")?;

    let is_changed = changed(&artifact.contents, previous.as_deref());
    let unified_diff = if is_changed {
        render_diff(
            &artifact.path.to_string_lossy(),
            previous.as_deref().unwrap_or_default(),
            &artifact.contents,
        )
    } else {
        String::new()
    };
    info!(changed = is_changed, "check finished");
    Ok(CheckReport {
        changed: is_changed,
        digest: digest_hex(&artifact.contents),
        previous_digest: previous.as_deref().map(digest_hex),
        unified_diff,
    })
}

/// Line-based unified diff of two artifact versions (lossy UTF-8).
pub fn render_diff(name: &str, previous: &[u8], candidate: &[u8]) -> String {
    let old = String::from_utf8_lossy(previous);
    let new = String::from_utf8_lossy(candidate);
    let diff = TextDiff::from_lines(old.as_ref(), new.as_ref())
        .unified_diff()
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .context_radius(3)
        .to_string();
    if diff.is_empty() {
        // Only differences invisible to a line diff (e.g. invalid UTF-8 bytes).
        return format!("Binary content of {name} differs\n");
    }
    diff
}
