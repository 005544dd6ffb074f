//! Orchestration for a single `metasync run`.
//!
//! Strictly linear: fetch, setup, generate, diff gate, publish. Every run
//! leaves a record under `.metasync/runs/<run_id>/`, whether it succeeds or not.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, instrument, warn};

use crate::core::gate::{changed, digest_hex};
use crate::core::types::{Artifact, PublishOutcome, RunContext, SkipReason, Trigger};
use crate::error::PipelineError;
use crate::io::config::SyncConfig;
use crate::io::fetcher::{FetchRequest, Fetcher};
use crate::io::generator::{GenerateRequest, Generator};
use crate::io::git::Git;
use crate::io::init::MetasyncPaths;
use crate::io::run_context::{ContextInputs, repository_from_remote, resolve_run_context};
use crate::io::run_log::{RunLogPaths, RunSummary, write_run_log};
use crate::io::vcs::Vcs;
use crate::publish::{PublishPolicy, publish};

/// Per-invocation switches that override config.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Run the fetcher (still subject to `fetch.enabled`).
    pub fetch: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { fetch: true }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub context: RunContext,
    pub outcome: PublishOutcome,
    pub summary_path: PathBuf,
}

/// Execute one run of the pipeline in `root`.
///
/// Stage failures are returned as [`PipelineError`] inside the `anyhow::Error`
/// (use `downcast_ref`); the run summary is written before returning either way.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_pipeline<F: Fetcher, G: Generator, V: Vcs>(
    root: &Path,
    cfg: &SyncConfig,
    inputs: &ContextInputs,
    fetcher: &F,
    generator: &G,
    vcs: &V,
    options: &RunOptions,
) -> Result<RunReport> {
    let started_at = Utc::now();
    let clock = Instant::now();
    let git = Git::new(root);
    let mut context = resolve_run_context(&git, inputs, &cfg.fetch.remote, started_at)?;
    let policy = PublishPolicy::from_config(cfg)?;
    info!(run_id = %context.run_id, trigger = %context.trigger, "run started");

    let mut record = RunRecord::default();
    let result = (|| -> Result<PublishOutcome, PipelineError> {
        if let Trigger::Dispatch { event } = &context.trigger
            && !cfg.accepts_event(event)
        {
            info!(event = %event, "dispatch event not accepted, skipping run");
            return Ok(PublishOutcome::Skipped(SkipReason::IgnoredEvent {
                event: event.clone(),
            }));
        }

        let fetched = options.fetch && cfg.fetch.enabled;
        let artifact = regenerate(root, cfg, fetcher, generator, fetched, &mut record.log)?;
        if fetched && context.repository.is_none() {
            context.repository = repository_from_remote(&git, &cfg.fetch.remote);
        }

        let previous = vcs
            .read_published(&artifact.path)
            .context("read published artifact")
            .map_err(PipelineError::Diff)?;
        record.changed = Some(changed(&artifact.contents, previous.as_deref()));
        record.digest = Some(digest_hex(&artifact.contents));
        record.previous_digest = previous.as_deref().map(digest_hex);

        publish(&artifact, previous.as_deref(), &context, &policy, vcs)
    })();

    let paths = RunLogPaths::new(MetasyncPaths::new(root).run_dir(&context.run_id));
    let log = std::mem::take(&mut record.log);
    let summary = record.into_summary(&context, cfg, &result, started_at, clock.elapsed());
    let log = (!log.is_empty()).then_some(log.as_str());
    if let Err(err) = write_run_log(&paths, &summary, log) {
        warn!(err = %format!("{err:#}"), "failed to write run log");
    }

    match result {
        Ok(outcome) => {
            info!(outcome = ?outcome, "run finished");
            Ok(RunReport {
                context,
                outcome,
                summary_path: paths.summary_path,
            })
        }
        Err(err) => {
            warn!(stage = %err.stage(), "run failed");
            Err(anyhow::Error::new(err))
        }
    }
}

/// Fetch (optionally), run setup and the generator, and read the candidate artifact.
///
/// Captured command output is appended to `log` even when a step fails.
pub fn regenerate<F: Fetcher, G: Generator>(
    root: &Path,
    cfg: &SyncConfig,
    fetcher: &F,
    generator: &G,
    fetch: bool,
    log: &mut String,
) -> Result<Artifact, PipelineError> {
    if fetch {
        fetcher
            .fetch(&FetchRequest {
                root: root.to_path_buf(),
                remote: cfg.fetch.remote.clone(),
                branch: cfg.fetch.branch.clone(),
                url: cfg.fetch.url.clone(),
                artifact_path: cfg.artifact_path.clone(),
            })
            .map_err(PipelineError::Fetch)?;
    }

    let timeout = Duration::from_secs(cfg.generator_timeout_secs);
    if !cfg.setup.command.is_empty() {
        run_external(generator, "setup", &cfg.setup.command, root, timeout, cfg, log)
            .map_err(PipelineError::Setup)?;
    }
    run_external(generator, "generator", &cfg.generator.command, root, timeout, cfg, log)
        .map_err(PipelineError::Generate)?;

    let path = root.join(&cfg.artifact_path);
    let contents = fs::read(&path)
        .with_context(|| format!("read generated artifact {}", path.display()))
        .map_err(PipelineError::Generate)?;
    Ok(Artifact {
        path: cfg.artifact_path.clone(),
        contents,
    })
}

fn run_external<G: Generator>(
    generator: &G,
    label: &str,
    command: &[String],
    root: &Path,
    timeout: Duration,
    cfg: &SyncConfig,
    log: &mut String,
) -> Result<()> {
    let report = generator.run(&GenerateRequest {
        label: label.to_string(),
        command: command.to_vec(),
        workdir: root.to_path_buf(),
        timeout,
        output_limit_bytes: cfg.output_limit_bytes,
    })?;
    log.push_str(&report.log);
    if !report.success {
        return Err(anyhow!("{label} `{}` failed: {}", command.join(" "), report.summary));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct RunRecord {
    changed: Option<bool>,
    digest: Option<String>,
    previous_digest: Option<String>,
    log: String,
}

impl RunRecord {
    fn into_summary(
        self,
        context: &RunContext,
        cfg: &SyncConfig,
        result: &Result<PublishOutcome, PipelineError>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> RunSummary {
        let (outcome, error_stage, error, local_commit) = match result {
            Ok(outcome) => (Some(outcome.clone()), None, None, None),
            Err(err) => (
                None,
                Some(err.stage()),
                Some(err.detail()),
                err.local_commit().map(str::to_string),
            ),
        };
        RunSummary {
            run_id: context.run_id.clone(),
            trigger: context.trigger.clone(),
            repository: context.repository.as_ref().map(ToString::to_string),
            artifact: cfg.artifact_path.to_string_lossy().to_string(),
            changed: self.changed,
            digest: self.digest,
            previous_digest: self.previous_digest,
            outcome,
            error_stage,
            error,
            local_commit,
            started_at: timestamp(started_at),
            ended_at: timestamp(Utc::now()),
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
