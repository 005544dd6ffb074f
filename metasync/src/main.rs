//! Change-gated artifact publisher.
//!
//! Runs the configured generator, and commits (and, from the canonical
//! repository, pushes) the artifact only when its bytes changed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use metasync::check::check_artifact;
use metasync::core::types::{PublishOutcome, PushStatus, SkipReason};
use metasync::exit_codes;
use metasync::io::config::{SyncConfig, load_config};
use metasync::io::fetcher::GitFetcher;
use metasync::io::generator::CommandGenerator;
use metasync::io::git::Git;
use metasync::io::init::{InitOptions, MetasyncPaths, init_metasync};
use metasync::io::run_context::ContextInputs;
use metasync::logging;
use metasync::pipeline::{RunOptions, run_pipeline};

#[derive(Parser)]
#[command(
    name = "metasync",
    version,
    about = "Regenerate an artifact and publish it only when it changes"
)]
struct Cli {
    /// Repository root.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Config file [default: <root>/.metasync/config.toml].
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.metasync/config.toml` and `.metasync/.gitignore` if missing.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Fetch, regenerate, and publish the artifact if it changed.
    Run {
        /// Dispatch event type; omit for a manual run.
        #[arg(long, env = "METASYNC_EVENT")]
        event: Option<String>,
        /// `owner/name` of the repository this run executes in.
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: Option<String>,
        /// Skip the fetch step.
        #[arg(long)]
        no_fetch: bool,
    },
    /// Regenerate and show what would be published, without committing.
    Check {
        /// Skip the fetch step.
        #[arg(long)]
        no_fetch: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| MetasyncPaths::new(&cli.root).config_path);
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Run {
            event,
            repository,
            no_fetch,
        } => cmd_run(
            &cli.root,
            &load_config(&config_path)?,
            ContextInputs { event, repository },
            no_fetch,
        ),
        Command::Check { no_fetch } => cmd_check(&cli.root, &load_config(&config_path)?, no_fetch),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<i32> {
    let paths = init_metasync(root, &InitOptions { force }).context("metasync init")?;
    println!("{}", paths.config_path.display());
    Ok(exit_codes::OK)
}

fn cmd_run(root: &Path, cfg: &SyncConfig, inputs: ContextInputs, no_fetch: bool) -> Result<i32> {
    let report = run_pipeline(
        root,
        cfg,
        &inputs,
        &GitFetcher,
        &CommandGenerator,
        &Git::new(root),
        &RunOptions { fetch: !no_fetch },
    )?;
    println!("{}", describe_outcome(&report.outcome));
    Ok(exit_codes::OK)
}

fn cmd_check(root: &Path, cfg: &SyncConfig, no_fetch: bool) -> Result<i32> {
    let report = check_artifact(
        root,
        cfg,
        &GitFetcher,
        &CommandGenerator,
        &Git::new(root),
        &RunOptions { fetch: !no_fetch },
    )?;
    if !report.changed {
        println!("unchanged: {}", cfg.artifact_path.display());
        return Ok(exit_codes::OK);
    }
    print!("{}", report.unified_diff);
    Ok(exit_codes::CHANGED)
}

fn describe_outcome(outcome: &PublishOutcome) -> String {
    match outcome {
        PublishOutcome::Skipped(SkipReason::Unchanged) => "unchanged, nothing published".to_string(),
        PublishOutcome::Skipped(SkipReason::IgnoredEvent { event }) => {
            format!("ignored dispatch event '{event}'")
        }
        PublishOutcome::Published {
            commit,
            push: PushStatus::Pushed { remote, branch },
        } => format!("published {commit} to {remote}/{branch}"),
        PublishOutcome::Published {
            commit,
            push: PushStatus::Withheld(reason),
        } => format!("committed {commit} locally, push withheld: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metasync::core::types::WithheldReason;

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["metasync", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn parse_run_with_event_and_repository() {
        let cli = Cli::parse_from([
            "metasync",
            "--root",
            "/work",
            "run",
            "--event",
            "sync",
            "--repository",
            "acme/metadata",
            "--no-fetch",
        ]);
        assert_eq!(cli.root, PathBuf::from("/work"));
        match cli.command {
            Command::Run {
                event,
                repository,
                no_fetch,
            } => {
                assert_eq!(event.as_deref(), Some("sync"));
                assert_eq!(repository.as_deref(), Some("acme/metadata"));
                assert!(no_fetch);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn parse_check_with_config() {
        let cli = Cli::parse_from(["metasync", "check", "--config", "ci/metasync.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("ci/metasync.toml")));
        assert!(matches!(cli.command, Command::Check { no_fetch: false }));
    }

    #[test]
    fn describes_withheld_push() {
        let text = describe_outcome(&PublishOutcome::Published {
            commit: "abc123".to_string(),
            push: PushStatus::Withheld(WithheldReason::NoCanonicalConfigured),
        });
        assert_eq!(
            text,
            "committed abc123 locally, push withheld: no canonical repository configured"
        );
    }
}
