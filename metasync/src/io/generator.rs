//! Generator abstraction for the external artifact-producing commands.
//!
//! The [`Generator`] trait decouples the pipeline from process spawning. Both
//! the optional setup command and the generator proper go through it. Tests use
//! scripted generators that write artifact content without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Parameters for one external command invocation.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Log label, e.g. `setup` or `generator`.
    pub label: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    /// Working directory (the repository root).
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// What a command run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    pub success: bool,
    /// One-line failure description; empty on success.
    pub summary: String,
    /// Captured stdout/stderr, ready to append to the run log.
    pub log: String,
}

/// Abstraction over how setup/generator commands are executed.
pub trait Generator {
    /// Run the command. `Err` means it could not be run at all; a command that
    /// ran and failed is reported through [`GenerateReport::success`].
    fn run(&self, request: &GenerateRequest) -> Result<GenerateReport>;
}

/// Generator that spawns the configured command as a child process.
pub struct CommandGenerator;

impl Generator for CommandGenerator {
    #[instrument(skip_all, fields(label = %request.label, timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &GenerateRequest) -> Result<GenerateReport> {
        let (program, args) = request
            .command
            .split_first()
            .ok_or_else(|| anyhow!("{} command is empty", request.label))?;
        info!(program = %program, "running {}", request.label);

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&request.workdir);
        let output = run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)?;

        let log = output.render_log(&request.label);
        if output.success() {
            return Ok(GenerateReport {
                success: true,
                summary: String::new(),
                log,
            });
        }
        let summary = output.failure_summary();
        warn!(summary = %summary, "{} failed", request.label);
        Ok(GenerateReport {
            success: false,
            summary,
            log,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn request(workdir: &std::path::Path, script: &str) -> GenerateRequest {
        GenerateRequest {
            label: "generator".to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            workdir: workdir.to_path_buf(),
            timeout: Duration::from_secs(10),
            output_limit_bytes: 4096,
        }
    }

    #[test]
    fn runs_in_workdir_and_captures_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = CommandGenerator
            .run(&request(
                temp.path(),
                "echo '<meta/>' > metadata.xml; echo generated",
            ))
            .expect("run");
        assert!(report.success);
        assert!(report.log.contains("generated"));
        assert_eq!(
            fs::read_to_string(temp.path().join("metadata.xml")).expect("read"),
            "<meta/>\n"
        );
    }

    #[test]
    fn failing_command_is_reported_not_raised() {
        let temp = tempfile::tempdir().expect("tempdir");
        let report = CommandGenerator
            .run(&request(temp.path(), "echo 'upstream unreachable' >&2; exit 2"))
            .expect("run");
        assert!(!report.success);
        assert_eq!(report.summary, "exit code 2: upstream unreachable");
    }

    #[test]
    fn empty_command_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut req = request(temp.path(), "true");
        req.command.clear();
        assert!(CommandGenerator.run(&req).is_err());
    }
}
