//! Test-only helpers: scripted generator, recording VCS fake and git fixtures.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::core::types::{Identity, PushTarget};
use crate::io::generator::{GenerateReport, GenerateRequest, Generator};
use crate::io::vcs::{Credential, Vcs};

/// Commit captured by [`RecordingVcs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub id: String,
    pub path: PathBuf,
    pub identity: Identity,
    pub message: String,
}

/// In-memory [`Vcs`] that records every write.
///
/// A commit counts as unpushed until a later push succeeds.
#[derive(Debug, Default)]
pub struct RecordingVcs {
    published: RefCell<Option<Vec<u8>>>,
    commits: RefCell<Vec<RecordedCommit>>,
    pushes: RefCell<Vec<PushTarget>>,
    pushed_commits: Cell<usize>,
    fail_read: bool,
    fail_commit: bool,
    fail_push: Cell<bool>,
}

impl RecordingVcs {
    /// Fake whose Publication Record already holds `contents`.
    pub fn with_published(contents: &[u8]) -> Self {
        Self {
            published: RefCell::new(Some(contents.to_vec())),
            ..Self::default()
        }
    }

    pub fn failing_read() -> Self {
        Self {
            fail_read: true,
            ..Self::default()
        }
    }

    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    pub fn failing_push() -> Self {
        Self {
            fail_push: Cell::new(true),
            ..Self::default()
        }
    }

    /// Make later pushes fail or succeed.
    pub fn set_push_failure(&self, fail: bool) {
        self.fail_push.set(fail);
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.borrow().clone()
    }

    pub fn pushes(&self) -> Vec<PushTarget> {
        self.pushes.borrow().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.borrow().len()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.borrow().len()
    }
}

impl Vcs for RecordingVcs {
    fn read_published(&self, _path: &Path) -> Result<Option<Vec<u8>>> {
        if self.fail_read {
            return Err(anyhow!("scripted read failure"));
        }
        Ok(self.published.borrow().clone())
    }

    fn commit_artifact(&self, path: &Path, identity: &Identity, message: &str) -> Result<String> {
        if self.fail_commit {
            return Err(anyhow!("scripted commit failure"));
        }
        let mut commits = self.commits.borrow_mut();
        let id = format!("commit-{}", commits.len() + 1);
        commits.push(RecordedCommit {
            id: id.clone(),
            path: path.to_path_buf(),
            identity: identity.clone(),
            message: message.to_string(),
        });
        Ok(id)
    }

    fn push(&self, target: &PushTarget, _credential: Option<&Credential>) -> Result<()> {
        if self.fail_push.get() {
            return Err(anyhow!("scripted push failure"));
        }
        self.pushes.borrow_mut().push(target.clone());
        self.pushed_commits.set(self.commits.borrow().len());
        Ok(())
    }

    fn unpushed_publication(
        &self,
        _target: &PushTarget,
        _identity: &Identity,
    ) -> Result<Option<String>> {
        let commits = self.commits.borrow();
        if commits.len() > self.pushed_commits.get() {
            return Ok(commits.last().map(|commit| commit.id.clone()));
        }
        Ok(None)
    }
}

/// One scripted generator response.
#[derive(Debug, Clone)]
pub struct ScriptedGeneration {
    /// Bytes written to `artifact` (relative to the request workdir); `None` writes nothing.
    pub contents: Option<Vec<u8>>,
    pub success: bool,
}

impl ScriptedGeneration {
    pub fn writes(contents: &[u8]) -> Self {
        Self {
            contents: Some(contents.to_vec()),
            success: true,
        }
    }

    pub fn fails() -> Self {
        Self {
            contents: None,
            success: false,
        }
    }
}

/// [`Generator`] that answers `generator` requests from a queue and accepts
/// every `setup` request.
#[derive(Debug)]
pub struct ScriptedGenerator {
    artifact: PathBuf,
    queue: RefCell<VecDeque<ScriptedGeneration>>,
    setup_calls: Cell<usize>,
    fail_setup: bool,
}

impl ScriptedGenerator {
    pub fn new(artifact: impl Into<PathBuf>, responses: Vec<ScriptedGeneration>) -> Self {
        Self {
            artifact: artifact.into(),
            queue: RefCell::new(responses.into()),
            setup_calls: Cell::new(0),
            fail_setup: false,
        }
    }

    pub fn with_failing_setup(mut self) -> Self {
        self.fail_setup = true;
        self
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.get()
    }

    pub fn remaining(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl Generator for ScriptedGenerator {
    fn run(&self, request: &GenerateRequest) -> Result<GenerateReport> {
        if request.label == "setup" {
            self.setup_calls.set(self.setup_calls.get() + 1);
            return Ok(GenerateReport {
                success: !self.fail_setup,
                summary: if self.fail_setup {
                    "scripted setup failure".to_string()
                } else {
                    String::new()
                },
                log: "scripted setup\n".to_string(),
            });
        }
        let next = self
            .queue
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted generator exhausted"))?;
        if let Some(contents) = &next.contents {
            let path = request.workdir.join(&self.artifact);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        }
        Ok(GenerateReport {
            success: next.success,
            summary: if next.success {
                String::new()
            } else {
                "scripted generator failure".to_string()
            },
            log: "scripted generator\n".to_string(),
        })
    }
}

/// A working repository on `main` with a bare `origin` remote, in a temp dir.
pub struct TestRepo {
    temp: tempfile::TempDir,
    work: PathBuf,
    remote: PathBuf,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let remote = temp.path().join("remote.git");
        let work = temp.path().join("work");
        fs::create_dir_all(&remote)?;
        fs::create_dir_all(&work)?;

        run_git(&remote, &["init", "--quiet", "--bare"])?;
        run_git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
        run_git(&work, &["init", "--quiet"])?;
        run_git(&work, &["checkout", "--quiet", "-b", "main"])?;
        run_git(&work, &["config", "user.name", "Fixture"])?;
        run_git(&work, &["config", "user.email", "fixture@example.org"])?;
        run_git(&work, &["config", "commit.gpgsign", "false"])?;
        fs::write(work.join("README.md"), "fixture\n")?;
        fs::create_dir_all(work.join(".metasync"))?;
        fs::write(work.join(".metasync").join(".gitignore"), "runs/\n")?;
        run_git(&work, &["add", "-A"])?;
        run_git(&work, &["commit", "--quiet", "-m", "initial"])?;
        let remote_arg = remote.to_string_lossy().to_string();
        run_git(&work, &["remote", "add", "origin", &remote_arg])?;
        run_git(&work, &["push", "--quiet", "origin", "main"])?;

        Ok(Self { temp, work, remote })
    }

    /// Working tree root.
    pub fn path(&self) -> &Path {
        &self.work
    }

    /// Bare remote path.
    pub fn remote_path(&self) -> &Path {
        &self.remote
    }

    pub fn write(&self, rel: &str, contents: &[u8]) -> Result<()> {
        let path = self.work.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    /// Commit `rel` with `contents` as the fixture identity.
    pub fn commit_file(&self, rel: &str, contents: &[u8], message: &str) -> Result<()> {
        self.write(rel, contents)?;
        run_git(&self.work, &["add", "--", rel])?;
        run_git(&self.work, &["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    pub fn head(&self) -> Result<String> {
        Ok(run_git(&self.work, &["rev-parse", "HEAD"])?.trim().to_string())
    }

    pub fn commit_count(&self) -> Result<usize> {
        let out = run_git(&self.work, &["rev-list", "--count", "HEAD"])?;
        out.trim().parse().context("parse commit count")
    }

    /// Tip of `main` on the bare remote.
    pub fn remote_main(&self) -> Result<String> {
        Ok(run_git(&self.remote, &["rev-parse", "refs/heads/main"])?
            .trim()
            .to_string())
    }

    /// `author name <email>` of `HEAD`.
    pub fn head_author(&self) -> Result<String> {
        Ok(run_git(&self.work, &["log", "-1", "--format=%an <%ae>"])?
            .trim()
            .to_string())
    }

    /// Commit `rel` with `contents` from a separate clone and push it to the
    /// remote's `main`, leaving the working repository behind.
    pub fn push_upstream(&self, rel: &str, contents: &[u8], message: &str) -> Result<()> {
        let upstream = self.temp.path().join("upstream");
        if !upstream.exists() {
            let remote_arg = self.remote.to_string_lossy().to_string();
            let dest_arg = upstream.to_string_lossy().to_string();
            run_git(self.temp.path(), &["clone", "--quiet", &remote_arg, &dest_arg])?;
        } else {
            run_git(&upstream, &["pull", "--quiet", "--ff-only", "origin", "main"])?;
        }
        let path = upstream.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        run_git(&upstream, &["add", "--", rel])?;
        run_git(
            &upstream,
            &[
                "-c",
                "user.name=Upstream",
                "-c",
                "user.email=upstream@example.org",
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "-m",
                message,
            ],
        )?;
        run_git(&upstream, &["push", "--quiet", "origin", "HEAD:refs/heads/main"])?;
        Ok(())
    }

    /// Run git in the working tree and return stdout.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.work, args)
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
