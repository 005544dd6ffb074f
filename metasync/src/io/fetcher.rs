//! Fetcher: brings the tracked repository up to date before generation.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::git::Git;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub root: PathBuf,
    pub remote: String,
    pub branch: String,
    /// Clone source for a root that is not yet a repository.
    pub url: Option<String>,
    /// Artifact path relative to `root`. Local commits that touch only this
    /// path may be dropped when the branch has diverged from the remote.
    pub artifact_path: PathBuf,
}

pub trait Fetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<()>;
}

/// Clones when the root is missing or empty, otherwise fetches and fast-forwards.
pub struct GitFetcher;

impl Fetcher for GitFetcher {
    #[instrument(skip_all, fields(remote = %request.remote, branch = %request.branch))]
    fn fetch(&self, request: &FetchRequest) -> Result<()> {
        let git = Git::new(&request.root);
        if git.is_repository() {
            if git.remote_url(&request.remote)?.is_none() {
                return Err(anyhow!(
                    "remote '{}' is not configured in {}",
                    request.remote,
                    request.root.display()
                ));
            }
            git.fetch_branch(&request.remote, &request.branch)?;
            return sync_to_fetched(&git, request);
        }

        let url = request.url.as_deref().ok_or_else(|| {
            anyhow!(
                "{} is not a git repository and fetch.url is not set",
                request.root.display()
            )
        })?;
        if !is_missing_or_empty(&request.root)? {
            return Err(anyhow!(
                "refusing to clone into non-empty directory {}",
                request.root.display()
            ));
        }
        debug!(url = %url, "root is not a repository, cloning");
        Git::clone_into(url, &request.root, &request.branch)?;
        Ok(())
    }
}

/// Bring the current branch up to `FETCH_HEAD`.
///
/// A branch that diverged only through artifact commits (a publication whose
/// push never landed) is reset onto the remote so the artifact is regenerated
/// against the new upstream. Any other divergence is an error.
fn sync_to_fetched(git: &Git, request: &FetchRequest) -> Result<()> {
    let target = format!("{}/{}", request.remote, request.branch);
    if git.head_sha()?.is_none() || git.is_ancestor("HEAD", "FETCH_HEAD")? {
        git.fast_forward("FETCH_HEAD")
            .with_context(|| format!("fast-forward to {target}"))?;
        info!("repository up to date");
        return Ok(());
    }
    if git.is_ancestor("FETCH_HEAD", "HEAD")? {
        info!("local branch is ahead of {target}");
        return Ok(());
    }

    let artifact = git.repo_path(&request.artifact_path)?;
    let touched = git.paths_touched("FETCH_HEAD..HEAD")?;
    if touched.iter().any(|path| *path != artifact) {
        return Err(anyhow!(
            "local branch diverged from {target} with commits outside {artifact}"
        ));
    }
    warn!(
        artifact = %artifact,
        "dropping unpushed artifact commits that diverged from {target}"
    );
    git.reset_keep("FETCH_HEAD")
        .with_context(|| format!("reset onto {target}"))?;
    Ok(())
}

fn is_missing_or_empty(path: &std::path::Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let mut entries =
        fs::read_dir(path).with_context(|| format!("read directory {}", path.display()))?;
    Ok(entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn non_repository_without_url_fails() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = FetchRequest {
            root: temp.path().join("work"),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            url: None,
            artifact_path: PathBuf::from("metadata.xml"),
        };
        let err = GitFetcher.fetch(&request).expect_err("fetch should fail");
        assert!(err.to_string().contains("fetch.url"));
    }

    fn request_for(repo: &TestRepo) -> FetchRequest {
        FetchRequest {
            root: repo.path().to_path_buf(),
            remote: "origin".to_string(),
            branch: "main".to_string(),
            url: None,
            artifact_path: PathBuf::from("metadata.xml"),
        }
    }

    #[test]
    fn diverged_artifact_commit_is_reset_onto_remote() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("metadata.xml", b"<meta>local</meta>\n", "unpushed")
            .expect("commit");
        repo.push_upstream("sources.txt", b"upstream\n", "upstream")
            .expect("upstream");

        GitFetcher.fetch(&request_for(&repo)).expect("fetch");
        assert_eq!(repo.head().expect("head"), repo.remote_main().expect("remote"));
        assert!(!repo.path().join("metadata.xml").exists());
        assert!(repo.path().join("sources.txt").exists());
    }

    #[test]
    fn diverged_foreign_commit_is_an_error() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("notes.txt", b"local\n", "local work")
            .expect("commit");
        let head = repo.head().expect("head");
        repo.push_upstream("sources.txt", b"upstream\n", "upstream")
            .expect("upstream");

        let err = GitFetcher
            .fetch(&request_for(&repo))
            .expect_err("fetch should refuse");
        assert!(err.to_string().contains("diverged"), "{err:#}");
        assert_eq!(repo.head().expect("head"), head);
    }

    #[test]
    fn local_branch_ahead_is_left_alone() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("metadata.xml", b"<meta/>\n", "unpushed")
            .expect("commit");
        let head = repo.head().expect("head");

        GitFetcher.fetch(&request_for(&repo)).expect("fetch");
        assert_eq!(repo.head().expect("head"), head);
    }

    #[test]
    fn refuses_to_clone_into_non_empty_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("work");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("stray.txt"), "x").expect("write");
        let request = FetchRequest {
            root,
            remote: "origin".to_string(),
            branch: "main".to_string(),
            url: Some("https://example.invalid/acme/metadata.git".to_string()),
            artifact_path: PathBuf::from("metadata.xml"),
        };
        let err = GitFetcher.fetch(&request).expect_err("fetch should fail");
        assert!(err.to_string().contains("non-empty"));
    }
}
