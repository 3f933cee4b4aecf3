//! Working-copy synchronisation and publishing.
//!
//! A repository URL maps to `<workdir>/<repo-name>`. The first run clones
//! into that path; later runs hard-reset, check out the primary branch and
//! pull. Any failing step aborts the sync; nothing is retried.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::git::Git;
use crate::io;
use crate::paths;
use crate::types::StackId;

pub const COMMIT_MESSAGE: &str = "Add CI/CD pipeline";
pub const DEFAULT_REMOTE: &str = "origin";

// ---------------------------------------------------------------------------
// GitBackend
// ---------------------------------------------------------------------------

/// The git operations the pipeline needs.
pub trait GitBackend {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
    fn reset_hard(&self, repo: &Path) -> Result<()>;
    fn checkout(&self, repo: &Path, branch: &str) -> Result<()>;
    fn pull(&self, repo: &Path) -> Result<()>;
    /// Create `branch` at HEAD and switch to it, resetting it if it exists.
    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()>;
    /// Whether `rel_path` has no staged, unstaged or untracked changes.
    fn is_clean(&self, repo: &Path, rel_path: &str) -> Result<bool>;
    fn add(&self, repo: &Path, rel_path: &str) -> Result<()>;
    fn commit(&self, repo: &Path, message: &str) -> Result<()>;
    fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<()>;
}

impl GitBackend for Git {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let args: [&OsStr; 5] = [
            OsStr::new("clone"),
            OsStr::new("--quiet"),
            OsStr::new("--"),
            OsStr::new(url),
            dest.as_os_str(),
        ];
        self.run("clone", None, args)?;
        Ok(())
    }

    fn reset_hard(&self, repo: &Path) -> Result<()> {
        self.run("reset", Some(repo), ["reset", "--hard", "--quiet"])?;
        Ok(())
    }

    fn checkout(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run("checkout", Some(repo), ["checkout", "--quiet", branch])?;
        Ok(())
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        self.run("pull", Some(repo), ["pull", "--quiet", "--ff-only"])?;
        Ok(())
    }

    fn create_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        self.run("checkout -B", Some(repo), ["checkout", "--quiet", "-B", branch])?;
        Ok(())
    }

    fn is_clean(&self, repo: &Path, rel_path: &str) -> Result<bool> {
        let status = self.run("status", Some(repo), ["status", "--porcelain", "--", rel_path])?;
        Ok(status.is_empty())
    }

    fn add(&self, repo: &Path, rel_path: &str) -> Result<()> {
        self.run("add", Some(repo), ["add", "--", rel_path])?;
        Ok(())
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.run("commit", Some(repo), ["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<()> {
        self.run("push", Some(repo), ["push", "--quiet", remote, branch])?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Working copies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Cloned,
    Refreshed,
}

/// A local checkout of the target repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopy {
    /// Project name derived from the repository URL.
    pub name: String,
    pub path: PathBuf,
    pub outcome: SyncOutcome,
}

/// Capability: make sure a fresh working copy of `url` exists locally.
pub trait EnsureWorkingCopy {
    fn ensure_fresh(&self, url: &str) -> Result<WorkingCopy>;
}

pub struct RepositorySync<G> {
    git: G,
    workdir: PathBuf,
    branch: String,
}

impl<G: GitBackend> RepositorySync<G> {
    pub fn new(git: G, workdir: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            git,
            workdir: workdir.into(),
            branch: branch.into(),
        }
    }

    pub fn git(&self) -> &G {
        &self.git
    }
}

impl<G: GitBackend> EnsureWorkingCopy for RepositorySync<G> {
    fn ensure_fresh(&self, url: &str) -> Result<WorkingCopy> {
        let name = paths::repo_name_from_url(url)?;
        let path = paths::working_copy_path(&self.workdir, &name);

        let outcome = if path.exists() {
            info!(repo = %name, path = %path.display(), "refreshing existing working copy");
            self.git.reset_hard(&path)?;
            self.git.checkout(&path, &self.branch)?;
            self.git.pull(&path)?;
            SyncOutcome::Refreshed
        } else {
            info!(repo = %name, path = %path.display(), "cloning repository");
            io::ensure_dir(&self.workdir)?;
            self.git.clone_repo(url, &path)?;
            SyncOutcome::Cloned
        };

        Ok(WorkingCopy {
            name,
            path,
            outcome,
        })
    }
}

// ---------------------------------------------------------------------------
// Publishing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Pushed,
    /// The workflow file matches HEAD; there was nothing to commit.
    NothingToCommit,
}

/// Commit the injected workflow on `branch` and push it to `origin`.
///
/// Does nothing when the workflow already matches HEAD. Stops at the first
/// failing step and leaves the local branch as-is.
pub fn publish_workflow(
    git: &dyn GitBackend,
    repo: &Path,
    stack: StackId,
    branch: &str,
) -> Result<PublishOutcome> {
    let rel = paths::workflow_rel_path(stack);
    if git.is_clean(repo, &rel)? {
        info!(workflow = %rel, "workflow already committed");
        return Ok(PublishOutcome::NothingToCommit);
    }
    git.create_branch(repo, branch)?;
    git.add(repo, &rel)?;
    git.commit(repo, COMMIT_MESSAGE)?;
    git.push(repo, DEFAULT_REMOTE, branch)?;
    info!(%branch, workflow = %rel, "pushed workflow");
    Ok(PublishOutcome::Pushed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
