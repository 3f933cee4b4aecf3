use crate::error::{ProvisionError, Result};
use crate::types::StackId;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Marker files inspected by stack detection
// ---------------------------------------------------------------------------

pub const PACKAGE_JSON: &str = "package.json";
pub const REQUIREMENTS_TXT: &str = "requirements.txt";
pub const DJANGO_ENTRY: &str = "manage.py";
pub const FLASK_ENTRY: &str = "app.py";
pub const GO_ENTRY: &str = "main.go";

// ---------------------------------------------------------------------------
// Per-repository configuration
// ---------------------------------------------------------------------------

pub const PLATFORM_RC: &str = ".platformrc.json";
pub const ENV_SAMPLE: &str = ".env.sample";

// ---------------------------------------------------------------------------
// Output locations
// ---------------------------------------------------------------------------

pub const WORKFLOWS_DIR: &str = ".github/workflows";
pub const ANSIBLE_DIR: &str = "ansible";
pub const ANSIBLE_PLAYBOOK: &str = "playbook.yml";
pub const TERRAFORM_DIR: &str = "terraform";
pub const DEFAULT_WORKDIR: &str = "platform-projects";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn platform_rc_path(repo: &Path) -> PathBuf {
    repo.join(PLATFORM_RC)
}

pub fn env_sample_path(repo: &Path) -> PathBuf {
    repo.join(ENV_SAMPLE)
}

pub fn workflows_dir(repo: &Path) -> PathBuf {
    repo.join(WORKFLOWS_DIR)
}

/// Repository-relative location of the workflow for `stack`.
pub fn workflow_rel_path(stack: StackId) -> String {
    format!("{WORKFLOWS_DIR}/{}.yml", stack.as_str())
}

pub fn workflow_path(repo: &Path, stack: StackId) -> PathBuf {
    repo.join(workflow_rel_path(stack))
}

pub fn ansible_playbook_path(out_dir: &Path) -> PathBuf {
    out_dir.join(ANSIBLE_DIR).join(ANSIBLE_PLAYBOOK)
}

pub fn terraform_dir(workdir: &Path, project: &str) -> PathBuf {
    workdir.join(project).join(TERRAFORM_DIR)
}

// ---------------------------------------------------------------------------
// Working copies
// ---------------------------------------------------------------------------

/// Derive the project name from a repository URL: the last path segment with
/// any trailing `.git` removed. Handles both `https://host/org/repo.git` and
/// scp-style `git@host:org/repo.git`.
pub fn repo_name_from_url(url: &str) -> Result<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        return Err(ProvisionError::InvalidRepoUrl(url.to_string()));
    }
    Ok(name.to_string())
}

pub fn working_copy_path(workdir: &Path, repo_name: &str) -> PathBuf {
    workdir.join(repo_name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
