use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported stack: {0}")]
    UnsupportedStack(String),

    #[error("could not detect tech stack in {0}")]
    UnknownStack(PathBuf),

    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("failed to render template '{name}': {message}")]
    Render { name: String, message: String },

    #[error("malformed manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid repository url: {0}")]
    InvalidRepoUrl(String),

    #[error("git binary not found on PATH")]
    GitNotFound,

    #[error("git {step} failed: {stderr}")]
    Git { step: String, stderr: String },

    #[error("git {step} timed out after {secs}s")]
    GitTimeout { step: String, secs: u64 },

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
