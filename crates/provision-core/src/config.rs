use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::env_context::EnvMap;
use crate::io;
use crate::paths;

// ---------------------------------------------------------------------------
// PlatformOverride
// ---------------------------------------------------------------------------

/// Contents of `.platformrc.json` at a repository root. Unknown fields are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformOverride {
    #[serde(default)]
    pub env: EnvMap,
}

impl PlatformOverride {
    /// Load the override file for `repo`.
    ///
    /// A missing file yields an empty override. An unreadable or malformed
    /// file is logged and also yields an empty override.
    pub fn load(repo: &Path) -> Self {
        let path = paths::platform_rc_path(repo);
        let content = match io::read_optional(&path) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(path = %path.display(), "no repository override file");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read {}", paths::PLATFORM_RC);
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse {}", paths::PLATFORM_RC);
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

pub const DEFAULT_VERCEL_API_URL: &str = "https://api.vercel.com";
pub const DEFAULT_RENDER_API_URL: &str = "https://api.render.com";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_PUSH_BRANCH: &str = "platform-pipeline";

fn default_http_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_git_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Authorization tokens for the hosting platforms.
#[derive(Clone, Default)]
pub struct PlatformTokens {
    pub vercel: String,
    pub render: String,
}

impl std::fmt::Debug for PlatformTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |t: &str| if t.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("PlatformTokens")
            .field("vercel", &mask(&self.vercel))
            .field("render", &mask(&self.render))
            .finish()
    }
}

/// Process-wide settings, assembled once at startup and threaded through the
/// pipeline. Nothing below this layer reads the process environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub tokens: PlatformTokens,
    pub vercel_team_id: Option<String>,
    pub vercel_api_url: String,
    pub render_api_url: String,
    /// Parent directory of every working copy.
    pub workdir: PathBuf,
    /// Branch checked out when refreshing an existing working copy.
    pub branch: String,
    pub http_timeout: Duration,
    pub git_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tokens: PlatformTokens::default(),
            vercel_team_id: None,
            vercel_api_url: DEFAULT_VERCEL_API_URL.to_string(),
            render_api_url: DEFAULT_RENDER_API_URL.to_string(),
            workdir: PathBuf::from(paths::DEFAULT_WORKDIR),
            branch: DEFAULT_BRANCH.to_string(),
            http_timeout: default_http_timeout(),
            git_timeout: default_git_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
