//! Environment context assembly.
//!
//! The context handed to templates is a flat `name -> value` map built by
//! folding an ordered list of layers left to right. Each layer fully replaces
//! earlier values for the keys it defines:
//!
//! | order | layer            | source                                  |
//! |-------|------------------|-----------------------------------------|
//! | 1     | stack defaults   | fixed per-stack seed table              |
//! | 2     | sample env       | `.env.sample` in the repository         |
//! | 3     | repo override    | `env` of `.platformrc.json`             |
//! | 4     | caller override  | explicit mapping from the invoking code |

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::PlatformOverride;
use crate::io;
use crate::paths;
use crate::types::StackId;

/// Flat environment mapping. Ordered so rendering is byte-stable.
pub type EnvMap = BTreeMap<String, String>;

pub const PROJECT_NAME_KEY: &str = "projectName";
pub const SERVICE_NAME_KEY: &str = "serviceName";
pub const VERCEL_TOKEN_KEY: &str = "VERCEL_TOKEN";
pub const RENDER_TOKEN_KEY: &str = "RENDER_TOKEN";
pub const AWS_REGION_KEY: &str = "AWS_REGION";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

// ---------------------------------------------------------------------------
// Stack defaults
// ---------------------------------------------------------------------------

/// Where a seeded default value comes from.
#[derive(Debug, Clone, Copy)]
enum Seed {
    RepoName,
    VercelToken,
    RenderToken,
    Literal(&'static str),
}

const VERCEL_SEEDS: &[(&str, Seed)] = &[
    (PROJECT_NAME_KEY, Seed::RepoName),
    (VERCEL_TOKEN_KEY, Seed::VercelToken),
];

const RENDER_SEEDS: &[(&str, Seed)] = &[
    (SERVICE_NAME_KEY, Seed::RepoName),
    (RENDER_TOKEN_KEY, Seed::RenderToken),
];

const AWS_SEEDS: &[(&str, Seed)] = &[
    (PROJECT_NAME_KEY, Seed::RepoName),
    (AWS_REGION_KEY, Seed::Literal(DEFAULT_AWS_REGION)),
];

const STACK_SEEDS: &[(StackId, &[(&str, Seed)])] = &[
    (StackId::ReactVite, VERCEL_SEEDS),
    (StackId::NextJs, VERCEL_SEEDS),
    (StackId::Django, RENDER_SEEDS),
    (StackId::Flask, RENDER_SEEDS),
    (StackId::NodeAws, AWS_SEEDS),
];

/// Values the stack-default layer may draw from.
#[derive(Debug, Clone, Copy)]
pub struct DefaultInputs<'a> {
    pub repo_name: &'a str,
    pub vercel_token: &'a str,
    pub render_token: &'a str,
}

/// The stack-default layer for `stack`. Stacks without seeds yield an empty map.
pub fn stack_defaults(stack: StackId, inputs: &DefaultInputs<'_>) -> EnvMap {
    let seeds = STACK_SEEDS
        .iter()
        .find(|(s, _)| *s == stack)
        .map(|(_, seeds)| *seeds)
        .unwrap_or(&[]);
    seeds
        .iter()
        .map(|(key, seed)| {
            let value = match seed {
                Seed::RepoName => inputs.repo_name,
                Seed::VercelToken => inputs.vercel_token,
                Seed::RenderToken => inputs.render_token,
                Seed::Literal(v) => *v,
            };
            (key.to_string(), value.to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sample env
// ---------------------------------------------------------------------------

/// Parse `.env.sample` in `repo`. Missing file yields an empty map; malformed
/// lines are logged and skipped.
///
/// Values are taken literally: `$VAR` references are not expanded, so the
/// process environment never leaks into the context.
pub fn load_sample_env(repo: &Path) -> EnvMap {
    let path = paths::env_sample_path(repo);
    let content = match io::read_text_lossy(&path) {
        Ok(Some(content)) => content,
        Ok(None) => return EnvMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read {}", paths::ENV_SAMPLE);
            return EnvMap::new();
        }
    };
    let mut values = EnvMap::new();
    for (index, line) in content.lines().enumerate() {
        match parse_env_line(line) {
            Ok(Some((key, value))) => {
                values.insert(key, value);
            }
            Ok(None) => {}
            Err(reason) => {
                warn!(path = %path.display(), line = index + 1, reason, "skipping malformed line")
            }
        }
    }
    debug!(keys = values.len(), "loaded {}", paths::ENV_SAMPLE);
    values
}

/// One dotenv line: blank and `#` lines are `None`; `export` prefixes are
/// accepted.
fn parse_env_line(line: &str) -> std::result::Result<Option<(String, String)>, &'static str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let line = line
        .strip_prefix("export ")
        .map(str::trim_start)
        .unwrap_or(line);
    let (key, raw) = line.split_once('=').ok_or("missing '='")?;
    let key = key.trim();
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid_key {
        return Err("invalid key");
    }
    Ok(Some((key.to_string(), parse_env_value(raw.trim()))))
}

/// Quoted values lose their quotes (`\n` becomes a newline inside double
/// quotes); unquoted values stop at an inline ` #` comment.
fn parse_env_value(raw: &str) -> String {
    for quote in ['"', '\'', '`'] {
        let inner = raw
            .strip_prefix(quote)
            .and_then(|rest| rest.rfind(quote).map(|end| &rest[..end]));
        if let Some(inner) = inner {
            return if quote == '"' {
                inner.replace("\\n", "\n")
            } else {
                inner.to_string()
            };
        }
    }
    if raw.starts_with('#') {
        return String::new();
    }
    match raw.find(" #") {
        Some(end) => raw[..end].trim_end().to_string(),
        None => raw.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Layer identity, in increasing precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerSource {
    StackDefaults,
    SampleEnv,
    RepoOverride,
    CallerOverride,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub source: LayerSource,
    pub values: EnvMap,
}

/// Fold `layers` left to right; later layers win on key collision.
pub fn merge_layers(layers: &[Layer]) -> EnvMap {
    layers.iter().fold(EnvMap::new(), |mut acc, layer| {
        for (key, value) in &layer.values {
            if let Some(previous) = acc.insert(key.clone(), value.clone()) {
                if &previous != value {
                    debug!(key = %key, layer = ?layer.source, "overriding earlier value");
                }
            }
        }
        acc
    })
}

/// Ordered list of layers that produces the environment context.
#[derive(Debug, Clone, Default)]
pub struct EnvContextBuilder {
    layers: Vec<Layer>,
}

impl EnvContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four standard layers for a repository working copy.
    pub fn for_repository(
        stack: StackId,
        repo: &Path,
        inputs: &DefaultInputs<'_>,
        repo_override: &PlatformOverride,
        caller_override: &EnvMap,
    ) -> Self {
        Self::new()
            .layer(LayerSource::StackDefaults, stack_defaults(stack, inputs))
            .layer(LayerSource::SampleEnv, load_sample_env(repo))
            .layer(LayerSource::RepoOverride, repo_override.env.clone())
            .layer(LayerSource::CallerOverride, caller_override.clone())
    }

    pub fn layer(mut self, source: LayerSource, values: EnvMap) -> Self {
        self.layers.push(Layer { source, values });
        self
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn build(&self) -> EnvMap {
        merge_layers(&self.layers)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
