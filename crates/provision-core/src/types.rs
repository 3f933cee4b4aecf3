use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProvisionError;

// ---------------------------------------------------------------------------
// StackId
// ---------------------------------------------------------------------------

/// Technology stack of a repository. Chosen once per run; every later step
/// branches on it through a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackId {
    Node,
    #[serde(rename = "nextjs")]
    NextJs,
    ReactVite,
    Angular,
    Django,
    Flask,
    Go,
    NodeAws,
    Unknown,
}

impl StackId {
    pub fn all() -> &'static [StackId] {
        &[
            StackId::Node,
            StackId::NextJs,
            StackId::ReactVite,
            StackId::Angular,
            StackId::Django,
            StackId::Flask,
            StackId::Go,
            StackId::NodeAws,
            StackId::Unknown,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StackId::Node => "node",
            StackId::NextJs => "nextjs",
            StackId::ReactVite => "react-vite",
            StackId::Angular => "angular",
            StackId::Django => "django",
            StackId::Flask => "flask",
            StackId::Go => "go",
            StackId::NodeAws => "node-aws",
            StackId::Unknown => "unknown",
        }
    }

    pub fn is_known(self) -> bool {
        self != StackId::Unknown
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StackId {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StackId::all()
            .iter()
            .copied()
            .find(|stack| stack.as_str() == s)
            .ok_or_else(|| ProvisionError::UnsupportedStack(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
