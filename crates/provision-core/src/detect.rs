//! Stack detection.
//!
//! Inspects a handful of marker files at the repository root and returns the
//! first matching [`StackId`]. Rules are checked in order:
//!
//! 1. `package.json`: framework dependencies, else generic `node`
//! 2. `requirements.txt`: `django` / `flask` mentions or entry-point files
//! 3. `main.go`: `go`
//! 4. otherwise `unknown`
//!
//! Detection is read-only. A `package.json` that is not valid JSON aborts
//! with [`ProvisionError::Manifest`] instead of degrading to `unknown`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::io;
use crate::paths;
use crate::types::StackId;

/// The parts of `package.json` detection reads. Absent, `null` or
/// non-object sections count as empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    dependencies: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    dev_dependencies: Option<HashMap<String, serde_json::Value>>,
}

/// Which dependency sections of `package.json` a rule looks at.
#[derive(Debug, Clone, Copy)]
enum DepScope {
    Runtime,
    Any,
}

/// Framework rules for `package.json`, first match wins.
const NODE_RULES: &[(&str, DepScope, StackId)] = &[
    ("next", DepScope::Runtime, StackId::NextJs),
    ("vite", DepScope::Any, StackId::ReactVite),
    ("@angular/core", DepScope::Runtime, StackId::Angular),
];

/// Python rules: (lowercase needle in requirements.txt, entry-point file, stack).
const PYTHON_RULES: &[(&str, &str, StackId)] = &[
    ("django", paths::DJANGO_ENTRY, StackId::Django),
    ("flask", paths::FLASK_ENTRY, StackId::Flask),
];

impl PackageManifest {
    /// Lenient view of an already-parsed manifest: any shape mismatch
    /// yields an empty manifest.
    fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            debug!(error = %e, "package.json has no usable dependency sections");
            Self::default()
        })
    }

    fn declares(&self, name: &str, scope: DepScope) -> bool {
        let has = |section: &Option<HashMap<String, serde_json::Value>>| {
            section.as_ref().is_some_and(|deps| deps.contains_key(name))
        };
        match scope {
            DepScope::Runtime => has(&self.dependencies),
            DepScope::Any => has(&self.dependencies) || has(&self.dev_dependencies),
        }
    }
}

/// Detect the stack of the repository rooted at `repo`.
pub fn detect_stack(repo: &Path) -> Result<StackId> {
    if let Some(stack) = detect_node(repo)? {
        return Ok(stack);
    }
    if let Some(stack) = detect_python(repo)? {
        return Ok(stack);
    }
    if repo.join(paths::GO_ENTRY).is_file() {
        debug!("found {}", paths::GO_ENTRY);
        return Ok(StackId::Go);
    }
    Ok(StackId::Unknown)
}

fn detect_node(repo: &Path) -> Result<Option<StackId>> {
    let path = repo.join(paths::PACKAGE_JSON);
    let Some(content) = io::read_optional(&path)? else {
        return Ok(None);
    };
    let value: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| ProvisionError::Manifest {
            path: path.clone(),
            source,
        })?;
    let manifest = PackageManifest::from_json(value);

    let stack = NODE_RULES
        .iter()
        .find(|(dep, scope, _)| manifest.declares(dep, *scope))
        .map(|(dep, _, stack)| {
            debug!(dependency = dep, "matched package.json rule");
            *stack
        })
        .unwrap_or(StackId::Node);
    Ok(Some(stack))
}

fn detect_python(repo: &Path) -> Result<Option<StackId>> {
    let Some(content) = io::read_text_lossy(&repo.join(paths::REQUIREMENTS_TXT))? else {
        return Ok(None);
    };
    let content = content.to_lowercase();
    let stack = PYTHON_RULES
        .iter()
        .find(|(needle, entry, _)| content.contains(needle) || repo.join(entry).is_file())
        .map(|(_, _, stack)| *stack);
    Ok(stack)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo_with(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn detect(files: &[(&str, &str)]) -> StackId {
        let dir = repo_with(files);
        detect_stack(dir.path()).unwrap()
    }

    #[test]
    fn empty_repo_is_unknown() {
        assert_eq!(detect(&[]), StackId::Unknown);
    }

    #[test]
    fn vite_dependency_is_react_vite() {
        let pkg = r#"{"dependencies": {"vite": "^4.0.0"}}"#;
        assert_eq!(detect(&[("package.json", pkg)]), StackId::ReactVite);
    }

    #[test]
    fn vite_dev_dependency_is_react_vite() {
        let pkg = r#"{"devDependencies": {"vite": "^5.2.0"}, "dependencies": {"react": "18"}}"#;
        assert_eq!(detect(&[("package.json", pkg)]), StackId::ReactVite);
    }

    #[test]
    fn next_wins_over_vite() {
        let pkg = r#"{"dependencies": {"next": "14", "vite": "5"}}"#;
        assert_eq!(detect(&[("package.json", pkg)]), StackId::NextJs);
    }

    #[test]
    fn next_in_dev_dependencies_is_not_nextjs() {
        let pkg = r#"{"devDependencies": {"next": "14"}}"#;
        assert_eq!(detect(&[("package.json", pkg)]), StackId::Node);
    }

    #[test]
    fn angular_core_is_angular() {
        let pkg = r#"{"dependencies": {"@angular/core": "17.0.0"}}"#;
        assert_eq!(detect(&[("package.json", pkg)]), StackId::Angular);
    }

    #[test]
    fn bare_manifest_is_node() {
        assert_eq!(detect(&[("package.json", r#"{"name": "svc"}"#)]), StackId::Node);
    }

    #[test]
    fn manifest_takes_precedence_over_python_and_go() {
        let files = [
            ("package.json", "{}"),
            ("requirements.txt", "django\n"),
            ("main.go", "package main"),
        ];
        assert_eq!(detect(&files), StackId::Node);
    }

    #[test]
    fn malformed_manifest_is_an_error() {
        let dir = repo_with(&[("package.json", "{ not json")]);
        let err = detect_stack(dir.path()).unwrap_err();
        assert!(matches!(err, ProvisionError::Manifest { .. }));
        assert!(err.to_string().contains("package.json"));
    }

    #[test]
    fn flask_requirement_without_entry_points() {
        assert_eq!(detect(&[("requirements.txt", "Flask==2.0\n")]), StackId::Flask);
    }

    #[test]
    fn django_matched_case_insensitively() {
        assert_eq!(
            detect(&[("requirements.txt", "Django>=4.2\npsycopg2\n")]),
            StackId::Django
        );
    }

    #[test]
    fn manage_py_marks_django() {
        let files = [("requirements.txt", "gunicorn\n"), ("manage.py", "")];
        assert_eq!(detect(&files), StackId::Django);
    }

    #[test]
    fn app_py_marks_flask() {
        let files = [("requirements.txt", "gunicorn\n"), ("app.py", "")];
        assert_eq!(detect(&files), StackId::Flask);
    }

    #[test]
    fn django_checked_before_flask() {
        let files = [("requirements.txt", "flask\ndjango\n")];
        assert_eq!(detect(&files), StackId::Django);
    }

    #[test]
    fn unmatched_requirements_fall_through_to_go() {
        let files = [("requirements.txt", "requests\n"), ("main.go", "package main")];
        assert_eq!(detect(&files), StackId::Go);
    }

    #[test]
    fn entry_points_without_requirements_are_ignored() {
        assert_eq!(detect(&[("manage.py", "")]), StackId::Unknown);
    }

    #[test]
    fn go_entry_point() {
        assert_eq!(detect(&[("main.go", "package main")]), StackId::Go);
    }

    #[test]
    fn detection_is_deterministic() {
        let dir = repo_with(&[("package.json", r#"{"dependencies": {"vite": "4"}}"#)]);
        let first = detect_stack(dir.path()).unwrap();
        let second = detect_stack(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn utf16_requirements_are_searched() {
        let dir = TempDir::new().unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend("Flask==2.0\r\n".encode_utf16().flat_map(u16::to_le_bytes));
        std::fs::write(dir.path().join("requirements.txt"), bytes).unwrap();
        assert_eq!(detect_stack(dir.path()).unwrap(), StackId::Flask);
    }

    #[test]
    fn non_utf8_requirements_do_not_abort() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), b"django==5.0 # caf\xe9\n").unwrap();
        assert_eq!(detect_stack(dir.path()).unwrap(), StackId::Django);
    }

    #[test]
    fn odd_manifest_shapes_are_generic_node() {
        assert_eq!(detect(&[("package.json", r#"{"dependencies": null}"#)]), StackId::Node);
        assert_eq!(detect(&[("package.json", "[]")]), StackId::Node);
        assert_eq!(detect(&[("package.json", r#"{"dependencies": "next"}"#)]), StackId::Node);
        assert_eq!(
            detect(&[("package.json", r#"{"dependencies": null, "devDependencies": {"vite": "5"}}"#)]),
            StackId::ReactVite
        );
    }
}
