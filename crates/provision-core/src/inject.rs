//! Workflow injection: the end-to-end provisioning pipeline.
//!
//! ```text
//! ensure_fresh(url) ─▶ detect_stack ─▶ PlatformOverride::load
//!        ─▶ EnvContextBuilder ─▶ Enricher::enrich ─▶ render_workflow
//!        ─▶ <repo>/.github/workflows/<stack>.yml
//! ```
//!
//! Fatal conditions (sync failure, unknown or unsupported stack, missing
//! template, render or write failure) abort before anything is written.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{PlatformOverride, PlatformTokens};
use crate::detect::detect_stack;
use crate::enrich::Enricher;
use crate::env_context::{DefaultInputs, EnvContextBuilder, EnvMap};
use crate::error::{ProvisionError, Result};
use crate::io::{self, WriteOutcome};
use crate::paths;
use crate::sync::{EnsureWorkingCopy, WorkingCopy};
use crate::templates::{self, WorkflowContext};
use crate::types::StackId;

/// Inputs from the invoking caller.
#[derive(Debug, Clone, Default)]
pub struct InjectRequest {
    pub repo_url: String,
    /// Skip detection and use this stack.
    pub stack: Option<StackId>,
    /// Highest-precedence environment layer.
    pub env: EnvMap,
    pub custom_steps: Vec<String>,
}

/// What a successful injection produced.
#[derive(Debug, Clone)]
pub struct Injection {
    pub working_copy: WorkingCopy,
    pub stack: StackId,
    pub env: EnvMap,
    pub artifact: PathBuf,
    pub outcome: WriteOutcome,
}

pub struct WorkflowInjector<'a> {
    sync: &'a dyn EnsureWorkingCopy,
    enricher: &'a Enricher,
    tokens: &'a PlatformTokens,
}

impl<'a> WorkflowInjector<'a> {
    pub fn new(
        sync: &'a dyn EnsureWorkingCopy,
        enricher: &'a Enricher,
        tokens: &'a PlatformTokens,
    ) -> Self {
        Self {
            sync,
            enricher,
            tokens,
        }
    }

    /// Run the whole pipeline for `request`.
    pub fn run(&self, request: &InjectRequest) -> Result<Injection> {
        let working_copy = self.sync.ensure_fresh(&request.repo_url)?;

        let stack = match request.stack {
            Some(stack) => {
                info!(%stack, "using requested stack");
                stack
            }
            None => detect_stack(&working_copy.path)?,
        };
        if !stack.is_known() {
            return Err(ProvisionError::UnknownStack(working_copy.path.clone()));
        }
        info!(%stack, repo = %working_copy.name, "stack selected");

        let (env, artifact, outcome) = self.inject_into(
            &working_copy.path,
            &working_copy.name,
            stack,
            &request.env,
            &request.custom_steps,
        )?;

        Ok(Injection {
            working_copy,
            stack,
            env,
            artifact,
            outcome,
        })
    }

    /// Everything after sync and detection: layer the environment, enrich,
    /// render and write the workflow for `stack` into `repo`.
    pub fn inject_into(
        &self,
        repo: &Path,
        project_name: &str,
        stack: StackId,
        caller_env: &EnvMap,
        custom_steps: &[String],
    ) -> Result<(EnvMap, PathBuf, WriteOutcome)> {
        // Unsupported stacks fail before any network access.
        let descriptor = templates::template_for(stack)?;

        let repo_override = PlatformOverride::load(repo);
        let inputs = DefaultInputs {
            repo_name: project_name,
            vercel_token: &self.tokens.vercel,
            render_token: &self.tokens.render,
        };
        let env = EnvContextBuilder::for_repository(stack, repo, &inputs, &repo_override, caller_env)
            .build();
        let env = self.enricher.enrich(stack, env);

        let context = WorkflowContext {
            project_name,
            env: &env,
            custom_steps,
        };
        let rendered = templates::render_workflow(stack, &context)?;

        let artifact = paths::workflow_path(repo, stack);
        let outcome = io::write_if_changed(&artifact, rendered.as_bytes())?;
        info!(
            template = descriptor.resource,
            path = %artifact.display(),
            ?outcome,
            "workflow injected"
        );
        Ok((env, artifact, outcome))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::ProjectLookup;
    use crate::sync::SyncOutcome;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Treats an existing directory as the working copy of any URL.
    struct LocalCopy {
        path: PathBuf,
        name: &'static str,
        fail: bool,
    }

    impl EnsureWorkingCopy for LocalCopy {
        fn ensure_fresh(&self, _url: &str) -> Result<WorkingCopy> {
            if self.fail {
                return Err(ProvisionError::Git {
                    step: "pull".into(),
                    stderr: "diverged".into(),
                });
            }
            Ok(WorkingCopy {
                name: self.name.to_string(),
                path: self.path.clone(),
                outcome: SyncOutcome::Refreshed,
            })
        }
    }

    #[derive(Clone, Default)]
    struct StaticLookup {
        answer: Option<&'static str>,
        calls: Rc<Cell<usize>>,
    }

    impl ProjectLookup for StaticLookup {
        fn find_id(&self, _name: &str, _token: &str) -> Option<String> {
            self.calls.set(self.calls.get() + 1);
            self.answer.map(str::to_string)
        }
    }

    struct Fixture {
        dir: TempDir,
        sync: LocalCopy,
        enricher: Enricher,
        tokens: PlatformTokens,
        lookups: Rc<Cell<usize>>,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)], answer: Option<&'static str>) -> Self {
            let dir = TempDir::new().unwrap();
            for (name, content) in files {
                std::fs::write(dir.path().join(name), content).unwrap();
            }
            let lookup = StaticLookup {
                answer,
                ..Default::default()
            };
            let lookups = lookup.calls.clone();
            Self {
                sync: LocalCopy {
                    path: dir.path().to_path_buf(),
                    name: "shop",
                    fail: false,
                },
                enricher: Enricher::new(Box::new(lookup.clone()), Box::new(lookup)),
                tokens: PlatformTokens {
                    vercel: "vt".into(),
                    render: "rt".into(),
                },
                dir,
                lookups,
            }
        }

        fn run(&self, request: &InjectRequest) -> Result<Injection> {
            WorkflowInjector::new(&self.sync, &self.enricher, &self.tokens).run(request)
        }

        fn workflows_dir(&self) -> PathBuf {
            paths::workflows_dir(self.dir.path())
        }
    }

    fn request() -> InjectRequest {
        InjectRequest {
            repo_url: "https://github.com/acme/shop.git".into(),
            ..Default::default()
        }
    }

    const VITE_PKG: &str = r#"{"dependencies": {"vite": "^4.0.0"}}"#;

    #[test]
    fn vite_repo_gets_react_vite_workflow() {
        let fx = Fixture::new(&[("package.json", VITE_PKG)], Some("prj_42"));
        let result = fx.run(&request()).unwrap();

        assert_eq!(result.stack, StackId::ReactVite);
        assert_eq!(result.outcome, WriteOutcome::Created);
        assert_eq!(result.artifact, fx.workflows_dir().join("react-vite.yml"));
        assert_eq!(result.env["VERCEL_PROJECT_ID"], "prj_42");
        let text = std::fs::read_to_string(&result.artifact).unwrap();
        assert!(text.contains("prj_42"));
    }

    #[test]
    fn override_file_sets_project_name() {
        let fx = Fixture::new(
            &[
                ("requirements.txt", "django\n"),
                (".platformrc.json", r#"{"env": {"projectName": "custom-name"}}"#),
            ],
            None,
        );
        let result = fx.run(&request()).unwrap();
        assert_eq!(result.env["projectName"], "custom-name");
        assert_eq!(result.env["serviceName"], "shop");
    }

    #[test]
    fn override_file_beats_stack_default_for_vercel_project() {
        let fx = Fixture::new(
            &[
                ("package.json", VITE_PKG),
                (".platformrc.json", r#"{"env": {"projectName": "custom-name"}}"#),
            ],
            None,
        );
        let result = fx.run(&request()).unwrap();
        assert_eq!(result.env["projectName"], "custom-name");
    }

    #[test]
    fn caller_env_beats_everything() {
        let fx = Fixture::new(
            &[
                ("package.json", VITE_PKG),
                (".env.sample", "projectName=from-sample\n"),
                (".platformrc.json", r#"{"env": {"projectName": "from-rc"}}"#),
            ],
            None,
        );
        let mut req = request();
        req.env.insert("projectName".into(), "from-caller".into());
        let result = fx.run(&req).unwrap();
        assert_eq!(result.env["projectName"], "from-caller");
    }

    #[test]
    fn unknown_stack_aborts_without_writing() {
        let fx = Fixture::new(&[("README.md", "# hi")], None);
        let err = fx.run(&request()).unwrap_err();
        assert!(matches!(err, ProvisionError::UnknownStack(_)));
        assert!(!fx.workflows_dir().exists());
    }

    #[test]
    fn unsupported_stack_aborts_before_enrichment() {
        let fx = Fixture::new(&[("main.go", "package main")], Some("id"));
        let err = fx.run(&request()).unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedStack(ref s) if s == "go"));
        assert!(!fx.workflows_dir().exists());
        assert_eq!(fx.lookups.get(), 0);
    }

    #[test]
    fn sync_failure_aborts_pipeline() {
        let mut fx = Fixture::new(&[("package.json", VITE_PKG)], None);
        fx.sync.fail = true;
        let err = fx.run(&request()).unwrap_err();
        assert!(matches!(err, ProvisionError::Git { .. }));
        assert!(!fx.workflows_dir().exists());
    }

    #[test]
    fn failed_enrichment_leaves_empty_placeholder() {
        let fx = Fixture::new(&[("requirements.txt", "Flask==2.0\n")], None);
        let result = fx.run(&request()).unwrap();
        assert_eq!(result.stack, StackId::Flask);
        assert_eq!(result.env.get("RENDER_SERVICE_ID").map(String::as_str), Some(""));
        assert!(result.artifact.exists());
        assert_eq!(fx.lookups.get(), 1);
    }

    #[test]
    fn second_run_produces_identical_file() {
        let fx = Fixture::new(&[("package.json", VITE_PKG)], Some("prj_1"));
        let first = fx.run(&request()).unwrap();
        let before = std::fs::read(&first.artifact).unwrap();
        let second = fx.run(&request()).unwrap();
        let after = std::fs::read(&second.artifact).unwrap();
        assert_eq!(before, after);
        assert_eq!(second.outcome, WriteOutcome::Unchanged);
    }

    #[test]
    fn existing_workflow_is_overwritten() {
        let fx = Fixture::new(&[("package.json", VITE_PKG)], None);
        std::fs::create_dir_all(fx.workflows_dir()).unwrap();
        std::fs::write(fx.workflows_dir().join("react-vite.yml"), "stale").unwrap();
        let result = fx.run(&request()).unwrap();
        assert_eq!(result.outcome, WriteOutcome::Updated);
        assert_ne!(std::fs::read_to_string(&result.artifact).unwrap(), "stale");
    }

    #[test]
    fn requested_stack_skips_detection() {
        let fx = Fixture::new(&[("package.json", "{}")], None);
        let mut req = request();
        req.stack = Some(StackId::NodeAws);
        let result = fx.run(&req).unwrap();
        assert_eq!(result.stack, StackId::NodeAws);
        assert_eq!(result.env["AWS_REGION"], "us-east-1");
        assert!(fx.workflows_dir().join("node-aws.yml").exists());
    }

    #[test]
    fn custom_steps_reach_the_artifact() {
        let fx = Fixture::new(&[("requirements.txt", "django\n")], None);
        let mut req = request();
        req.custom_steps = vec!["- run: python manage.py collectstatic --noinput".into()];
        let result = fx.run(&req).unwrap();
        let text = std::fs::read_to_string(&result.artifact).unwrap();
        assert!(text.contains("collectstatic --noinput"));
    }
}
