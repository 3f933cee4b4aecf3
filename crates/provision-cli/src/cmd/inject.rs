use crate::output::print_json;
use anyhow::Context;
use clap::Args;
use provision_core::{
    config::{self, PlatformTokens, Settings},
    enrich::{Enricher, VERCEL_PROJECT_ID_KEY, RENDER_SERVICE_ID_KEY},
    git::Git,
    inject::{InjectRequest, Injection, WorkflowInjector},
    io::WriteOutcome,
    sync::{self, PublishOutcome, RepositorySync, SyncOutcome},
    StackId,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct InjectArgs {
    /// Git URL of the repository to provision
    pub repo_url: Option<String>,

    /// Skip detection and use this stack
    #[arg(long)]
    pub stack: Option<StackId>,

    /// Extra template variable, highest precedence (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = super::parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Extra workflow step, inserted verbatim at the template's custom-steps
    /// point after the build or test steps (repeatable)
    #[arg(long = "step", value_name = "YAML")]
    pub steps: Vec<String>,

    /// Commit the workflow on a new branch and push it to origin
    #[arg(long)]
    pub push: bool,

    /// Branch created by --push
    #[arg(long, default_value = config::DEFAULT_PUSH_BRANCH)]
    pub push_branch: String,

    /// Branch checked out when refreshing an existing working copy
    #[arg(long, default_value = config::DEFAULT_BRANCH)]
    pub branch: String,

    #[arg(long, env = "VERCEL_TOKEN", hide_env_values = true, default_value = "")]
    pub vercel_token: String,

    #[arg(long, env = "RENDER_TOKEN", hide_env_values = true, default_value = "")]
    pub render_token: String,

    #[arg(long, env = "VERCEL_TEAM_ID")]
    pub vercel_team_id: Option<String>,

    #[arg(long, env = "VERCEL_API_URL", default_value = config::DEFAULT_VERCEL_API_URL)]
    pub vercel_api_url: String,

    #[arg(long, env = "RENDER_API_URL", default_value = config::DEFAULT_RENDER_API_URL)]
    pub render_api_url: String,

    /// Timeout for each platform API request
    #[arg(long, default_value_t = 15)]
    pub http_timeout_secs: u64,

    /// Timeout for each git invocation
    #[arg(long, default_value_t = 300)]
    pub git_timeout_secs: u64,
}

impl InjectArgs {
    fn settings(&self, workdir: &Path) -> Settings {
        Settings {
            tokens: PlatformTokens {
                vercel: self.vercel_token.clone(),
                render: self.render_token.clone(),
            },
            vercel_team_id: self.vercel_team_id.clone().filter(|t| !t.is_empty()),
            vercel_api_url: self.vercel_api_url.clone(),
            render_api_url: self.render_api_url.clone(),
            workdir: workdir.to_path_buf(),
            branch: self.branch.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            git_timeout: Duration::from_secs(self.git_timeout_secs),
        }
    }
}

#[derive(serde::Serialize)]
struct InjectSummary<'a> {
    repository: &'a str,
    working_copy: &'a Path,
    sync: &'static str,
    stack: StackId,
    workflow: PathBuf,
    write: &'static str,
    /// Ids resolved by enrichment; other context values may hold secrets.
    platform_ids: BTreeMap<&'static str, &'a str>,
    pushed_branch: Option<&'a str>,
}

pub fn run(url: &str, args: &InjectArgs, workdir: &Path, json: bool) -> anyhow::Result<()> {
    let settings = args.settings(workdir);
    tracing::debug!(?settings, "resolved settings");

    let git = Git::locate(settings.git_timeout)?;
    let repo_sync = RepositorySync::new(git, &settings.workdir, &settings.branch);
    let enricher = Enricher::from_settings(&settings)?;
    let injector = WorkflowInjector::new(&repo_sync, &enricher, &settings.tokens);

    let request = InjectRequest {
        repo_url: url.to_string(),
        stack: args.stack,
        env: args.env.iter().cloned().collect(),
        custom_steps: args.steps.clone(),
    };
    let injection = injector
        .run(&request)
        .with_context(|| format!("failed to provision {url}"))?;

    let pushed = if args.push {
        let outcome = sync::publish_workflow(
            repo_sync.git(),
            &injection.working_copy.path,
            injection.stack,
            &args.push_branch,
        )
        .with_context(|| format!("failed to push branch '{}'", args.push_branch))?;
        match outcome {
            PublishOutcome::Pushed => Some(args.push_branch.as_str()),
            PublishOutcome::NothingToCommit => {
                eprintln!("workflow already committed; nothing to push");
                None
            }
        }
    } else {
        None
    };

    if json {
        print_json(&summary(url, &injection, pushed))?;
    } else {
        print_human(&injection, pushed);
    }
    Ok(())
}

fn summary<'a>(url: &'a str, injection: &'a Injection, pushed: Option<&'a str>) -> InjectSummary<'a> {
    let platform_ids = [VERCEL_PROJECT_ID_KEY, RENDER_SERVICE_ID_KEY]
        .into_iter()
        .filter_map(|key| injection.env.get(key).map(|v| (key, v.as_str())))
        .collect();
    InjectSummary {
        repository: url,
        working_copy: &injection.working_copy.path,
        sync: sync_label(injection.working_copy.outcome),
        stack: injection.stack,
        workflow: relative_artifact(injection),
        write: write_label(injection.outcome),
        platform_ids,
        pushed_branch: pushed,
    }
}

fn print_human(injection: &Injection, pushed: Option<&str>) {
    let wc = &injection.working_copy;
    println!(
        "{} {} ({})",
        sync_label(wc.outcome),
        wc.name,
        wc.path.display()
    );
    println!("stack: {}", injection.stack);
    println!(
        "  {}: {}",
        write_label(injection.outcome),
        relative_artifact(injection).display()
    );
    for key in [VERCEL_PROJECT_ID_KEY, RENDER_SERVICE_ID_KEY] {
        match injection.env.get(key).map(String::as_str) {
            Some("") => println!("  {key}: (not found)"),
            Some(id) => println!("  {key}: {id}"),
            None => {}
        }
    }
    if let Some(branch) = pushed {
        println!("pushed branch '{branch}' to origin");
    }
}

fn relative_artifact(injection: &Injection) -> PathBuf {
    injection
        .artifact
        .strip_prefix(&injection.working_copy.path)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| injection.artifact.clone())
}

fn sync_label(outcome: SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::Cloned => "cloned",
        SyncOutcome::Refreshed => "refreshed",
    }
}

fn write_label(outcome: WriteOutcome) -> &'static str {
    match outcome {
        WriteOutcome::Created => "created",
        WriteOutcome::Updated => "updated",
        WriteOutcome::Unchanged => "unchanged",
    }
}
