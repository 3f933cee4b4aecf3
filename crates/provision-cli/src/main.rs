mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::inject::InjectArgs;
use provision_core::{generators, paths};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "provision",
    about = "Detect a repository's stack and inject a matching CI/CD workflow",
    version,
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Parent directory for working copies and generated infrastructure
    #[arg(long, global = true, env = "PROVISION_WORKDIR", default_value = paths::DEFAULT_WORKDIR)]
    workdir: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(flatten)]
    inject: InjectArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ansible playbook that prepares a Docker host
    Ansible {
        /// Directory that receives ansible/playbook.yml
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Remote user added to the docker group
        #[arg(long, default_value = generators::DEFAULT_ANSIBLE_USER)]
        user: String,
    },

    /// Generate a Terraform entry file for a project
    Terraform {
        /// Project id; output lands in <workdir>/<project>/terraform/
        #[arg(long)]
        project: String,

        /// Embedded template name (see `provision stacks`)
        #[arg(long, default_value = "aws-ec2")]
        template: String,

        /// Output file name
        #[arg(long, default_value = generators::DEFAULT_TERRAFORM_OUTPUT)]
        output: String,

        /// Template variable (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE", value_parser = cmd::parse_key_val)]
        vars: Vec<(String, String)>,
    },

    /// List supported stacks, their templates and enrichment platforms
    Stacks,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Some(Commands::Ansible { output_dir, user }) => {
            cmd::generate::ansible(&output_dir, &user, cli.json)
        }
        Some(Commands::Terraform {
            project,
            template,
            output,
            vars,
        }) => cmd::generate::terraform(&cli.workdir, project, template, output, vars, cli.json),
        Some(Commands::Stacks) => cmd::stacks::run(cli.json),
        None => match cli.inject.repo_url.as_deref() {
            Some(url) => cmd::inject::run(url, &cli.inject, &cli.workdir, cli.json),
            None => Cli::command()
                .error(
                    clap::error::ErrorKind::MissingRequiredArgument,
                    "a repository URL is required",
                )
                .exit(),
        },
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
