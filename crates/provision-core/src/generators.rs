//! Infrastructure scaffolding: an Ansible playbook for Docker hosts and
//! Terraform entry files rendered from the embedded templates.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::env_context::EnvMap;
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::templates;

pub const DEFAULT_ANSIBLE_USER: &str = "ubuntu";
pub const DEFAULT_TERRAFORM_OUTPUT: &str = "main.tf";

const ANSIBLE_TEMPLATE: &str = "ansible/docker-setup.yml.hbs";
const TERRAFORM_PREFIX: &str = "terraform/";
const TERRAFORM_SUFFIX: &str = ".tf.hbs";

#[derive(Serialize)]
struct AnsibleContext<'a> {
    ansible_user: &'a str,
}

/// Render the Docker host playbook into `<out_dir>/ansible/playbook.yml`.
pub fn generate_ansible(out_dir: &Path, ansible_user: &str) -> Result<PathBuf> {
    let template = templates::load_resource(ANSIBLE_TEMPLATE)?;
    let rendered = templates::render(ANSIBLE_TEMPLATE, &template, &AnsibleContext { ansible_user })?;
    let path = paths::ansible_playbook_path(out_dir);
    io::atomic_write(&path, rendered.as_bytes())?;
    info!(path = %path.display(), "ansible playbook generated");
    Ok(path)
}

/// Options for [`generate_terraform`].
#[derive(Debug, Clone)]
pub struct TerraformSetup {
    pub project_id: String,
    /// Template name without extension, e.g. `aws-ec2`.
    pub template: String,
    pub output_file: String,
    pub variables: EnvMap,
}

/// Names accepted by [`generate_terraform`].
pub fn terraform_templates() -> Vec<String> {
    templates::resources_under(TERRAFORM_PREFIX)
        .into_iter()
        .filter_map(|r| {
            r.strip_prefix(TERRAFORM_PREFIX)
                .and_then(|n| n.strip_suffix(TERRAFORM_SUFFIX))
                .map(str::to_string)
        })
        .collect()
}

fn terraform_resource(template: &str) -> String {
    let name = template
        .strip_suffix(".tf")
        .unwrap_or(template);
    format!("{TERRAFORM_PREFIX}{name}{TERRAFORM_SUFFIX}")
}

/// Render a Terraform template into `<workdir>/<project>/terraform/<output_file>`.
///
/// Template variables are `setup.variables` plus `projectId`, unless the
/// variables already define it.
pub fn generate_terraform(workdir: &Path, setup: &TerraformSetup) -> Result<PathBuf> {
    let resource = terraform_resource(&setup.template);
    let template = templates::load_resource(&resource)?;

    let mut variables = setup.variables.clone();
    variables
        .entry("projectId".to_string())
        .or_insert_with(|| setup.project_id.clone());
    let rendered = templates::render(&resource, &template, &variables)?;

    let path = paths::terraform_dir(workdir, &setup.project_id).join(&setup.output_file);
    io::atomic_write(&path, rendered.as_bytes())?;
    info!(path = %path.display(), "terraform setup generated");
    Ok(path)
}
