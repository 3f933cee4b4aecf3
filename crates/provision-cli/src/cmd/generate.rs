use crate::output::print_json;
use anyhow::Context;
use provision_core::generators::{self, TerraformSetup};
use std::path::Path;

pub fn ansible(output_dir: &Path, user: &str, json: bool) -> anyhow::Result<()> {
    let path = generators::generate_ansible(output_dir, user)
        .context("failed to generate ansible playbook")?;

    if json {
        print_json(&serde_json::json!({ "playbook": path, "user": user }))?;
    } else {
        println!("  created: {}", path.display());
    }
    Ok(())
}

pub fn terraform(
    workdir: &Path,
    project: String,
    template: String,
    output: String,
    vars: Vec<(String, String)>,
    json: bool,
) -> anyhow::Result<()> {
    let setup = TerraformSetup {
        project_id: project,
        template,
        output_file: output,
        variables: vars.into_iter().collect(),
    };
    let path = generators::generate_terraform(workdir, &setup).with_context(|| {
        format!(
            "failed to generate terraform for '{}' (available templates: {})",
            setup.project_id,
            generators::terraform_templates().join(", ")
        )
    })?;

    if json {
        print_json(&serde_json::json!({
            "project": setup.project_id,
            "template": setup.template,
            "path": path,
        }))?;
    } else {
        println!("  created: {}", path.display());
    }
    Ok(())
}
