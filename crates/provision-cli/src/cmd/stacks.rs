use crate::output::{print_json, print_table};
use provision_core::{enrich, generators, paths, templates, StackId};

#[derive(serde::Serialize)]
struct StackRow {
    stack: StackId,
    template: Option<&'static str>,
    workflow: Option<String>,
    platform: Option<&'static str>,
    id_key: Option<&'static str>,
}

fn rows() -> Vec<StackRow> {
    StackId::all()
        .iter()
        .filter(|s| s.is_known())
        .map(|&stack| {
            let template = templates::template_for(stack).ok().map(|d| d.resource);
            let enrichment = enrich::enrichment_for(stack);
            StackRow {
                stack,
                template,
                workflow: template.map(|_| paths::workflow_rel_path(stack)),
                platform: enrichment.map(|e| match e.platform {
                    enrich::Platform::Vercel => "vercel",
                    enrich::Platform::Render => "render",
                }),
                id_key: enrichment.map(|e| e.id_key),
            }
        })
        .collect()
}

pub fn run(json: bool) -> anyhow::Result<()> {
    let rows = rows();
    if json {
        return print_json(&serde_json::json!({
            "stacks": rows,
            "terraform_templates": generators::terraform_templates(),
        }));
    }

    let dash = || "-".to_string();
    print_table(
        &["STACK", "WORKFLOW", "PLATFORM", "ID KEY"],
        rows.iter()
            .map(|r| {
                vec![
                    r.stack.to_string(),
                    r.workflow.clone().unwrap_or_else(|| "(unsupported)".to_string()),
                    r.platform.map(str::to_string).unwrap_or_else(dash),
                    r.id_key.map(str::to_string).unwrap_or_else(dash),
                ]
            })
            .collect(),
    );
    println!();
    println!("terraform templates: {}", generators::terraform_templates().join(", "));
    Ok(())
}
