//! Template selection and rendering.
//!
//! Template resources are embedded at compile time from `templates/` and
//! rendered with Handlebars (Mustache-compatible `{{name}}` syntax). HTML
//! escaping is off since every output is YAML or HCL. GitHub Actions
//! expressions are written as `$\{{ ... }}` in the resources so they pass
//! through rendering untouched.

use handlebars::Handlebars;
use rust_embed::Embed;
use serde::Serialize;

use crate::env_context::EnvMap;
use crate::error::{ProvisionError, Result};
use crate::types::StackId;

#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/templates/"]
struct TemplateAssets;

/// Associates a stack with the workflow template resource it renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateDescriptor {
    pub stack: StackId,
    pub resource: &'static str,
}

const WORKFLOW_TEMPLATES: &[TemplateDescriptor] = &[
    TemplateDescriptor {
        stack: StackId::ReactVite,
        resource: "workflows/vite-react.yml.hbs",
    },
    TemplateDescriptor {
        stack: StackId::NextJs,
        resource: "workflows/vercel-nextjs.yml.hbs",
    },
    TemplateDescriptor {
        stack: StackId::Django,
        resource: "workflows/django-render.yml.hbs",
    },
    TemplateDescriptor {
        stack: StackId::Flask,
        resource: "workflows/flask-render.yml.hbs",
    },
    TemplateDescriptor {
        stack: StackId::NodeAws,
        resource: "workflows/aws-node.yml.hbs",
    },
];

pub fn workflow_templates() -> &'static [TemplateDescriptor] {
    WORKFLOW_TEMPLATES
}

/// Look up the workflow template for `stack`.
pub fn template_for(stack: StackId) -> Result<&'static TemplateDescriptor> {
    WORKFLOW_TEMPLATES
        .iter()
        .find(|t| t.stack == stack)
        .ok_or_else(|| ProvisionError::UnsupportedStack(stack.to_string()))
}

/// Read an embedded template resource by its path under `templates/`.
pub fn load_resource(resource: &str) -> Result<String> {
    let file = <TemplateAssets as Embed>::get(resource)
        .ok_or_else(|| ProvisionError::TemplateNotFound(resource.to_string()))?;
    Ok(String::from_utf8_lossy(&file.data).into_owned())
}

/// Names of embedded resources under `prefix` (e.g. `"terraform/"`).
pub fn resources_under(prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = <TemplateAssets as Embed>::iter()
        .filter(|name| name.starts_with(prefix))
        .map(|name| name.into_owned())
        .collect();
    names.sort();
    names
}

/// Render `template` against `context`. Pure: no I/O happens here.
pub fn render<T: Serialize>(name: &str, template: &str, context: &T) -> Result<String> {
    let mut hb = Handlebars::new();
    hb.set_strict_mode(false);
    hb.register_escape_fn(handlebars::no_escape);
    hb.render_template(template, context)
        .map_err(|e| ProvisionError::Render {
            name: name.to_string(),
            message: e.to_string(),
        })
}

/// Data exposed to workflow templates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext<'a> {
    pub project_name: &'a str,
    pub env: &'a EnvMap,
    /// Extra pipeline steps, inserted verbatim at the template's extension point.
    pub custom_steps: &'a [String],
}

/// Select and render the workflow for `stack`.
pub fn render_workflow(stack: StackId, context: &WorkflowContext<'_>) -> Result<String> {
    let descriptor = template_for(stack)?;
    let template = load_resource(descriptor.resource)?;
    render(descriptor.resource, &template, context)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn every_descriptor_has_an_embedded_resource() {
        for descriptor in workflow_templates() {
            let text = load_resource(descriptor.resource).unwrap();
            assert!(!text.is_empty(), "{}", descriptor.resource);
        }
    }

    #[test]
    fn stacks_without_templates_are_unsupported() {
        for stack in [StackId::Node, StackId::Angular, StackId::Go, StackId::Unknown] {
            let err = template_for(stack).unwrap_err();
            assert!(matches!(err, ProvisionError::UnsupportedStack(_)), "{stack}");
        }
    }

    #[test]
    fn missing_resource_is_template_not_found() {
        let err = load_resource("workflows/cobol.yml.hbs").unwrap_err();
        assert!(matches!(err, ProvisionError::TemplateNotFound(_)));
    }

    #[test]
    fn render_substitutes_without_html_escaping() {
        let out = render("t", "name: {{name}} <{{tag}}>", &serde_json::json!({
            "name": "a & b",
            "tag": "x"
        }))
        .unwrap();
        assert_eq!(out, "name: a & b <x>");
    }

    #[test]
    fn render_keeps_escaped_expressions() {
        let out = render("t", "token: $\\{{ secrets.TOKEN }}", &serde_json::json!({})).unwrap();
        assert_eq!(out, "token: ${{ secrets.TOKEN }}");
    }

    #[test]
    fn render_missing_value_is_empty() {
        let out = render("t", "id: '{{env.MISSING}}'", &serde_json::json!({"env": {}})).unwrap();
        assert_eq!(out, "id: ''");
    }

    #[test]
    fn render_reports_syntax_errors() {
        let err = render("broken", "{{#each items}}", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ProvisionError::Render { ref name, .. } if name == "broken"));
    }

    #[test]
    fn workflow_contains_context_values() {
        let env = env(&[
            ("projectName", "shop"),
            ("VERCEL_TOKEN", "secret"),
            ("VERCEL_PROJECT_ID", "prj_1"),
        ]);
        let ctx = WorkflowContext {
            project_name: "shop",
            env: &env,
            custom_steps: &[],
        };
        let out = render_workflow(StackId::ReactVite, &ctx).unwrap();
        assert!(out.contains("prj_1"));
        assert!(out.contains("shop"));
        assert!(out.contains("${{ secrets.VERCEL_TOKEN }}"));
        assert!(!out.contains(": secret"), "raw token must not be inlined");
        let _: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    }

    #[test]
    fn custom_steps_are_inserted_verbatim() {
        let env = env(&[("serviceName", "api"), ("RENDER_SERVICE_ID", "srv_1")]);
        let steps = vec![
            "- run: python manage.py check --deploy".to_string(),
            "- run: echo 'custom & raw'".to_string(),
        ];
        let ctx = WorkflowContext {
            project_name: "api",
            env: &env,
            custom_steps: &steps,
        };
        let out = render_workflow(StackId::Django, &ctx).unwrap();
        for step in &steps {
            assert!(out.contains(step.as_str()), "missing step: {step}");
        }
        let _: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
    }

    #[test]
    fn every_workflow_renders_to_valid_yaml() {
        let env = env(&[
            ("projectName", "p"),
            ("serviceName", "s"),
            ("AWS_REGION", "us-east-1"),
            ("VERCEL_PROJECT_ID", ""),
            ("RENDER_SERVICE_ID", ""),
        ]);
        let ctx = WorkflowContext {
            project_name: "p",
            env: &env,
            custom_steps: &[],
        };
        for descriptor in workflow_templates() {
            let out = render_workflow(descriptor.stack, &ctx).unwrap();
            let parsed: serde_yaml::Value = serde_yaml::from_str(&out)
                .unwrap_or_else(|e| panic!("{} is not valid yaml: {e}", descriptor.resource));
            assert!(parsed.get("jobs").is_some(), "{}", descriptor.resource);
        }
    }

    #[test]
    fn rendering_is_byte_stable() {
        let env = env(&[("projectName", "shop"), ("b", "2"), ("a", "1")]);
        let ctx = WorkflowContext {
            project_name: "shop",
            env: &env,
            custom_steps: &[],
        };
        let first = render_workflow(StackId::NextJs, &ctx).unwrap();
        let second = render_workflow(StackId::NextJs, &ctx).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn terraform_and_ansible_resources_are_embedded() {
        assert!(resources_under("terraform/").contains(&"terraform/aws-ec2.tf.hbs".to_string()));
        assert!(load_resource("ansible/docker-setup.yml.hbs").is_ok());
    }
}
