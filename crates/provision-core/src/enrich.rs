//! Platform identifier enrichment.
//!
//! Some stacks deploy to a hosting platform whose CI actions need the
//! platform's own project or service id. The enricher looks the human-readable
//! name up through the platform's listing API and writes the id into the
//! environment context. Any failure (no token, network error, non-2xx, no
//! match) leaves the id key present with an empty value.

use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::env_context::{
    EnvMap, PROJECT_NAME_KEY, RENDER_TOKEN_KEY, SERVICE_NAME_KEY, VERCEL_TOKEN_KEY,
};
use crate::error::Result;
use crate::types::StackId;

pub const VERCEL_PROJECT_ID_KEY: &str = "VERCEL_PROJECT_ID";
pub const RENDER_SERVICE_ID_KEY: &str = "RENDER_SERVICE_ID";

// ---------------------------------------------------------------------------
// ProjectLookup
// ---------------------------------------------------------------------------

/// Resolve a project/service name to a platform-specific id.
pub trait ProjectLookup {
    /// `None` when nothing matches or the lookup could not be completed.
    fn find_id(&self, name: &str, token: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct VercelProjects {
    #[serde(default)]
    projects: Vec<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct RenderServiceItem {
    service: NamedEntry,
}

fn http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("provision/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

fn match_name(entries: Vec<NamedEntry>, name: &str) -> Option<String> {
    entries.into_iter().find(|e| e.name == name).map(|e| e.id)
}

/// Vercel projects listing (`GET /v9/projects`).
pub struct VercelClient {
    http: Client,
    base_url: String,
    team_id: Option<String>,
}

impl VercelClient {
    pub fn new(base_url: &str, team_id: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            team_id,
        })
    }

    fn list(&self, token: &str) -> reqwest::Result<Vec<NamedEntry>> {
        let mut req = self
            .http
            .get(format!("{}/v9/projects", self.base_url))
            .bearer_auth(token);
        if let Some(team) = &self.team_id {
            req = req.query(&[("teamId", team)]);
        }
        let body: VercelProjects = req.send()?.error_for_status()?.json()?;
        Ok(body.projects)
    }
}

impl ProjectLookup for VercelClient {
    fn find_id(&self, name: &str, token: &str) -> Option<String> {
        match self.list(token) {
            Ok(projects) => match_name(projects, name),
            Err(e) => {
                warn!(project = name, error = %e, "vercel project lookup failed");
                None
            }
        }
    }
}

/// Render services listing (`GET /v1/services`).
pub struct RenderClient {
    http: Client,
    base_url: String,
}

impl RenderClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn list(&self, token: &str) -> reqwest::Result<Vec<NamedEntry>> {
        let items: Vec<RenderServiceItem> = self
            .http
            .get(format!("{}/v1/services", self.base_url))
            .bearer_auth(token)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(items.into_iter().map(|item| item.service).collect())
    }
}

impl ProjectLookup for RenderClient {
    fn find_id(&self, name: &str, token: &str) -> Option<String> {
        match self.list(token) {
            Ok(services) => match_name(services, name),
            Err(e) => {
                warn!(service = name, error = %e, "render service lookup failed");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Enrichment table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Vercel,
    Render,
}

/// Which context keys an enrichment reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrichment {
    pub platform: Platform,
    pub name_key: &'static str,
    pub token_key: &'static str,
    pub id_key: &'static str,
}

const VERCEL_PROJECT: Enrichment = Enrichment {
    platform: Platform::Vercel,
    name_key: PROJECT_NAME_KEY,
    token_key: VERCEL_TOKEN_KEY,
    id_key: VERCEL_PROJECT_ID_KEY,
};

const RENDER_SERVICE: Enrichment = Enrichment {
    platform: Platform::Render,
    name_key: SERVICE_NAME_KEY,
    token_key: RENDER_TOKEN_KEY,
    id_key: RENDER_SERVICE_ID_KEY,
};

const ENRICHMENTS: &[(StackId, Enrichment)] = &[
    (StackId::ReactVite, VERCEL_PROJECT),
    (StackId::NextJs, VERCEL_PROJECT),
    (StackId::Django, RENDER_SERVICE),
    (StackId::Flask, RENDER_SERVICE),
];

/// The enrichment registered for `stack`, if any.
pub fn enrichment_for(stack: StackId) -> Option<&'static Enrichment> {
    ENRICHMENTS
        .iter()
        .find(|(s, _)| *s == stack)
        .map(|(_, enrichment)| enrichment)
}

// ---------------------------------------------------------------------------
// Enricher
// ---------------------------------------------------------------------------

pub struct Enricher {
    vercel: Box<dyn ProjectLookup>,
    render: Box<dyn ProjectLookup>,
}

impl Enricher {
    pub fn new(vercel: Box<dyn ProjectLookup>, render: Box<dyn ProjectLookup>) -> Self {
        Self { vercel, render }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let vercel = VercelClient::new(
            &settings.vercel_api_url,
            settings.vercel_team_id.clone(),
            settings.http_timeout,
        )?;
        let render = RenderClient::new(&settings.render_api_url, settings.http_timeout)?;
        Ok(Self::new(Box::new(vercel), Box::new(render)))
    }

    fn lookup(&self, platform: Platform) -> &dyn ProjectLookup {
        match platform {
            Platform::Vercel => self.vercel.as_ref(),
            Platform::Render => self.render.as_ref(),
        }
    }

    /// Apply the enrichment registered for `stack`. Stacks without one pass
    /// through unchanged.
    pub fn enrich(&self, stack: StackId, mut env: EnvMap) -> EnvMap {
        let Some(enrichment) = enrichment_for(stack) else {
            debug!(%stack, "no enrichment registered");
            return env;
        };
        let name = env.get(enrichment.name_key).cloned().unwrap_or_default();
        let token = env.get(enrichment.token_key).cloned().unwrap_or_default();

        let id = if name.is_empty() || token.is_empty() {
            debug!(
                platform = ?enrichment.platform,
                "skipping lookup: {} or {} is empty",
                enrichment.name_key,
                enrichment.token_key
            );
            None
        } else {
            self.lookup(enrichment.platform).find_id(&name, &token)
        };

        match &id {
            Some(id) => info!(platform = ?enrichment.platform, %name, %id, "resolved platform id"),
            None => warn!(
                platform = ?enrichment.platform,
                %name,
                "no platform id resolved; leaving {} empty",
                enrichment.id_key
            ),
        }
        env.insert(enrichment.id_key.to_string(), id.unwrap_or_default());
        env
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
