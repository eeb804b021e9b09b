//! Authenticated API session for one command

use std::path::PathBuf;

use anyhow::{Context, Result};

use super::output::Output;
use crate::api::HttpApi;
use crate::config::{Config, Overrides};
use crate::domain::RecordKind;
use crate::service::{EntityResolver, PipelineSettings, Resolution};

/// Connection flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct Connection {
    pub config: Option<PathBuf>,
    pub overrides: Overrides,
}

impl Connection {
    pub fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref(), &self.overrides)
    }
}

pub struct Session {
    pub config: Config,
    pub api: HttpApi,
}

impl Session {
    /// Loads configuration and builds the HTTP client. No request is made.
    pub fn open(connection: &Connection, output: &Output) -> Result<Self> {
        let config = connection.load_config()?;
        let token = config.require_token()?;
        output.verbose_ctx("session", &format!("Using API at {}", config.base_url));

        let api = HttpApi::new(&config.base_url, token, config.timeout())
            .context("Failed to create API client")?
            .with_email(config.email.clone());

        Ok(Self { config, api })
    }

    pub fn resolver(&self) -> EntityResolver<'_, HttpApi> {
        EntityResolver::new(&self.api)
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        self.config.upload.pipeline_settings()
    }

    /// Finds the project and full identifier for a human ID or full ID
    pub fn locate(
        &self,
        output: &Output,
        kind: RecordKind,
        id: &str,
        project: Option<&str>,
    ) -> Result<Resolution> {
        output.verbose_ctx(
            "resolve",
            &format!("Looking up {} {} in {}", kind, id, project.unwrap_or("all active projects")),
        );

        let found = self.resolver().locate(kind, id, project)?;
        if found.is_ambiguous() {
            output.verbose_ctx(
                "resolve",
                &format!(
                    "{} records share the ID {}; using the most recently modified one",
                    found.ambiguous_matches, id
                ),
            );
        }
        output.verbose_ctx(
            "resolve",
            &format!("Found {} {} in project {}", kind, found.remote_id, found.project_id),
        );
        Ok(found)
    }
}
