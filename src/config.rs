//! Configuration handling for the EdControls CLI
//!
//! Settings come from `config.toml` in the platform config directory (or the
//! file given with `--config`), overridden by environment variables and
//! command-line flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::{PipelineSettings, PollPolicy};

pub const DEFAULT_BASE_URL: &str = "https://web.edcontrols.com";

pub const TOKEN_ENV: &str = "EDCONTROLS_ACCESS_TOKEN";
pub const EMAIL_ENV: &str = "EDCONTROLS_USER_EMAIL";
pub const BASE_URL_ENV: &str = "EDCONTROLS_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("EDCONTROLS_ACCESS_TOKEN not set.\n\n{help}")]
    MissingToken { help: String },

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Upload and map conversion tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UploadSettings {
    /// Recent files scanned when looking for a freshly uploaded file
    pub discover_page_size: usize,

    pub poll_initial_delay_ms: u64,

    pub poll_max_delay_ms: u64,

    /// Give up looking for the uploaded file after this long
    pub poll_timeout_ms: u64,

    /// Delete the file record again when map conversion cannot be queued
    pub cleanup_on_failure: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            discover_page_size: 20,
            poll_initial_delay_ms: 500,
            poll_max_delay_ms: 4000,
            poll_timeout_ms: 15000,
            cleanup_on_failure: true,
        }
    }
}

impl UploadSettings {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            poll: PollPolicy {
                initial_delay: Duration::from_millis(self.poll_initial_delay_ms),
                max_delay: Duration::from_millis(self.poll_max_delay_ms),
                timeout: Duration::from_millis(self.poll_timeout_ms),
            },
            discover_page_size: self.discover_page_size.max(1),
            cleanup_on_failure: self.cleanup_on_failure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Bearer token for the API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Email of the token's user; looked up when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub base_url: String,

    /// HTTP request timeout
    pub timeout_secs: u64,

    pub upload: UploadSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            email: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            upload: UploadSettings::default(),
        }
    }
}

/// Values given on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub token: Option<String>,
    pub email: Option<String>,
    pub base_url: Option<String>,
}

impl Config {
    /// Returns the platform config directory
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "edcontrols", "edcontrols-cli")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Loads the config file, then applies overrides.
    ///
    /// An explicit `path` must exist. A missing default file yields defaults.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()).into());
                }
                Self::load_file(path)?
            }
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply(overrides);
        Ok(config)
    }

    /// Parses one config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Non-empty override values replace file values
    pub fn apply(&mut self, overrides: &Overrides) {
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        if let Some(token) = non_empty(&overrides.token) {
            self.token = Some(token);
        }
        if let Some(email) = non_empty(&overrides.email) {
            self.email = Some(email);
        }
        if let Some(base_url) = non_empty(&overrides.base_url) {
            self.base_url = base_url;
        }
    }

    /// Returns the token, or an error explaining where to set one
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingToken { help: config_help() })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Token with all but the last four characters hidden
    pub fn masked_token(&self) -> Option<String> {
        self.token.as_deref().map(mask)
    }
}

fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

/// Where a token can come from
pub fn config_help() -> String {
    let location = Config::default_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<config dir>/edcontrols-cli/config.toml".to_string());

    let mut help = String::from("Configuration can be provided via:\n");
    help.push_str("  1. Command line via --token flag\n");
    help.push_str(&format!("  2. Environment variable {}\n", TOKEN_ENV));
    help.push_str(&format!("  3. The config file at {}\n", location));
    help.push_str("  4. A custom config file via --config flag\n");
    help.push_str("\nExample config.toml:\n");
    help.push_str("  token = \"your_bearer_token\"\n");
    help.push_str("  email = \"you@example.com\"\n");
    help.push_str("\nGet your token from the EdControls web interface.");
    help
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.upload.discover_page_size, 20);
        assert!(config.upload.cleanup_on_failure);
        assert!(config.token.is_none());
    }

    #[test]
    fn parse_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
token = "abc-123"

[upload]
poll_timeout_ms = 3000
cleanup_on_failure = false
"#,
        );

        let config = Config::load(Some(&path), &Overrides::default()).unwrap();
        assert_eq!(config.token.as_deref(), Some("abc-123"));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.upload.poll_timeout_ms, 3000);
        assert_eq!(config.upload.poll_initial_delay_ms, 500);
        assert!(!config.upload.cleanup_on_failure);
    }

    #[test]
    fn overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "token = \"from-file\"\nemail = \"file@example.com\"\n");

        let overrides = Overrides {
            token: Some("from-flag".into()),
            email: Some("".into()),
            base_url: Some("http://localhost:9999".into()),
        };
        let config = Config::load(Some(&path), &overrides).unwrap();

        assert_eq!(config.token.as_deref(), Some("from-flag"));
        assert_eq!(config.email.as_deref(), Some("file@example.com"));
        assert_eq!(config.base_url, "http://localhost:9999");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err =
            Config::load(Some(&dir.path().join("nope.toml")), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "token = [unclosed");

        let err = Config::load(Some(&path), &Overrides::default()).unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    #[test]
    fn missing_token_explains_sources() {
        let err = Config::default().require_token().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("EDCONTROLS_ACCESS_TOKEN not set."));
        assert!(message.contains("--token"));
        assert!(message.contains("--config"));

        let blank = Config {
            token: Some("  ".into()),
            ..Config::default()
        };
        assert!(blank.require_token().is_err());
    }

    #[test]
    fn token_is_masked() {
        let config = Config {
            token: Some("12345678-abcd".into()),
            ..Config::default()
        };
        assert_eq!(config.masked_token().as_deref(), Some("*********abcd"));
        assert_eq!(mask("abc"), "***");
    }

    #[test]
    fn upload_settings_become_poll_policy() {
        let settings = UploadSettings {
            discover_page_size: 0,
            ..UploadSettings::default()
        }
        .pipeline_settings();

        assert_eq!(settings.discover_page_size, 1);
        assert_eq!(settings.poll.initial_delay, Duration::from_millis(500));
        assert_eq!(settings.poll.max_delay, Duration::from_secs(4));
        assert_eq!(settings.poll.timeout, Duration::from_secs(15));
    }
}
