/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed contributor configuration
[POS]:    Configuration layer - API endpoints, editor preference, session timing
[UPDATE]: When adding new configuration options
*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use tasking_manager_adapter::{ClientConfig, Editor, ValidationPermission};
use url::Url;

use crate::session::DEFAULT_WARNING_LEAD;

/// Top-level configuration for the contributor CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContributorConfig {
    /// Tasking Manager API base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Loopback remote-control endpoint of JOSM
    #[serde(default = "default_josm_url")]
    pub josm_url: String,
    /// Preferred editor key (e.g. "ID", "JOSM")
    #[serde(default = "default_editor")]
    pub default_editor: String,
    /// Seconds before lock expiry at which the warning is raised
    #[serde(default = "default_warning_lead_secs")]
    pub warning_lead_secs: u64,
    #[serde(default)]
    pub validation_permission: ValidationPermission,
    #[serde(default)]
    pub http: HttpConfig,
    /// OSM username of the contributor
    #[serde(default)]
    pub username: Option<String>,
    /// Session token; the TM_TOKEN environment variable takes precedence
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    /// Directory for a daily rolling log file
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// Network timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Timeout for each remote-control command
    #[serde(default = "default_editor_timeout_secs")]
    pub editor_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            editor_timeout_secs: default_editor_timeout_secs(),
        }
    }
}

impl Default for ContributorConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            josm_url: default_josm_url(),
            default_editor: default_editor(),
            warning_lead_secs: default_warning_lead_secs(),
            validation_permission: ValidationPermission::default(),
            http: HttpConfig::default(),
            username: None,
            token: None,
            locale: None,
            log_dir: None,
        }
    }
}

fn default_api_base_url() -> String {
    "https://tasking-manager-tm4-production-api.hotosm.org/api/v2".to_string()
}

fn default_josm_url() -> String {
    "http://127.0.0.1:8111".to_string()
}

fn default_editor() -> String {
    Editor::Id.key().to_string()
}

fn default_warning_lead_secs() -> u64 {
    DEFAULT_WARNING_LEAD.as_secs()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_editor_timeout_secs() -> u64 {
    5
}

impl ContributorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject URLs that cannot be parsed and a zero warning lead
    pub fn validate(&self) -> anyhow::Result<()> {
        Url::parse(&self.api_base_url)
            .with_context(|| format!("invalid api_base_url {:?}", self.api_base_url))?;
        Url::parse(&self.josm_url)
            .with_context(|| format!("invalid josm_url {:?}", self.josm_url))?;
        if self.warning_lead_secs == 0 {
            bail!("warning_lead_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
        }
    }

    pub fn warning_lead(&self) -> Duration {
        Duration::from_secs(self.warning_lead_secs)
    }

    pub fn editor_timeout(&self) -> Duration {
        Duration::from_secs(self.http.editor_timeout_secs)
    }
}
