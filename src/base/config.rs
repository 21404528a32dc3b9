//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default status store endpoint (in-memory SurrealDB).
fn default_status_endpoint() -> String {
    "mem://".to_string()
}

/// Default status store namespace.
fn default_status_namespace() -> String {
    "infini".to_string()
}

/// Default status store database.
fn default_status_database() -> String {
    "bot".to_string()
}

/// Default directory that holds rule-package files.
fn default_packages_dir() -> String {
    "packages".to_string()
}

/// Default prefix for package manager commands.
fn default_ipm_prefix() -> String {
    ".ipm".to_string()
}

/// Default platform name reported to the core.
fn default_platform_name() -> String {
    "Slack".to_string()
}

/// Default number of workflows allowed to run at once.
fn default_workflow_concurrency() -> usize {
    16
}

/// Configuration for the infini-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Slack app token (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Slack signing secret (`SLACK_SIGNING_SECRET`).
    pub slack_signing_secret: String,
    /// Status store endpoint, e.g. `mem://` or `ws://localhost:8000` (`STATUS_ENDPOINT`).
    #[serde(default = "default_status_endpoint")]
    pub status_endpoint: String,
    /// Status store root username (`STATUS_USERNAME`).
    #[serde(default)]
    pub status_username: Option<String>,
    /// Status store root password (`STATUS_PASSWORD`).
    #[serde(default)]
    pub status_password: Option<String>,
    /// Status store namespace (`STATUS_NAMESPACE`).
    #[serde(default = "default_status_namespace")]
    pub status_namespace: String,
    /// Status store database (`STATUS_DATABASE`).
    #[serde(default = "default_status_database")]
    pub status_database: String,
    /// Directory containing rule-package files (`PACKAGES_DIR`).
    #[serde(default = "default_packages_dir")]
    pub packages_dir: String,
    /// Prefix that routes a message to the package manager (`IPM_PREFIX`).
    #[serde(default = "default_ipm_prefix")]
    pub ipm_prefix: String,
    /// Platform name handed to the core as the `platform` variable (`PLATFORM_NAME`).
    #[serde(default = "default_platform_name")]
    pub platform_name: String,
    /// Users allowed to run package manager commands; empty allows everyone (`ADMIN_USERS`).
    #[serde(default)]
    pub admin_users: Vec<String>,
    /// Maximum number of concurrently running workflows (`WORKFLOW_CONCURRENCY`).
    #[serde(default = "default_workflow_concurrency")]
    pub workflow_concurrency: usize,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            slack_app_token: String::new(),
            slack_bot_token: String::new(),
            slack_signing_secret: String::new(),
            status_endpoint: default_status_endpoint(),
            status_username: None,
            status_password: None,
            status_namespace: default_status_namespace(),
            status_database: default_status_database(),
            packages_dir: default_packages_dir(),
            ipm_prefix: default_ipm_prefix(),
            platform_name: default_platform_name(),
            admin_users: Vec::new(),
            workflow_concurrency: default_workflow_concurrency(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(
            config::Environment::default()
                .prefix("INFINI_BOT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("admin_users"),
        );

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the invariants that deserialization cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.ipm_prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("IPM prefix must not be empty."));
        }

        if self.workflow_concurrency < 1 || self.workflow_concurrency > 1024 {
            return Err(anyhow::anyhow!("Workflow concurrency must be between 1 and 1024."));
        }

        Ok(())
    }
}
