//! Admin endpoint configuration: defaults, YAML file, environment.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_ENDPOINT: &str = "LAYOUTCTL_ENDPOINT";
pub const ENV_ADMIN_TOKEN: &str = "LAYOUTCTL_ADMIN_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "LAYOUTCTL_TIMEOUT_SECS";

/// Where the cluster admin API lives and how to talk to it.
///
/// ```yaml
/// endpoint: http://10.0.0.1:3903
/// admin_token: s3cr3t
/// timeout_secs: 30
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub endpoint: String,
    pub admin_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:3903".to_string(),
            admin_token: None,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("endpoint", &self.endpoint)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AdminConfig {
    /// Defaults overridden by `LAYOUTCTL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("failed to parse admin config YAML")
    }

    /// Let set environment variables override the current values.
    pub fn merge_env(self) -> Result<Self> {
        self.merge_from(|key| std::env::var(key).ok())
    }

    fn merge_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            self.endpoint = endpoint.trim().to_string();
        }
        if let Some(token) = lookup(ENV_ADMIN_TOKEN).filter(|v| !v.is_empty()) {
            self.admin_token = Some(token);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds, got `{}`", ENV_TIMEOUT_SECS, raw))?;
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
