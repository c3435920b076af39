//! Core configuration types.
//!
//! This module contains the root [`Config`] struct for `devstack.yaml` and the
//! small sections that hang off it.

use super::{parse_duration_string, ServiceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

fn default_prefix() -> String {
    "nhost".to_string()
}

fn default_nhost_dir() -> String {
    "nhost".to_string()
}

/// Root configuration structure for devstack.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Prefix for container and network names (`<prefix>_<service>`).
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Directory, relative to the project root, holding migrations, metadata and seeds.
    #[serde(default = "default_nhost_dir")]
    pub nhost_dir: String,

    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,

    #[serde(default)]
    pub hasura: HasuraConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub healthcheck: HealthCheckSettings,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub docker: DockerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            nhost_dir: default_nhost_dir(),
            services: BTreeMap::new(),
            hasura: HasuraConfig::default(),
            git: GitConfig::default(),
            healthcheck: HealthCheckSettings::default(),
            mail: MailConfig::default(),
            docker: DockerSettings::default(),
        }
    }
}

/// The GraphQL engine that owns migrations and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HasuraConfig {
    /// Service whose address is used as the migration endpoint.
    pub service: String,
    pub admin_secret: String,
    /// Hasura CLI executable.
    pub cli: String,
    /// Database the migrations and seeds are applied to.
    pub database: String,
}

impl Default for HasuraConfig {
    fn default() -> Self {
        Self {
            service: "hasura".to_string(),
            admin_secret: "nhost-admin-secret".to_string(),
            cli: "hasura".to_string(),
            database: "default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Watch HEAD and the upstream ref and restart on changes.
    pub enabled: bool,
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckSettings {
    pub attempts: u32,
    /// Delay between attempts, e.g. "1s" or "500ms".
    pub interval: String,
    /// Per-request timeout for HTTP probes.
    pub timeout: String,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            attempts: 240,
            interval: "1s".to_string(),
            timeout: "5s".to_string(),
        }
    }
}

impl HealthCheckSettings {
    pub fn interval(&self) -> Option<Duration> {
        parse_duration_string(&self.interval)
    }

    pub fn timeout(&self) -> Option<Duration> {
        parse_duration_string(&self.timeout)
    }
}

/// The mail catcher publishes an SMTP port next to its web UI; only the UI
/// port is recorded as the service port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub service: String,
    pub smtp_port: Option<u16>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            service: "mailhog".to_string(),
            smtp_port: Some(1025),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerSettings {
    /// Timeout for a single docker CLI invocation.
    pub timeout: String,
}

impl Default for DockerSettings {
    fn default() -> Self {
        Self {
            timeout: "60s".to_string(),
        }
    }
}

impl DockerSettings {
    pub fn timeout(&self) -> Option<Duration> {
        parse_duration_string(&self.timeout)
    }
}
