use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_version() -> String {
    "latest".to_string()
}

/// One service entry under `services:` in devstack.yaml.
///
/// A service without an `image` is never materialized into a container; it
/// only gets a record when a matching prefixed container is discovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,

    /// Host port to publish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Port inside the container; defaults to `port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_port: Option<u16>,

    /// HTTP path polled for health, e.g. `/healthz`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            image: None,
            version: default_version(),
            port: None,
            container_port: None,
            healthcheck: None,
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            command: Vec::new(),
        }
    }
}

impl ServiceConfig {
    /// `image:version`, if this service runs in a container.
    pub fn image_ref(&self) -> Option<String> {
        self.image
            .as_ref()
            .map(|image| format!("{}:{}", image, self.version))
    }
}
