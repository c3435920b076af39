//! The Docker Engine capability consumed by the environment.
//!
//! [`DockerEngine`] is the seam between orchestration logic and the container
//! runtime. [`DockerClient`](super::DockerClient) implements it on top of the
//! Docker CLI; tests substitute in-memory doubles.

use super::DockerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label carrying the environment prefix on every container and network we create.
pub const PREFIX_LABEL: &str = "dev.devstack.prefix";

/// Label carrying the logical service name on every container we create.
pub const SERVICE_LABEL: &str = "dev.devstack.service";

/// Daemon details returned by [`DockerEngine::info`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub server_version: String,
}

/// A port as reported for a container listing.
///
/// `public_port == 0` or an empty `ip` means the port is exposed but not
/// published on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub ip: String,
    pub private_port: u16,
    pub public_port: u16,
    pub protocol: String,
}

impl PortMapping {
    pub fn is_published(&self) -> bool {
        !self.ip.is_empty() && self.public_port != 0
    }
}

/// One entry of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    /// Container names; the Engine API reports them with a leading `/`.
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub ports: Vec<PortMapping>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host: u16,
    pub container: u16,
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name, `<prefix>_<service>`.
    pub name: String,
    /// Image reference, `image:version`.
    pub image: String,
    pub env: Vec<(String, String)>,
    pub ports: Vec<PortBinding>,
    /// Bind mounts and volumes in `source:target[:mode]` form.
    pub volumes: Vec<String>,
    pub command: Vec<String>,
    pub labels: BTreeMap<String, String>,
    /// DNS aliases on the private network.
    pub aliases: Vec<String>,
}

/// Container, network and image operations against a Docker daemon.
#[async_trait]
pub trait DockerEngine: Send + Sync {
    /// Query the daemon; fails when it is unreachable.
    async fn info(&self) -> Result<DaemonInfo, DockerError>;

    /// List all containers (running or not) whose name matches `name_filter`.
    async fn list_containers(&self, name_filter: &str)
        -> Result<Vec<ContainerSummary>, DockerError>;

    /// Create a container attached to `network`, returning its ID.
    async fn create_container(
        &self,
        spec: &ContainerSpec,
        network: &str,
    ) -> Result<String, DockerError>;

    async fn start_container(&self, id: &str) -> Result<(), DockerError>;

    async fn stop_container(&self, id: &str) -> Result<(), DockerError>;

    async fn remove_container(&self, id: &str) -> Result<(), DockerError>;

    /// Remove stopped containers carrying the `prefix` label.
    async fn prune_containers(&self, prefix: &str) -> Result<(), DockerError>;

    async fn list_networks(&self, name_filter: &str) -> Result<Vec<NetworkSummary>, DockerError>;

    /// Create a network labelled with `prefix`, returning its ID.
    async fn create_network(&self, name: &str, prefix: &str) -> Result<String, DockerError>;

    async fn remove_network(&self, id: &str) -> Result<(), DockerError>;

    /// Remove unused networks carrying the `prefix` label.
    async fn prune_networks(&self, prefix: &str) -> Result<(), DockerError>;

    /// Locally available image references (`repository:tag`).
    async fn list_images(&self) -> Result<Vec<String>, DockerError>;
}
