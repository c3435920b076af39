//! Docker CLI client.
//!
//! All Docker CLI interactions go through `DockerClient`, which provides
//! consistent timeout handling, error mapping to [`DockerError`], and a single
//! point where the `docker` command is constructed.

use super::engine::{
    ContainerSpec, ContainerSummary, DaemonInfo, DockerEngine, NetworkSummary, PortMapping,
    PREFIX_LABEL,
};
use super::DockerError;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Output;
use std::time::Duration;

/// Default timeout for a single docker invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for Docker operations backed by the `docker` binary.
///
/// Cheap to clone; holds only the binary name and the per-command timeout.
#[derive(Debug, Clone)]
pub struct DockerClient {
    binary: String,
    timeout: Duration,
}

impl DockerClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_COMMAND_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        DockerClient {
            binary: "docker".to_string(),
            timeout,
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn command_string(&self, args: &[&str]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    /// Run a docker command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str]) -> Result<Output, DockerError> {
        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let cmd_str = self.command_string(args);
        tracing::debug!("Running {}", cmd_str);

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DockerError::exec_failed(cmd_str, e)),
            Err(_) => Err(DockerError::timeout(cmd_str, self.timeout)),
        }
    }

    /// Run a docker command with a timeout, returning Output only if exit 0.
    async fn run_success(&self, args: &[&str]) -> Result<Output, DockerError> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(DockerError::failed(self.command_string(args), &output))
        }
    }

    /// Run a command and return its trimmed stdout.
    async fn run_stdout(&self, args: &[&str]) -> Result<String, DockerError> {
        let output = self.run_success(args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Run a command whose output is one JSON document per line.
    async fn run_json_lines<T: for<'de> Deserialize<'de>>(
        &self,
        args: &[&str],
    ) -> Result<Vec<T>, DockerError> {
        let stdout = self.run_stdout(args).await?;
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| DockerError::unexpected(self.command_string(args), e.to_string()))
            })
            .collect()
    }
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `docker ps --format '{{json .}}'` row.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    ports: String,
}

impl From<PsRow> for ContainerSummary {
    fn from(row: PsRow) -> Self {
        ContainerSummary {
            id: row.id,
            names: row
                .names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| format!("/{}", n))
                .collect(),
            image: row.image,
            state: row.state,
            ports: parse_port_mappings(&row.ports),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkRow {
    #[serde(rename = "ID")]
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageRow {
    repository: String,
    tag: String,
}

/// Parse the `Ports` column of `docker ps`.
///
/// Handles `0.0.0.0:5432->5432/tcp`, `[::]:5432->5432/tcp`, `:::5432->5432/tcp`
/// and unpublished `5432/tcp` entries. Port ranges are skipped.
pub fn parse_port_mappings(column: &str) -> Vec<PortMapping> {
    column
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(parse_port_entry)
        .collect()
}

fn parse_port_entry(entry: &str) -> Option<PortMapping> {
    let (host, target) = match entry.split_once("->") {
        Some((host, target)) => (Some(host), target),
        None => (None, entry),
    };
    let (private, protocol) = target.split_once('/').unwrap_or((target, "tcp"));
    let private_port = private.parse::<u16>().ok()?;

    let Some(host) = host else {
        return Some(PortMapping {
            ip: String::new(),
            private_port,
            public_port: 0,
            protocol: protocol.to_string(),
        });
    };

    let (ip, public) = host.rsplit_once(':')?;
    let public_port = public.parse::<u16>().ok()?;
    let ip = ip.trim_start_matches('[').trim_end_matches(']');
    let ip = if ip.is_empty() || ip == "::" { "::" } else { ip };

    Some(PortMapping {
        ip: ip.to_string(),
        private_port,
        public_port,
        protocol: protocol.to_string(),
    })
}

/// Translate a [`ContainerSpec`] into `docker create` arguments.
pub fn create_args(spec: &ContainerSpec, network: &str) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--network".to_string(),
        network.to_string(),
    ];
    for alias in &spec.aliases {
        args.push("--network-alias".to_string());
        args.push(alias.clone());
    }
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    for binding in &spec.ports {
        args.push("--publish".to_string());
        args.push(format!("{}:{}", binding.host, binding.container));
    }
    for volume in &spec.volumes {
        args.push("--volume".to_string());
        args.push(volume.clone());
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

#[async_trait]
impl DockerEngine for DockerClient {
    async fn info(&self) -> Result<DaemonInfo, DockerError> {
        let version = self
            .run_stdout(&["info", "--format", "{{.ServerVersion}}"])
            .await?;
        if version.is_empty() {
            return Err(DockerError::DaemonUnavailable);
        }
        Ok(DaemonInfo {
            server_version: version,
        })
    }

    async fn list_containers(
        &self,
        name_filter: &str,
    ) -> Result<Vec<ContainerSummary>, DockerError> {
        let filter = format!("name={}", name_filter);
        let rows: Vec<PsRow> = self
            .run_json_lines(&[
                "ps",
                "-a",
                "--no-trunc",
                "--filter",
                &filter,
                "--format",
                "{{json .}}",
            ])
            .await?;
        Ok(rows.into_iter().map(ContainerSummary::from).collect())
    }

    async fn create_container(
        &self,
        spec: &ContainerSpec,
        network: &str,
    ) -> Result<String, DockerError> {
        let args = create_args(spec, network);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = self.run_stdout(&arg_refs).await?;
        // docker create may print pull progress or warnings before the ID
        id.lines()
            .last()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                DockerError::unexpected(self.command_string(&["create", &spec.name]), "no ID")
            })
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.run_success(&["start", id]).await.map(|_| ())
    }

    async fn stop_container(&self, id: &str) -> Result<(), DockerError> {
        self.run_success(&["stop", id]).await.map(|_| ())
    }

    async fn remove_container(&self, id: &str) -> Result<(), DockerError> {
        self.run_success(&["rm", "-f", "-v", id]).await.map(|_| ())
    }

    async fn prune_containers(&self, prefix: &str) -> Result<(), DockerError> {
        let filter = format!("label={}={}", PREFIX_LABEL, prefix);
        self.run_success(&["container", "prune", "-f", "--filter", &filter])
            .await
            .map(|_| ())
    }

    async fn list_networks(&self, name_filter: &str) -> Result<Vec<NetworkSummary>, DockerError> {
        let filter = format!("name={}", name_filter);
        let rows: Vec<NetworkRow> = self
            .run_json_lines(&[
                "network",
                "ls",
                "--no-trunc",
                "--filter",
                &filter,
                "--format",
                "{{json .}}",
            ])
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| NetworkSummary {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn create_network(&self, name: &str, prefix: &str) -> Result<String, DockerError> {
        let label = format!("{}={}", PREFIX_LABEL, prefix);
        self.run_stdout(&["network", "create", "--label", &label, name])
            .await
    }

    async fn remove_network(&self, id: &str) -> Result<(), DockerError> {
        self.run_success(&["network", "rm", id]).await.map(|_| ())
    }

    async fn prune_networks(&self, prefix: &str) -> Result<(), DockerError> {
        let filter = format!("label={}={}", PREFIX_LABEL, prefix);
        self.run_success(&["network", "prune", "-f", "--filter", &filter])
            .await
            .map(|_| ())
    }

    async fn list_images(&self) -> Result<Vec<String>, DockerError> {
        let rows: Vec<ImageRow> = self
            .run_json_lines(&["image", "ls", "--format", "{{json .}}"])
            .await?;
        Ok(rows
            .into_iter()
            .filter(|row| row.repository != "<none>" && row.tag != "<none>")
            .map(|row| format!("{}:{}", row.repository, row.tag))
            .collect())
    }
}
