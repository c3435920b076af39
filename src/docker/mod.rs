//! Docker access for the environment.
//!
//! The orchestration code only talks to the [`DockerEngine`] and
//! [`ImagePuller`] traits. [`DockerClient`] and [`CliImagePuller`] implement
//! them with the `docker` CLI.

pub mod client;
pub mod engine;
pub mod error;
pub mod pull;

pub use client::DockerClient;
pub use engine::{
    ContainerSpec, ContainerSummary, DaemonInfo, DockerEngine, NetworkSummary, PortBinding,
    PortMapping, PREFIX_LABEL, SERVICE_LABEL,
};
pub use error::DockerError;
pub use pull::{CliImagePuller, ImagePuller};

/// Convert an arbitrary string into a valid Docker container/network name component.
///
/// Docker names allow `[a-zA-Z0-9][a-zA-Z0-9_.-]*`; anything else becomes `-`.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    sanitized.trim_start_matches(['-', '.', '_']).to_string()
}
