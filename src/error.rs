// thiserror's generated code for struct variants trips unused_assignments.
#![allow(unused_assignments)]

use crate::docker::DockerError;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(devstack::config::error))]
    Config(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(devstack::config::validation),
        help("Check the services, hasura and healthcheck sections of devstack.yaml")
    )]
    Validation(String),

    #[error("Docker error: {0}")]
    #[diagnostic(
        code(devstack::docker::error),
        help("Check that Docker is running with `docker ps`")
    )]
    Docker(#[from] DockerError),

    #[error("Cannot connect to the Docker daemon: {0}")]
    #[diagnostic(
        code(devstack::docker::unavailable),
        help("Start Docker Desktop or the docker service, then run the command again")
    )]
    DockerUnavailable(String),

    #[error("Failed to pull image '{image}': {reason}")]
    #[diagnostic(
        code(devstack::image::pull_failed),
        help("Pull it manually with `docker image pull {image}`")
    )]
    ImagePull { image: String, reason: String },

    #[error("Failed to prepare network '{name}': {reason}")]
    #[diagnostic(code(devstack::network::error))]
    Network { name: String, reason: String },

    #[error("Service '{0}' failed to start: {1}")]
    #[diagnostic(
        code(devstack::service::start_failed),
        help("Inspect the container with `docker logs <container>`")
    )]
    ContainerStartFailed(String, String),

    #[error("health check of at least 1 service has failed")]
    #[diagnostic(
        code(devstack::service::health_check_failed),
        help("Check the container logs and the healthcheck path in devstack.yaml")
    )]
    HealthCheckFailed { services: Vec<String> },

    #[error("Failed to {step}")]
    #[diagnostic(
        code(devstack::migration::failed),
        help("The Hasura CLI output was printed above")
    )]
    Migration { step: String, output: String },

    #[error("Failed to apply seed '{file}': {reason}")]
    #[diagnostic(code(devstack::seed::failed))]
    Seed { file: String, reason: String },

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(devstack::filesystem::error))]
    Filesystem(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::DockerUnavailable(_) => Some(
                "Start Docker and verify it responds with: docker info".to_string(),
            ),
            Error::ImagePull { image, .. } => Some(format!(
                "Pull it manually with `docker image pull {}`",
                image
            )),
            Error::HealthCheckFailed { services } if !services.is_empty() => Some(format!(
                "Unhealthy: {}. Check their logs with `docker logs <container>`",
                services.join(", ")
            )),
            Error::Migration { .. } => Some(
                "Fix the migration or metadata files and save them again to re-apply".to_string(),
            ),
            Error::Config(msg) if msg.contains("Could not find") => None,
            Error::Config(_) | Error::Validation(_) => {
                Some("Review devstack.yaml in the project root".to_string())
            }
            Error::Docker(_) => Some("Check that Docker is running: docker ps".to_string()),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }

    /// True when the error only reports cancellation of an in-flight operation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled(_) => true,
            Error::Multiple(errors) => !errors.is_empty() && errors.iter().all(Error::is_cancelled),
            _ => false,
        }
    }

    /// Collapse a list of errors: none is success, one is returned as-is.
    pub fn from_many(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}
