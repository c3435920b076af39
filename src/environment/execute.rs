//! The startup pipeline and migration preparation.

use super::{Environment, State};
use crate::config::materialize;
use crate::docker::{ContainerSpec, DockerError};
use crate::error::{Error, Result};
use crate::hasura::Endpoint;
use crate::healthcheck;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

impl Environment {
    /// Bring the whole environment up under a fresh execution token.
    ///
    /// Steps run strictly in order and the first failure aborts the run. The
    /// execution token is cancelled when this returns, whatever the outcome.
    pub async fn execute(&self) -> Result<()> {
        let token = self.renew_execution();
        let _guard = token.clone().drop_guard();
        let span = tracing::info_span!("execute", prefix = %self.config.prefix);
        self.run_pipeline(&token).instrument(span).await
    }

    async fn run_pipeline(&self, token: &CancellationToken) -> Result<()> {
        self.set_state(State::Executing);

        let paths = self.paths();
        let first_run = paths.is_first_run();
        if first_run {
            tracing::info!("First run on this branch: the database will be seeded");
        }

        self.check_images().await?;

        let specs = materialize(&self.config, &paths);
        let network = self.prepare_network().await?;

        for (name, spec) in &specs {
            self.start_service(name, spec, &network, token).await?;
        }

        let containers = self.get_containers().await?;
        self.wrap_containers_as_services(&containers);

        self.health_check(token).await?;

        if self.configure_migrator()? {
            self.prepare(token).await?;

            if first_run {
                if let Err(e) = self.seed().await {
                    tracing::error!("Failed to apply seeds: {}", e);
                    self.cleanup().await;
                    return Err(e);
                }
            }
        }

        if first_run {
            paths.mark_initialized().map_err(|e| {
                Error::Filesystem(format!(
                    "Failed to create {}: {}",
                    paths.first_run_marker().display(),
                    e
                ))
            })?;
        }

        self.set_state(State::Active);
        tracing::info!("Environment is ready");
        Ok(())
    }

    /// Start one service's container, creating it when it does not exist.
    async fn start_service(
        &self,
        name: &str,
        spec: &ContainerSpec,
        network: &str,
        token: &CancellationToken,
    ) -> Result<()> {
        let service = self.services.get_or_discover(name);

        let start = async {
            if let Some(id) = service.container_id() {
                match self.docker.start_container(&id).await {
                    Ok(()) => return Ok(()),
                    Err(e) if e.is_not_found() => {
                        tracing::debug!("Container {} for '{}' is gone; recreating", id, name);
                        service.reset();
                    }
                    Err(e) => return Err(e),
                }
            }
            let id = self.docker.create_container(spec, network).await?;
            service.set_container_id(id.clone());
            self.docker.start_container(&id).await
        };

        let started: std::result::Result<(), DockerError> = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled(format!("starting {}", name))),
            result = start => result,
        };
        started.map_err(|e| Error::ContainerStartFailed(name.to_string(), e.to_string()))?;

        if service.health_path().is_none() {
            service.activate();
        }
        tracing::info!("Started {}", name);
        Ok(())
    }

    /// Poll every service's health endpoint until all are healthy.
    pub async fn health_check(&self, token: &CancellationToken) -> Result<()> {
        healthcheck::check_all(
            self.services.snapshot(),
            self.probe.clone(),
            self.health_policy,
            token,
        )
        .await
    }

    /// Point the migrator at the running engine.
    ///
    /// Returns `false` when no migration service is configured.
    fn configure_migrator(&self) -> Result<bool> {
        let name = &self.config.hasura.service;
        let Some(service) = self.services.get(name) else {
            tracing::debug!("No '{}' service; skipping migrations", name);
            return Ok(false);
        };
        let address = service.address().ok_or_else(|| {
            Error::Config(format!("Service '{}' has no published port", name))
        })?;

        self.migrator.configure(Endpoint {
            url: address,
            admin_secret: self.config.hasura.admin_secret.clone(),
        });
        Ok(true)
    }

    /// Apply migrations and metadata.
    ///
    /// Migrations run when the migrations directory has entries; metadata is
    /// exported first when the metadata directory is empty, then applied.
    pub async fn prepare(&self, token: &CancellationToken) -> Result<()> {
        if !self.configure_migrator()? {
            return Ok(());
        }
        let paths = self.paths();

        async {
            if has_entries(&paths.migrations_dir).unwrap_or(false) {
                tracing::info!("Applying migrations");
                self.migrator.apply_migrations(token).await?;
            }

            let metadata_present = has_entries(&paths.metadata_dir).map_err(|e| {
                Error::Filesystem(format!(
                    "Failed to read metadata directory {}: {}",
                    paths.metadata_dir.display(),
                    e
                ))
            })?;
            if !metadata_present {
                tracing::info!("Exporting metadata");
                self.migrator.export_metadata(token).await?;
            }

            tracing::info!("Applying metadata");
            self.migrator.apply_metadata(token).await
        }
        .instrument(tracing::info_span!("prepare"))
        .await
    }

    /// Run every seed file, in file name order.
    pub async fn seed(&self) -> Result<()> {
        let dir = self.paths().seeds_dir;
        let files = seed_files(&dir)?;
        if files.is_empty() {
            tracing::debug!("No seeds in {}", dir.display());
            return Ok(());
        }

        for file in files {
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let sql = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| Error::Seed {
                    file: file_name.clone(),
                    reason: e.to_string(),
                })?;
            tracing::info!("Applying seed {}", file_name);
            self.migrator.seed(&file_name, &sql).await?;
        }
        Ok(())
    }
}

fn has_entries(dir: &Path) -> std::io::Result<bool> {
    Ok(std::fs::read_dir(dir)?.next().is_some())
}

fn seed_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort();
    Ok(files)
}
