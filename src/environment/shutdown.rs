use super::{Environment, State};
use crate::docker::DockerEngine;
use crate::error::{Error, Result};
use crate::service::Service;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

impl Environment {
    /// Stop every known container concurrently; with `purge`, remove them too.
    ///
    /// Every service ends inactive. Purged services, and services whose
    /// container turned out to be gone, lose their container ID, port and
    /// address. Errors from all services are collected and returned together.
    pub async fn shutdown(&self, purge: bool, token: &CancellationToken) -> Result<()> {
        self.set_state(State::ShuttingDown);

        let mut tasks = JoinSet::new();
        for service in self.services.snapshot() {
            let Some(id) = service.container_id() else {
                service.deactivate();
                continue;
            };
            let docker = Arc::clone(&self.docker);
            let token = token.clone();
            tasks.spawn(async move { stop_service(docker, service, id, purge, token).await });
        }

        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(Error::Task(e.to_string())),
            }
        }

        self.set_state(State::Inactive);
        Error::from_many(errors)
    }

    /// Release everything the environment holds. Runs at most once.
    ///
    /// Background tasks are stopped and the watcher closed first. Containers
    /// are stopped (not removed) only if a run was started; failures there
    /// are logged. The environment's lifetime token is cancelled last.
    pub async fn cleanup(&self) {
        if self
            .cleanup_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Cleanup already in progress");
            return;
        }

        self.stop_servers().await;

        let watcher = self.watcher.lock().take();
        if let Some(watcher) = watcher {
            watcher.close();
        }

        if self.state() >= State::Executing {
            tracing::warn!("Please wait while we clean up");
            if let Err(e) = self.shutdown(false, &self.parent).await {
                tracing::error!("Failed to stop running services: {}", e);
            }
        }

        self.parent.cancel();
        tracing::info!("Cleanup complete");
    }
}

async fn stop_service(
    docker: Arc<dyn DockerEngine>,
    service: Arc<Service>,
    id: String,
    purge: bool,
    token: CancellationToken,
) -> Result<()> {
    let name = service.name().to_string();
    let mut errors = Vec::new();

    let stopped = tokio::select! {
        biased;
        _ = token.cancelled() => {
            service.deactivate();
            return Err(Error::Cancelled(format!("stopping {}", name)));
        }
        result = docker.stop_container(&id) => result,
    };
    match stopped {
        Ok(()) => tracing::debug!("Stopped {}", name),
        Err(e) if e.is_not_found() => {
            service.deactivate();
            service.reset();
            return Ok(());
        }
        Err(e) => {
            tracing::error!("Failed to stop {}: {}", name, e);
            errors.push(Error::Docker(e));
        }
    }
    service.deactivate();

    if purge {
        let removed = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled(format!("removing {}", name))),
            result = docker.remove_container(&id) => result,
        };
        match removed {
            Ok(()) => {
                tracing::debug!("Removed {}", name);
                service.reset();
            }
            Err(e) if e.is_not_found() => service.reset(),
            Err(e) => {
                tracing::error!("Failed to remove {}: {}", name, e);
                errors.push(Error::Docker(e));
            }
        }
    }

    Error::from_many(errors)
}
