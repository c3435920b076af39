use super::{Environment, State};
use crate::config::{Config, ProjectPaths};
use crate::docker::{CliImagePuller, DockerClient, DockerEngine, ImagePuller};
use crate::error::Result;
use crate::git;
use crate::hasura::{HasuraClient, Migrator};
use crate::healthcheck::{HealthPolicy, HealthProbe, HttpProbe};
use crate::service::ServiceRegistry;
use crate::watch::PathWatcher;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Assembles an [`Environment`].
///
/// Every capability defaults to its production implementation; tests swap in
/// doubles through the setters.
pub struct EnvironmentBuilder {
    config: Config,
    root: PathBuf,
    docker: Option<Arc<dyn DockerEngine>>,
    puller: Option<Arc<dyn ImagePuller>>,
    migrator: Option<Arc<dyn Migrator>>,
    probe: Option<Arc<dyn HealthProbe>>,
    watcher: Option<Arc<dyn PathWatcher>>,
    watch_git: Option<bool>,
}

impl EnvironmentBuilder {
    pub fn new(config: Config, root: &Path) -> Self {
        Self {
            config,
            root: root.to_path_buf(),
            docker: None,
            puller: None,
            migrator: None,
            probe: None,
            watcher: None,
            watch_git: None,
        }
    }

    pub fn docker(mut self, docker: Arc<dyn DockerEngine>) -> Self {
        self.docker = Some(docker);
        self
    }

    pub fn image_puller(mut self, puller: Arc<dyn ImagePuller>) -> Self {
        self.puller = Some(puller);
        self
    }

    pub fn migrator(mut self, migrator: Arc<dyn Migrator>) -> Self {
        self.migrator = Some(migrator);
        self
    }

    pub fn health_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn watcher(mut self, watcher: Arc<dyn PathWatcher>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Override `git.enabled` from the configuration.
    pub fn watch_git(mut self, enabled: bool) -> Self {
        self.watch_git = Some(enabled);
        self
    }

    pub fn build(self) -> Result<Arc<Environment>> {
        self.config.validate()?;

        let branch = git::current_branch_or_none(&self.root);
        let paths = ProjectPaths::resolve(&self.root, &self.config, branch.as_deref());

        let docker = match self.docker {
            Some(docker) => docker,
            None => {
                let timeout = self
                    .config
                    .docker
                    .timeout()
                    .unwrap_or(crate::docker::client::DEFAULT_COMMAND_TIMEOUT);
                Arc::new(DockerClient::with_timeout(timeout))
            }
        };
        let puller = self
            .puller
            .unwrap_or_else(|| Arc::new(CliImagePuller::new()));
        let migrator = match self.migrator {
            Some(migrator) => migrator,
            None => Arc::new(HasuraClient::new(
                &self.config.hasura,
                paths.nhost_dir.clone(),
            )?),
        };
        let probe = match self.probe {
            Some(probe) => probe,
            None => {
                let timeout = self
                    .config
                    .healthcheck
                    .timeout()
                    .unwrap_or(Duration::from_secs(5));
                Arc::new(HttpProbe::new(timeout)?)
            }
        };

        let parent = CancellationToken::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Arc::new(Environment {
            services: ServiceRegistry::from_config(&self.config),
            health_policy: HealthPolicy::from_config(&self.config),
            watch_git: self.watch_git.unwrap_or(self.config.git.enabled),
            paths: RwLock::new(paths),
            state: Mutex::new(State::Unknown),
            execution: Mutex::new(parent.child_token()),
            parent,
            network: tokio::sync::Mutex::new(None),
            docker,
            puller,
            migrator,
            probe,
            watcher: Mutex::new(self.watcher),
            servers: Mutex::new(Vec::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            cleanup_started: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            config: self.config,
        }))
    }
}
