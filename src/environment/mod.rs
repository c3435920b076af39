//! The environment: one project's containers, network and lifecycle.
//!
//! [`Environment`] owns every service record and the Docker, migration and
//! health-probe capabilities, and exposes the lifecycle operations
//! ([`init`](Environment::init), [`execute`](Environment::execute),
//! [`prepare`](Environment::prepare), [`shutdown`](Environment::shutdown),
//! [`cleanup`](Environment::cleanup)). After `init`, transitions are driven
//! by the [`RestartController`], which consumes [`LifecycleEvent`]s one at a
//! time.
//!
//! ## Cancellation
//!
//! The environment holds a parent [`CancellationToken`] for its whole
//! lifetime and one child token per pipeline run. Starting a run cancels the
//! previous child first, so at most one run is ever live. Cleanup works
//! against the parent token and cancels it last.

mod builder;
mod execute;
mod images;
mod network;
mod restart;
mod servers;
mod shutdown;
mod state;

pub use builder::EnvironmentBuilder;
pub use restart::{LifecycleEvent, RestartController};
pub use servers::ServerHandle;
pub use state::State;

use crate::config::{Config, ProjectPaths};
use crate::docker::{ContainerSummary, DockerEngine, ImagePuller};
use crate::error::{Error, Result};
use crate::git;
use crate::hasura::Migrator;
use crate::healthcheck::{HealthPolicy, HealthProbe};
use crate::service::{
    wrap_containers_as_services, MappingRules, Service, ServiceRegistry, ServiceStatus,
};
use crate::watch::{FileWatcher, PathWatcher};
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct Environment {
    config: Config,
    paths: RwLock<ProjectPaths>,
    state: Mutex<State>,
    parent: CancellationToken,
    execution: Mutex<CancellationToken>,
    /// Held across the Docker calls so concurrent callers never create two networks.
    network: tokio::sync::Mutex<Option<String>>,
    services: ServiceRegistry,
    docker: Arc<dyn DockerEngine>,
    puller: Arc<dyn ImagePuller>,
    migrator: Arc<dyn Migrator>,
    probe: Arc<dyn HealthProbe>,
    health_policy: HealthPolicy,
    watch_git: bool,
    watcher: Mutex<Option<Arc<dyn PathWatcher>>>,
    servers: Mutex<Vec<ServerHandle>>,
    events_tx: mpsc::UnboundedSender<LifecycleEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<LifecycleEvent>>>,
    cleanup_started: AtomicBool,
    /// Set by the first shutdown request; no new run starts after it.
    shutdown_requested: AtomicBool,
}

impl Environment {
    pub fn builder(config: Config, root: impl AsRef<Path>) -> EnvironmentBuilder {
        EnvironmentBuilder::new(config, root.as_ref())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    pub fn paths(&self) -> ProjectPaths {
        self.paths.read().clone()
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.get(name)
    }

    pub fn status(&self) -> Vec<ServiceStatus> {
        self.services
            .snapshot()
            .iter()
            .map(|service| ServiceStatus::from(service.as_ref()))
            .collect()
    }

    pub fn state(&self) -> State {
        *self.state.lock()
    }

    fn set_state(&self, state: State) {
        let mut current = self.state.lock();
        if *current != state {
            tracing::debug!("Environment state: {} -> {}", *current, state);
            *current = state;
        }
    }

    /// True once cleanup has cancelled the environment's lifetime.
    pub fn is_terminated(&self) -> bool {
        self.parent.is_cancelled()
    }

    /// Cancel the current run and hand out a fresh token for the next one.
    ///
    /// Once shutdown was requested the fresh token is already cancelled.
    fn renew_execution(&self) -> CancellationToken {
        let mut current = self.execution.lock();
        current.cancel();
        *current = self.parent.child_token();
        if self.shutdown_requested() {
            current.cancel();
        }
        current.clone()
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Cancel the in-flight run, unless a shutdown is already in progress.
    fn interrupt_execution(&self) {
        let state = self.state();
        if state >= State::Executing && state != State::ShuttingDown {
            tracing::debug!("Interrupting current run (state {})", state);
            self.execution.lock().cancel();
        }
    }

    /// Queue an event for the restart controller.
    ///
    /// Branch changes and shutdown requests interrupt the current run right
    /// away so a long health check does not delay them. A branch change seen
    /// while containers are being stopped is dropped: the restart that follows
    /// reads the checked-out branch afresh.
    pub fn notify(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::ShutdownRequested => {
                self.shutdown_requested.store(true, Ordering::SeqCst);
                self.interrupt_execution();
            }
            LifecycleEvent::BranchChanged if self.state() == State::ShuttingDown => {
                tracing::debug!("Ignoring branch change during shutdown");
                return;
            }
            LifecycleEvent::BranchChanged => self.interrupt_execution(),
            LifecycleEvent::Execute | LifecycleEvent::RefChanged => {}
        }
        if self.events_tx.send(event).is_err() {
            tracing::debug!("Dropped {:?}: restart controller is gone", event);
        }
    }

    fn take_event_receiver(&self) -> Option<mpsc::UnboundedReceiver<LifecycleEvent>> {
        self.events_rx.lock().take()
    }

    /// Connect to Docker, adopt existing containers and arm the git watches.
    pub async fn init(self: &Arc<Self>) -> Result<()> {
        self.set_state(State::Initializing);

        let info = self
            .docker
            .info()
            .await
            .map_err(|e| Error::DockerUnavailable(e.to_string()))?;
        tracing::debug!("Connected to Docker {}", info.server_version);

        let containers = self.get_containers().await?;
        let adopted = self.wrap_containers_as_services(&containers);
        if !adopted.is_empty() {
            tracing::info!("Found existing containers for: {}", adopted.join(", "));
        }

        if self.watch_git {
            self.arm_git_watches()?;
        }

        self.set_state(State::Initialized);
        Ok(())
    }

    /// Containers named with this environment's prefix.
    pub async fn get_containers(&self) -> Result<Vec<ContainerSummary>> {
        let filter = format!("{}_", self.config.prefix);
        Ok(self.docker.list_containers(&filter).await?)
    }

    /// Reconcile container listings into service records.
    pub fn wrap_containers_as_services(&self, containers: &[ContainerSummary]) -> Vec<String> {
        let rules = MappingRules {
            prefix: &self.config.prefix,
            mail_service: &self.config.mail.service,
            smtp_port: self.config.mail.smtp_port,
        };
        wrap_containers_as_services(&self.services, &rules, containers)
    }

    /// Re-read the current branch and re-derive the branch-scoped paths.
    fn refresh_paths(&self) {
        let root = self.paths.read().root.clone();
        let branch = git::current_branch_or_none(&root);
        let paths = ProjectPaths::resolve(&root, &self.config, branch.as_deref());
        tracing::info!(
            "Using data directory {} (branch {})",
            paths.data_dir.display(),
            branch.as_deref().unwrap_or("<detached>")
        );
        *self.paths.write() = paths;
    }

    fn watcher(&self) -> Result<Option<Arc<dyn PathWatcher>>> {
        let mut watcher = self.watcher.lock();
        if watcher.is_none() && !self.cleanup_started() {
            *watcher = Some(Arc::new(FileWatcher::new()?));
        }
        Ok(watcher.clone())
    }

    fn cleanup_started(&self) -> bool {
        self.cleanup_started.load(Ordering::SeqCst)
    }

    fn arm_git_watches(self: &Arc<Self>) -> Result<()> {
        let git_dir = self.paths.read().git_dir.clone();
        if !git_dir.is_dir() {
            tracing::debug!("No git repository at {}; not watching", git_dir.display());
            return Ok(());
        }
        let Some(watcher) = self.watcher()? else {
            return Ok(());
        };

        let head = git::head_path(&git_dir);
        if !watcher.registered(&head) {
            let env = Arc::downgrade(self);
            watcher.register(
                &head,
                Arc::new(move || {
                    if let Some(env) = env.upgrade() {
                        env.notify(LifecycleEvent::BranchChanged);
                    }
                }),
            )?;
        }

        self.arm_remote_watch()
    }

    /// Watch the upstream ref of the current branch, if it has one.
    fn arm_remote_watch(self: &Arc<Self>) -> Result<()> {
        let paths = self.paths();
        let Some(branch) = paths.branch.as_deref() else {
            return Ok(());
        };
        let Some(remote_ref) =
            git::remote_branch_ref(&paths.git_dir, &self.config.git.remote, branch)
        else {
            tracing::debug!(
                "No remote ref for {}/{}; upstream changes are not watched",
                self.config.git.remote,
                branch
            );
            return Ok(());
        };
        let Some(watcher) = self.watcher()? else {
            return Ok(());
        };
        if watcher.registered(&remote_ref) {
            return Ok(());
        }

        let env = Arc::downgrade(self);
        watcher.register(
            &remote_ref,
            Arc::new(move || {
                if let Some(env) = env.upgrade() {
                    env.notify(LifecycleEvent::RefChanged);
                }
            }),
        )
    }
}
