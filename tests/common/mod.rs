//! In-memory doubles for the environment's capabilities.
#![allow(dead_code)]

use async_trait::async_trait;
use devstack::config::{Config, ServiceConfig};
use devstack::docker::{
    ContainerSpec, ContainerSummary, DaemonInfo, DockerEngine, DockerError, ImagePuller,
    NetworkSummary, PortMapping,
};
use devstack::hasura::{Endpoint, Migrator};
use devstack::healthcheck::HealthProbe;
use devstack::service::Service;
use devstack::watch::{PathWatcher, WatchCallback};
use devstack::{Environment, Error, Result};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub ports: Vec<PortMapping>,
}

#[derive(Default)]
struct DockerState {
    containers: BTreeMap<String, MockContainer>,
    networks: Vec<NetworkSummary>,
    images: HashSet<String>,
    next_id: usize,
}

/// A Docker engine that keeps containers and networks in memory.
#[derive(Default)]
pub struct MockDocker {
    state: Mutex<DockerState>,
    unavailable: AtomicBool,
    fail_start: Mutex<HashSet<String>>,
    fail_stop: Mutex<HashSet<String>>,
    network_delay: Mutex<Option<Duration>>,
    stop_delay: Mutex<Option<Duration>>,
    pub network_creates: AtomicUsize,
    pub creates: AtomicUsize,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub removes: AtomicUsize,
}

impl MockDocker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self) {
        self.unavailable.store(true, Ordering::SeqCst);
    }

    /// Fail `start_container` for the container with this name.
    pub fn fail_start(&self, container_name: &str) {
        self.fail_start.lock().insert(container_name.to_string());
    }

    /// Fail `stop_container` for the container with this name.
    pub fn fail_stop(&self, container_name: &str) {
        self.fail_stop.lock().insert(container_name.to_string());
    }

    pub fn delay_network_calls(&self, delay: Duration) {
        *self.network_delay.lock() = Some(delay);
    }

    /// Make every `stop_container` take this long, like a container ignoring SIGTERM.
    pub fn delay_stops(&self, delay: Duration) {
        *self.stop_delay.lock() = Some(delay);
    }

    pub fn add_image(&self, image: &str) {
        self.state.lock().images.insert(image.to_string());
    }

    /// Seed a running container, as left behind by an earlier run.
    pub fn add_container(&self, name: &str, image: &str, state: &str, public_port: Option<u16>) -> String {
        let mut docker = self.state.lock();
        docker.next_id += 1;
        let id = format!("{:012x}", docker.next_id);
        let ports = public_port
            .map(|port| {
                vec![PortMapping {
                    ip: "0.0.0.0".to_string(),
                    private_port: port,
                    public_port: port,
                    protocol: "tcp".to_string(),
                }]
            })
            .unwrap_or_default();
        docker.containers.insert(
            id.clone(),
            MockContainer {
                id: id.clone(),
                name: name.to_string(),
                image: image.to_string(),
                state: state.to_string(),
                ports,
            },
        );
        id
    }

    pub fn add_network(&self, name: &str) -> String {
        let mut docker = self.state.lock();
        docker.next_id += 1;
        let id = format!("net{}", docker.next_id);
        docker.networks.push(NetworkSummary {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    pub fn container(&self, name: &str) -> Option<MockContainer> {
        self.state
            .lock()
            .containers
            .values()
            .find(|container| container.name == name)
            .cloned()
    }

    pub fn container_count(&self) -> usize {
        self.state.lock().containers.len()
    }

    pub fn network_count(&self) -> usize {
        self.state.lock().networks.len()
    }

    fn check_available(&self) -> std::result::Result<(), DockerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DockerError::DaemonUnavailable)
        } else {
            Ok(())
        }
    }

    async fn network_pause(&self) {
        let delay = *self.network_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn name_of(&self, id: &str) -> std::result::Result<String, DockerError> {
        self.state
            .lock()
            .containers
            .get(id)
            .map(|container| container.name.clone())
            .ok_or_else(|| DockerError::ContainerNotFound {
                container: id.to_string(),
            })
    }

    fn set_container_state(&self, id: &str, state: &str) -> std::result::Result<(), DockerError> {
        let mut docker = self.state.lock();
        let container = docker
            .containers
            .get_mut(id)
            .ok_or_else(|| DockerError::ContainerNotFound {
                container: id.to_string(),
            })?;
        container.state = state.to_string();
        Ok(())
    }
}

#[async_trait]
impl DockerEngine for MockDocker {
    async fn info(&self) -> std::result::Result<DaemonInfo, DockerError> {
        self.check_available()?;
        Ok(DaemonInfo {
            server_version: "27.0.0-mock".to_string(),
        })
    }

    async fn list_containers(
        &self,
        name_filter: &str,
    ) -> std::result::Result<Vec<ContainerSummary>, DockerError> {
        self.check_available()?;
        Ok(self
            .state
            .lock()
            .containers
            .values()
            .filter(|container| container.name.contains(name_filter))
            .map(|container| ContainerSummary {
                id: container.id.clone(),
                names: vec![format!("/{}", container.name)],
                image: container.image.clone(),
                state: container.state.clone(),
                ports: container.ports.clone(),
            })
            .collect())
    }

    async fn create_container(
        &self,
        spec: &ContainerSpec,
        _network: &str,
    ) -> std::result::Result<String, DockerError> {
        self.check_available()?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        let mut docker = self.state.lock();
        docker.next_id += 1;
        let id = format!("{:012x}", docker.next_id);
        let ports = spec
            .ports
            .iter()
            .map(|binding| PortMapping {
                ip: "0.0.0.0".to_string(),
                private_port: binding.container,
                public_port: binding.host,
                protocol: "tcp".to_string(),
            })
            .collect();
        docker.containers.insert(
            id.clone(),
            MockContainer {
                id: id.clone(),
                name: spec.name.clone(),
                image: spec.image.clone(),
                state: "created".to_string(),
                ports,
            },
        );
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> std::result::Result<(), DockerError> {
        self.check_available()?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        let name = self.name_of(id)?;
        if self.fail_start.lock().contains(&name) {
            return Err(DockerError::cmd_failed(
                format!("docker start {}", id),
                "port is already allocated",
                Some(1),
            ));
        }
        self.set_container_state(id, "running")
    }

    async fn stop_container(&self, id: &str) -> std::result::Result<(), DockerError> {
        self.check_available()?;
        self.stops.fetch_add(1, Ordering::SeqCst);
        let delay = *self.stop_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let name = self.name_of(id)?;
        if self.fail_stop.lock().contains(&name) {
            return Err(DockerError::cmd_failed(
                format!("docker stop {}", id),
                "permission denied",
                Some(1),
            ));
        }
        self.set_container_state(id, "exited")
    }

    async fn remove_container(&self, id: &str) -> std::result::Result<(), DockerError> {
        self.check_available()?;
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DockerError::ContainerNotFound {
                container: id.to_string(),
            })
    }

    async fn prune_containers(&self, prefix: &str) -> std::result::Result<(), DockerError> {
        self.check_available()?;
        let owned = format!("{}_", prefix);
        self.state
            .lock()
            .containers
            .retain(|_, container| !(container.name.starts_with(&owned) && container.state != "running"));
        Ok(())
    }

    async fn list_networks(
        &self,
        name_filter: &str,
    ) -> std::result::Result<Vec<NetworkSummary>, DockerError> {
        self.check_available()?;
        self.network_pause().await;
        Ok(self
            .state
            .lock()
            .networks
            .iter()
            .filter(|network| network.name.contains(name_filter))
            .cloned()
            .collect())
    }

    async fn create_network(&self, name: &str, _prefix: &str) -> std::result::Result<String, DockerError> {
        self.check_available()?;
        self.network_pause().await;
        self.network_creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.add_network(name))
    }

    async fn remove_network(&self, id: &str) -> std::result::Result<(), DockerError> {
        self.check_available()?;
        self.state.lock().networks.retain(|network| network.id != id);
        Ok(())
    }

    async fn prune_networks(&self, prefix: &str) -> std::result::Result<(), DockerError> {
        self.check_available()?;
        let mut docker = self.state.lock();
        let in_use = docker
            .containers
            .values()
            .any(|container| container.state == "running");
        if !in_use {
            docker.networks.retain(|network| network.name != prefix);
        }
        Ok(())
    }

    async fn list_images(&self) -> std::result::Result<Vec<String>, DockerError> {
        self.check_available()?;
        Ok(self.state.lock().images.iter().cloned().collect())
    }
}

/// Records pulls and "downloads" the image into the mock engine.
pub struct MockPuller {
    docker: Arc<MockDocker>,
    failing: Mutex<HashSet<String>>,
    pub pulled: Mutex<Vec<String>>,
}

impl MockPuller {
    pub fn new(docker: Arc<MockDocker>) -> Arc<Self> {
        Arc::new(Self {
            docker,
            failing: Mutex::new(HashSet::new()),
            pulled: Mutex::new(Vec::new()),
        })
    }

    pub fn fail(&self, image: &str) {
        self.failing.lock().insert(image.to_string());
    }
}

#[async_trait]
impl ImagePuller for MockPuller {
    async fn pull(&self, image: &str) -> std::result::Result<(), DockerError> {
        self.pulled.lock().push(image.to_string());
        if self.failing.lock().contains(image) {
            return Err(DockerError::cmd_failed(
                format!("docker image pull {}", image),
                "manifest unknown",
                Some(1),
            ));
        }
        self.docker.add_image(image);
        Ok(())
    }
}

/// Counts migration steps and seeds.
#[derive(Default)]
pub struct MockMigrator {
    pub endpoint: Mutex<Option<Endpoint>>,
    pub migration_attempts: AtomicUsize,
    pub migrations: AtomicUsize,
    pub exports: AtomicUsize,
    pub metadata_applies: AtomicUsize,
    pub seeds: Mutex<Vec<String>>,
    fail_seed: AtomicBool,
    fail_migrations: AtomicBool,
}

impl MockMigrator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_seeds(&self) {
        self.fail_seed.store(true, Ordering::SeqCst);
    }

    pub fn fail_migrations(&self) {
        self.fail_migrations.store(true, Ordering::SeqCst);
    }

    /// Number of completed migrate-and-metadata passes.
    pub fn prepares(&self) -> usize {
        self.metadata_applies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Migrator for MockMigrator {
    fn configure(&self, endpoint: Endpoint) {
        *self.endpoint.lock() = Some(endpoint);
    }

    async fn apply_migrations(&self, _token: &CancellationToken) -> Result<()> {
        self.migration_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_migrations.load(Ordering::SeqCst) {
            return Err(Error::Migration {
                step: "apply migrations".to_string(),
                output: "relation already exists".to_string(),
            });
        }
        self.migrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn export_metadata(&self, _token: &CancellationToken) -> Result<()> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn apply_metadata(&self, _token: &CancellationToken) -> Result<()> {
        self.metadata_applies.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn seed(&self, file: &str, _sql: &str) -> Result<()> {
        if self.fail_seed.load(Ordering::SeqCst) {
            return Err(Error::Seed {
                file: file.to_string(),
                reason: "syntax error at or near \"selec\"".to_string(),
            });
        }
        self.seeds.lock().push(file.to_string());
        Ok(())
    }
}

/// Health probe whose answer per service is set by the test.
#[derive(Default)]
pub struct ScriptedProbe {
    healthy: Mutex<HashSet<String>>,
    pub probes: Mutex<HashMap<String, usize>>,
}

impl ScriptedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all_healthy(names: &[&str]) -> Arc<Self> {
        let probe = Self::new();
        for name in names {
            probe.set_healthy(name);
        }
        probe
    }

    pub fn set_healthy(&self, name: &str) {
        self.healthy.lock().insert(name.to_string());
    }

    pub fn set_unhealthy(&self, name: &str) {
        self.healthy.lock().remove(name);
    }

    pub fn probe_count(&self, name: &str) -> usize {
        self.probes.lock().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn healthz(&self, service: &Service) -> bool {
        *self
            .probes
            .lock()
            .entry(service.name().to_string())
            .or_default() += 1;
        self.healthy.lock().contains(service.name())
    }
}

/// Path watcher that only fires when the test says so.
#[derive(Default)]
pub struct RecordingWatcher {
    callbacks: Mutex<HashMap<PathBuf, WatchCallback>>,
    closed: AtomicBool,
}

impl RecordingWatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.callbacks.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Run the callback registered for `path`, as a filesystem event would.
    pub fn trigger(&self, path: &Path) -> bool {
        let callback = self.callbacks.lock().get(path).cloned();
        match callback {
            Some(callback) if !self.is_closed() => {
                callback();
                true
            }
            _ => false,
        }
    }
}

impl PathWatcher for RecordingWatcher {
    fn register(&self, path: &Path, on_change: WatchCallback) -> Result<()> {
        self.callbacks.lock().insert(path.to_path_buf(), on_change);
        Ok(())
    }

    fn registered(&self, path: &Path) -> bool {
        self.callbacks.lock().contains_key(path)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub fn service(image: &str, port: Option<u16>, healthcheck: Option<&str>) -> ServiceConfig {
    ServiceConfig {
        image: Some(image.to_string()),
        port,
        healthcheck: healthcheck.map(str::to_string),
        ..Default::default()
    }
}

/// `db` with a health endpoint, `api` without one, and the hasura engine.
pub fn sample_config() -> Config {
    let mut config = Config::default();
    config.healthcheck.attempts = 5;
    config.healthcheck.interval = "1s".to_string();
    config
        .services
        .insert("db".to_string(), service("postgres", Some(5432), Some("/healthz")));
    config
        .services
        .insert("api".to_string(), service("api", Some(3000), None));
    config.services.insert(
        "hasura".to_string(),
        service("hasura/graphql-engine", Some(8080), Some("/healthz")),
    );
    config
}

pub struct Harness {
    pub env: Arc<Environment>,
    pub docker: Arc<MockDocker>,
    pub puller: Arc<MockPuller>,
    pub migrator: Arc<MockMigrator>,
    pub probe: Arc<ScriptedProbe>,
    pub watcher: Arc<RecordingWatcher>,
}

pub fn harness(config: Config, root: &Path, probe: Arc<ScriptedProbe>, watch_git: bool) -> Harness {
    let docker = MockDocker::new();
    let puller = MockPuller::new(docker.clone());
    let migrator = MockMigrator::new();
    let watcher = RecordingWatcher::new();
    let env = Environment::builder(config, root)
        .docker(docker.clone())
        .image_puller(puller.clone())
        .migrator(migrator.clone())
        .health_probe(probe.clone())
        .watcher(watcher.clone())
        .watch_git(watch_git)
        .build()
        .expect("environment builds");
    Harness {
        env,
        docker,
        puller,
        migrator,
        probe,
        watcher,
    }
}

/// Lay out the nhost directory with one migration, metadata and seeds.
pub fn write_project(root: &Path, seeds: &[&str]) {
    let nhost = root.join("nhost");
    std::fs::create_dir_all(nhost.join("migrations/default/1_init")).unwrap();
    std::fs::write(nhost.join("migrations/default/1_init/up.sql"), "create table t();").unwrap();
    std::fs::create_dir_all(nhost.join("metadata")).unwrap();
    std::fs::write(nhost.join("metadata/version.yaml"), "version: 3").unwrap();
    std::fs::create_dir_all(nhost.join("seeds/default")).unwrap();
    for seed in seeds {
        std::fs::write(nhost.join("seeds/default").join(seed), "select 1;").unwrap();
    }
}
