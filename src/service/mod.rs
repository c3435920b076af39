//! Named, container-backed service records.
//!
//! A [`Service`] has static fields from configuration and runtime fields
//! discovered from Docker. Runtime fields sit behind a small per-service lock
//! and the active flag is atomic, so health checks, shutdown tasks and the
//! service mapper can touch different services without contending.

mod mapper;
mod registry;

pub use mapper::{wrap_containers_as_services, MappingRules};
pub use registry::ServiceRegistry;

use crate::config::ServiceConfig;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runtime state discovered from Docker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceRuntime {
    pub container_id: Option<String>,
    pub port: Option<u16>,
    pub address: Option<String>,
}

#[derive(Debug)]
pub struct Service {
    name: String,
    image: Option<String>,
    version: String,
    health_path: Option<String>,
    runtime: RwLock<ServiceRuntime>,
    active: AtomicBool,
}

impl Service {
    pub fn from_config(name: &str, config: &ServiceConfig) -> Self {
        Self {
            name: name.to_string(),
            image: config.image.clone(),
            version: config.version.clone(),
            health_path: config.healthcheck.clone(),
            runtime: RwLock::new(ServiceRuntime::default()),
            active: AtomicBool::new(false),
        }
    }

    /// A record for a prefixed container that has no configuration entry.
    pub fn discovered(name: &str) -> Self {
        Self::from_config(name, &ServiceConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// `image:version`, if this service runs from an image.
    pub fn image_ref(&self) -> Option<String> {
        self.image
            .as_ref()
            .map(|image| format!("{}:{}", image, self.version))
    }

    pub fn health_path(&self) -> Option<&str> {
        self.health_path.as_deref()
    }

    pub fn runtime(&self) -> ServiceRuntime {
        self.runtime.read().clone()
    }

    pub fn container_id(&self) -> Option<String> {
        self.runtime.read().container_id.clone()
    }

    pub fn port(&self) -> Option<u16> {
        self.runtime.read().port
    }

    pub fn address(&self) -> Option<String> {
        self.runtime.read().address.clone()
    }

    pub fn set_container_id(&self, id: impl Into<String>) {
        self.runtime.write().container_id = Some(id.into());
    }

    /// Record the published host port; the address is derived from it.
    pub fn set_port(&self, port: u16) {
        let mut runtime = self.runtime.write();
        runtime.port = Some(port);
        runtime.address = Some(format!("http://localhost:{}", port));
    }

    /// Forget everything learned from Docker.
    pub fn reset(&self) {
        *self.runtime.write() = ServiceRuntime::default();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Snapshot of a service for status output.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub image: Option<String>,
    pub active: bool,
    #[serde(flatten)]
    pub runtime: ServiceRuntime,
}

impl From<&Service> for ServiceStatus {
    fn from(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            image: service.image_ref(),
            active: service.is_active(),
            runtime: service.runtime(),
        }
    }
}
