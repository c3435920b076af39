use super::Service;
use crate::config::Config;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name-indexed set of services owned by an environment.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: RwLock<BTreeMap<String, Arc<Service>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One record per configured service.
    pub fn from_config(config: &Config) -> Self {
        let services = config
            .services
            .iter()
            .map(|(name, service)| (name.clone(), Arc::new(Service::from_config(name, service))))
            .collect();
        Self {
            services: RwLock::new(services),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Service>> {
        self.services.read().get(name).cloned()
    }

    /// Existing record, or a new discovered one.
    pub fn get_or_discover(&self, name: &str) -> Arc<Service> {
        if let Some(service) = self.get(name) {
            return service;
        }
        self.services
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Service::discovered(name)))
            .clone()
    }

    /// Point-in-time list of every service, in name order.
    pub fn snapshot(&self) -> Vec<Arc<Service>> {
        self.services.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}
