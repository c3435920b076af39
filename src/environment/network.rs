use super::Environment;
use crate::error::{Error, Result};
use std::collections::HashSet;

impl Environment {
    /// The private network is named after the environment prefix.
    pub fn network_name(&self) -> &str {
        &self.config.prefix
    }

    /// ID of the environment's network, once prepared.
    pub async fn network(&self) -> Option<String> {
        self.network.lock().await.clone()
    }

    /// Look the network up by name; an exact name match wins over the first hit.
    pub async fn get_network(&self) -> Result<Option<String>> {
        let name = self.network_name();
        let networks = self.docker.list_networks(name).await?;
        Ok(networks
            .iter()
            .find(|network| network.name == name)
            .or_else(|| networks.first())
            .map(|network| network.id.clone()))
    }

    /// Return the network ID, adopting an existing network or creating one.
    pub async fn prepare_network(&self) -> Result<String> {
        let mut network = self.network.lock().await;
        if let Some(id) = network.as_ref() {
            return Ok(id.clone());
        }

        let id = match self.get_network().await? {
            Some(id) => {
                tracing::debug!("Using existing network {}", self.network_name());
                id
            }
            None => {
                tracing::debug!("Creating network {}", self.network_name());
                self.docker
                    .create_network(self.network_name(), &self.config.prefix)
                    .await
                    .map_err(|e| Error::Network {
                        name: self.network_name().to_string(),
                        reason: e.to_string(),
                    })?
            }
        };

        *network = Some(id.clone());
        Ok(id)
    }

    /// Remove the network if it exists.
    pub async fn remove_network(&self) -> Result<()> {
        let mut network = self.network.lock().await;
        let id = match network.clone() {
            Some(id) => id,
            None => match self.get_network().await? {
                Some(id) => id,
                None => return Ok(()),
            },
        };

        tracing::debug!("Removing network {}", self.network_name());
        self.docker.remove_network(&id).await?;
        *network = None;
        Ok(())
    }

    /// Remove unused networks created by this environment.
    pub async fn prune_networks(&self) -> Result<()> {
        let mut network = self.network.lock().await;
        self.docker.prune_networks(&self.config.prefix).await?;
        // Re-adopted by the next prepare_network if it survived the prune
        *network = None;
        Ok(())
    }

    /// Remove stopped containers created by this environment.
    pub async fn prune_containers(&self) -> Result<()> {
        self.docker.prune_containers(&self.config.prefix).await?;

        let remaining: HashSet<String> = self
            .get_containers()
            .await?
            .into_iter()
            .map(|container| container.id)
            .collect();
        for service in self.services.snapshot() {
            if let Some(id) = service.container_id() {
                if !remaining.contains(&id) {
                    service.deactivate();
                    service.reset();
                }
            }
        }
        Ok(())
    }
}
