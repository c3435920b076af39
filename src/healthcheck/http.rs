use super::HealthProbe;
use crate::error::{Error, Result};
use crate::service::Service;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Global shared HTTP client for health probes.
///
/// Every probe reuses one connection pool; the per-request timeout is applied
/// on each request.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn shared_client() -> Result<&'static Client> {
    if let Some(client) = SHARED_HTTP_CLIENT.get() {
        return Ok(client);
    }
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
    Ok(SHARED_HTTP_CLIENT.get_or_init(|| client))
}

/// Probes `GET <address><health path>`; any 2xx status is healthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: shared_client()?.clone(),
            timeout,
        })
    }

    /// Build the probe URL, or `None` when the service has no address or path yet.
    pub fn probe_url(service: &Service) -> Option<url::Url> {
        let address = service.address()?;
        let path = service.health_path()?;
        let url = url::Url::parse(&address).ok()?.join(path).ok()?;
        match url.scheme() {
            "http" | "https" => Some(url),
            _ => None,
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn healthz(&self, service: &Service) -> bool {
        let Some(url) = Self::probe_url(service) else {
            tracing::debug!("Service '{}' has no probe URL yet", service.name());
            return false;
        };

        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!("Health probe for '{}' failed: {}", service.name(), e);
                false
            }
        }
    }
}
