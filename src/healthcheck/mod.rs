//! Service health probing.
//!
//! [`HealthProbe`] answers "is this service healthy right now"; the polling
//! engine in [`engine`] drives it concurrently for a set of services.

pub mod engine;
pub mod http;

pub use engine::{check_all, HealthPolicy};
pub use http::HttpProbe;

use crate::service::Service;
use async_trait::async_trait;

/// One-shot health probe for a service.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe errors count as unhealthy.
    async fn healthz(&self, service: &Service) -> bool;
}
