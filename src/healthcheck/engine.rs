//! Concurrent, bounded health polling.
//!
//! Every service with a health path gets its own task that polls until the
//! probe succeeds, the attempt budget runs out, or the token is cancelled.
//! Services without a health path are marked active straight away.

use super::HealthProbe;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::service::Service;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Retry budget for a health check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            attempts: 240,
            interval: Duration::from_secs(1),
        }
    }
}

impl HealthPolicy {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            attempts: config.healthcheck.attempts.max(1),
            interval: config
                .healthcheck
                .interval()
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.interval),
        }
    }

    /// Upper bound on how long one service can be polled.
    pub fn budget(&self) -> Duration {
        self.interval * self.attempts
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Healthy,
    Exhausted,
    Cancelled,
}

/// Poll every service until healthy.
///
/// Returns `Error::HealthCheckFailed` naming every service that exhausted its
/// attempts, or `Error::Cancelled` when the token fired first. Services that
/// became healthy before a failure or cancellation stay active.
pub async fn check_all(
    services: Vec<Arc<Service>>,
    probe: Arc<dyn HealthProbe>,
    policy: HealthPolicy,
    token: &CancellationToken,
) -> Result<()> {
    let mut tasks = JoinSet::new();

    for service in services {
        if service.health_path().is_none() {
            service.activate();
            continue;
        }
        let probe = Arc::clone(&probe);
        let token = token.clone();
        tasks.spawn(async move {
            let outcome = poll_until_healthy(&service, probe.as_ref(), policy, &token).await;
            (service.name().to_string(), outcome)
        });
    }

    let mut failed = Vec::new();
    let mut cancelled = false;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Outcome::Healthy)) => {}
            Ok((name, Outcome::Exhausted)) => failed.push(name),
            Ok((_, Outcome::Cancelled)) => cancelled = true,
            Err(e) => {
                tracing::error!("Health check task panicked: {}", e);
                failed.push("<unknown>".to_string());
            }
        }
    }

    if !failed.is_empty() {
        failed.sort();
        return Err(Error::HealthCheckFailed { services: failed });
    }
    if cancelled {
        return Err(Error::Cancelled("health check".to_string()));
    }
    Ok(())
}

async fn poll_until_healthy(
    service: &Service,
    probe: &dyn HealthProbe,
    policy: HealthPolicy,
    token: &CancellationToken,
) -> Outcome {
    tracing::info!("Waiting for '{}' to become healthy", service.name());

    for attempt in 1..=policy.attempts {
        let healthy = tokio::select! {
            biased;
            _ = token.cancelled() => return Outcome::Cancelled,
            healthy = probe.healthz(service) => healthy,
        };
        if healthy {
            service.activate();
            tracing::info!("Service '{}' is healthy", service.name());
            return Outcome::Healthy;
        }
        tracing::debug!(
            "Health check of '{}' failed (attempt {}/{})",
            service.name(),
            attempt,
            policy.attempts
        );

        if attempt < policy.attempts {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Outcome::Cancelled,
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    tracing::error!(
        "Service '{}' did not become healthy after {} attempts",
        service.name(),
        policy.attempts
    );
    Outcome::Exhausted
}
