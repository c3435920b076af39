use super::{Endpoint, Migrator};
use crate::config::HasuraConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SEED_TIMEOUT: Duration = Duration::from_secs(120);

/// Hasura CLI plus the HTTP query API.
pub struct HasuraClient {
    cli: String,
    database: String,
    /// The CLI runs here so it picks up `config.yaml`, migrations and metadata.
    working_dir: PathBuf,
    endpoint: RwLock<Option<Endpoint>>,
    http: reqwest::Client,
}

impl HasuraClient {
    pub fn new(config: &HasuraConfig, working_dir: PathBuf) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(SEED_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            cli: config.cli.clone(),
            database: config.database.clone(),
            working_dir,
            endpoint: RwLock::new(None),
            http,
        })
    }

    fn endpoint(&self) -> Result<Endpoint> {
        self.endpoint.read().clone().ok_or_else(|| {
            Error::Config("Hasura endpoint is not known yet; is the service running?".to_string())
        })
    }

    /// Full argument list for one CLI step.
    fn cli_args(&self, step: &[&str], endpoint: &Endpoint) -> Vec<String> {
        let mut args: Vec<String> = step.iter().map(|s| s.to_string()).collect();
        if step.first() == Some(&"migrate") {
            args.push("--database-name".to_string());
            args.push(self.database.clone());
        }
        args.extend([
            "--endpoint".to_string(),
            endpoint.url.clone(),
            "--admin-secret".to_string(),
            endpoint.admin_secret.clone(),
            "--skip-update-check".to_string(),
        ]);
        args
    }

    async fn run_cli(&self, step: &[&str], token: &CancellationToken) -> Result<()> {
        let endpoint = self.endpoint()?;
        let args = self.cli_args(step, &endpoint);
        let label = step.join(" ");
        tracing::debug!("Running {} {}", self.cli, label);

        let command = tokio::process::Command::new(&self.cli)
            .args(&args)
            .current_dir(&self.working_dir)
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled(label)),
            output = command => output.map_err(|e| Error::Migration {
                step: label.clone(),
                output: format!("failed to execute {}: {}", self.cli, e),
            })?,
        };

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::error!("{}", combined.trim_end());
        Err(Error::Migration {
            step: label,
            output: combined,
        })
    }
}

#[async_trait]
impl Migrator for HasuraClient {
    fn configure(&self, endpoint: Endpoint) {
        *self.endpoint.write() = Some(endpoint);
    }

    async fn apply_migrations(&self, token: &CancellationToken) -> Result<()> {
        tracing::debug!("Applying migrations");
        self.run_cli(&["migrate", "apply"], token).await
    }

    async fn export_metadata(&self, token: &CancellationToken) -> Result<()> {
        tracing::debug!("Exporting metadata");
        self.run_cli(&["metadata", "export"], token).await
    }

    async fn apply_metadata(&self, token: &CancellationToken) -> Result<()> {
        tracing::debug!("Applying metadata");
        self.run_cli(&["metadata", "apply"], token).await
    }

    async fn seed(&self, file: &str, sql: &str) -> Result<()> {
        let endpoint = self.endpoint()?;
        let url = format!("{}/v2/query", endpoint.url.trim_end_matches('/'));
        let body = json!({
            "type": "run_sql",
            "args": {
                "source": self.database,
                "sql": sql,
            }
        });

        let response = self
            .http
            .post(&url)
            .header("X-Hasura-Admin-Secret", &endpoint.admin_secret)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Seed {
                file: file.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Seed {
                file: file.to_string(),
                reason: format!("{}: {}", status, text.trim()),
            });
        }
        Ok(())
    }
}
