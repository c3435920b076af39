//! Migrations, metadata and seeds through Hasura.
//!
//! [`Migrator`] is the capability the environment needs; [`HasuraClient`]
//! drives the Hasura CLI for migrations/metadata and the `/v2/query` endpoint
//! for seeds.

mod client;

pub use client::HasuraClient;

use crate::error::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Where the migration tool talks to once the engine is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: String,
    pub admin_secret: String,
}

#[async_trait]
pub trait Migrator: Send + Sync {
    /// Point the client at a running engine. Called before every `prepare`.
    fn configure(&self, endpoint: Endpoint);

    /// `migrate apply` for the configured database.
    async fn apply_migrations(&self, token: &CancellationToken) -> Result<()>;

    /// `metadata export` into the metadata directory.
    async fn export_metadata(&self, token: &CancellationToken) -> Result<()>;

    /// `metadata apply` from the metadata directory.
    async fn apply_metadata(&self, token: &CancellationToken) -> Result<()>;

    /// Run one SQL seed file; `file` is used for error context.
    async fn seed(&self, file: &str, sql: &str) -> Result<()>;
}
