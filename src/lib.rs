//! # devstack
//!
//! Runs a project's local development stack: Docker containers on a private
//! network, health checks, Hasura migrations/metadata and seeds, and a
//! restart loop driven by git branch switches and remote ref updates.
//!
//! ## Quick Start
//!
//! ```no_run
//! use devstack::{Environment, LifecycleEvent, Parser, RestartController};
//!
//! # async fn example() -> Result<(), devstack::Error> {
//! let config = Parser::new().load_config("devstack.yaml")?;
//! let env = Environment::builder(config, ".").build()?;
//!
//! // Connect to Docker and adopt containers left by a previous run
//! env.init().await?;
//!
//! // Queue the first run; the controller serializes every later transition
//! let controller = RestartController::new(env.clone())?;
//! env.notify(LifecycleEvent::Execute);
//! controller.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! - Health checks and shutdown fan out one task per service
//! - A new run cancels the previous one before it starts
//! - Watch callbacks and signals only queue events; one controller consumes them
//! - Cleanup runs exactly once even with concurrent calls

pub mod config;
pub mod docker;
pub mod environment;
pub mod error;
pub mod git;
pub mod hasura;
pub mod healthcheck;
pub mod service;
pub mod watch;

// Re-export commonly used types
pub use config::{Config, Parser};
pub use environment::{
    Environment, EnvironmentBuilder, LifecycleEvent, RestartController, ServerHandle, State,
};
pub use error::{Error, Result};
