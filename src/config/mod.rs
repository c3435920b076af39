//! Configuration parsing and types.
//!
//! - `types` - Root config structure (`Config`) and its sections
//! - `service` - Per-service configuration (`ServiceConfig`)
//! - `paths` - Project directory layout resolved for a branch (`ProjectPaths`)
//! - `materialize` - `ServiceConfig` to `ContainerSpec`
//! - `parser` - YAML config discovery and parsing
//! - `validation` - Config sanity checks

mod duration;
mod materialize;
mod parser;
mod paths;
mod service;
mod types;
mod validation;

pub use duration::*;
pub use materialize::*;
pub use parser::*;
pub use paths::*;
pub use service::*;
pub use types::*;
