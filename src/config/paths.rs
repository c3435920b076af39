use super::Config;
use crate::docker::sanitize_name;
use std::path::{Path, PathBuf};

/// Directory under the project root holding per-branch state.
pub const DATA_ROOT: &str = ".nhost";

/// Filesystem locations of one project, resolved for the current branch.
///
/// Re-resolved after a branch switch so that every branch gets its own data
/// directory (and therefore its own database volume).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub nhost_dir: PathBuf,
    pub migrations_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub seeds_dir: PathBuf,
    pub git_dir: PathBuf,
    pub data_dir: PathBuf,
    pub branch: Option<String>,
}

impl ProjectPaths {
    pub fn resolve(root: &Path, config: &Config, branch: Option<&str>) -> Self {
        let nhost_dir = root.join(&config.nhost_dir);
        let database = &config.hasura.database;
        let branch_dir = branch
            .map(sanitize_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "default".to_string());

        Self {
            root: root.to_path_buf(),
            migrations_dir: nhost_dir.join("migrations").join(database),
            metadata_dir: nhost_dir.join("metadata"),
            seeds_dir: nhost_dir.join("seeds").join(database),
            git_dir: root.join(".git"),
            data_dir: root.join(DATA_ROOT).join(branch_dir),
            nhost_dir,
            branch: branch.map(str::to_string),
        }
    }

    /// Exists once the database has been initialised for this branch.
    pub fn first_run_marker(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    pub fn is_first_run(&self) -> bool {
        !self.first_run_marker().exists()
    }

    /// Record that this branch's database is initialised.
    pub fn mark_initialized(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.first_run_marker())
    }
}
