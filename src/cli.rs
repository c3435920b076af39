use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devstack")]
#[command(about = "Run a project's local development stack in Docker")]
pub struct Cli {
    /// Config file path (defaults to devstack.yaml, searched upwards)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project root (defaults to the config file's directory)
    #[arg(short, long)]
    pub workdir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the stack and keep it running until interrupted
    Up {
        /// Do not restart on branch switches or remote ref updates
        #[arg(long)]
        no_watch: bool,
    },
    /// Stop the stack's containers
    Down {
        /// Remove the containers after stopping them
        #[arg(long)]
        purge: bool,

        /// Remove the private network as well
        #[arg(long)]
        remove_network: bool,
    },
    /// Remove stopped containers and unused networks created for this project
    Prune,
    /// Show service status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}
