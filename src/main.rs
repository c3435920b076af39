mod cli;
mod commands;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use devstack::{Config, Environment, Error as DevstackError, Parser as ConfigParser};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(error) = e.downcast_ref::<DevstackError>() {
            eprintln!("Error: {}", error.with_suggestion());
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    let parser = ConfigParser::new();
    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => parser.find_config_file()?,
    };
    let config = parser.load_config(&config_path)?;
    let work_dir = resolve_work_dir(cli.workdir.clone(), &config_path)?;
    tracing::debug!("Using {} in {}", config_path.display(), work_dir.display());

    let out = output::CliOutput;
    match cli.command {
        Commands::Up { no_watch } => {
            let env = build_environment(config, &work_dir, !no_watch)?;
            commands::run_up(env, &out).await
        }
        Commands::Down {
            purge,
            remove_network,
        } => {
            let env = build_environment(config, &work_dir, false)?;
            commands::run_down(env, purge, remove_network, &out).await
        }
        Commands::Prune => {
            let env = build_environment(config, &work_dir, false)?;
            commands::run_prune(env, &out).await
        }
        Commands::Status { json } => {
            let env = build_environment(config, &work_dir, false)?;
            commands::run_status(env, json, &out).await
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn build_environment(
    config: Config,
    work_dir: &Path,
    watch_git: bool,
) -> anyhow::Result<Arc<Environment>> {
    let watch_git = watch_git && config.git.enabled;
    Ok(Environment::builder(config, work_dir)
        .watch_git(watch_git)
        .build()?)
}

/// Resolve the project root from `--workdir` or the config file's parent directory.
fn resolve_work_dir(workdir: Option<PathBuf>, config_path: &Path) -> anyhow::Result<PathBuf> {
    if let Some(workdir) = workdir {
        return Ok(workdir);
    }
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent.to_path_buf()),
        _ => Ok(std::env::current_dir()?),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
