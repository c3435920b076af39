use crate::output::UserOutput;
use devstack::Environment;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run_down(
    env: Arc<Environment>,
    purge: bool,
    remove_network: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    env.init().await?;

    if purge {
        out.status("Stopping and removing all services...");
    } else {
        out.status("Stopping all services...");
    }
    env.shutdown(purge, &CancellationToken::new()).await?;

    if remove_network {
        if let Err(e) = env.remove_network().await {
            out.warning(&format!("Failed to remove network {}: {}", env.network_name(), e));
        }
    }

    out.success("Services stopped");
    Ok(())
}
