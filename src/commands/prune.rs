use crate::output::UserOutput;
use devstack::Environment;
use std::sync::Arc;

pub async fn run_prune(env: Arc<Environment>, out: &dyn UserOutput) -> anyhow::Result<()> {
    env.init().await?;

    out.status(&format!("Pruning stopped {} containers...", env.prefix()));
    env.prune_containers().await?;

    out.status(&format!("Pruning unused {} networks...", env.prefix()));
    env.prune_networks().await?;

    out.success("Prune complete");
    Ok(())
}
