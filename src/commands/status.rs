use crate::output::UserOutput;
use devstack::Environment;
use std::sync::Arc;

pub async fn run_status(env: Arc<Environment>, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    env.init().await?;
    let status = env.status();

    if json {
        out.status(&serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    out.status(&format!("Environment: {}", env.prefix()));
    out.status(&format!("{:-<72}", ""));
    if status.is_empty() {
        out.status("  No services configured");
        return Ok(());
    }

    for service in status {
        let icon = if service.runtime.container_id.is_some() {
            "+"
        } else {
            "o"
        };
        let container = service
            .runtime
            .container_id
            .as_deref()
            .map(|id| &id[..id.len().min(12)])
            .unwrap_or("-");
        out.status(&format!(
            "  {} {:<20} {:<14} {}",
            icon,
            service.name,
            container,
            service.runtime.address.as_deref().unwrap_or("-")
        ));
    }
    Ok(())
}
