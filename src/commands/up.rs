use crate::output::UserOutput;
use devstack::{Environment, LifecycleEvent, RestartController, ServerHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run_up(env: Arc<Environment>, out: &dyn UserOutput) -> anyhow::Result<()> {
    env.init().await?;

    let signal_env = Arc::downgrade(&env);
    env.register_server(ServerHandle::spawn("signal handler", move |shutdown| {
        forward_signals(signal_env, shutdown)
    }));

    let controller = RestartController::new(Arc::clone(&env))?;
    env.notify(LifecycleEvent::Execute);
    out.status("Starting services... (Press Ctrl+C to stop)");

    controller.run().await?;
    out.success("Environment stopped");
    Ok(())
}

/// Turn the first interrupt into a shutdown request; a second one exits immediately.
async fn forward_signals(env: std::sync::Weak<Environment>, shutdown: CancellationToken) {
    let mut signal_count = 0;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            received = wait_for_signal() => {
                if !received {
                    tracing::warn!("No signal handlers available; stop the process externally");
                    shutdown.cancelled().await;
                    return;
                }
            }
        }

        signal_count += 1;
        if signal_count > 1 {
            eprintln!("\nForce quitting...");
            std::process::exit(130);
        }
        eprintln!("\nStopping services... (Press Ctrl+C again to force quit)");
        match env.upgrade() {
            Some(env) => env.notify(LifecycleEvent::ShutdownRequested),
            None => return,
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let sigint = signal(SignalKind::interrupt());
    let sigterm = signal(SignalKind::terminate());
    match (sigint, sigterm) {
        (Ok(mut sigint), Ok(mut sigterm)) => {
            tokio::select! {
                _ = sigint.recv() => true,
                _ = sigterm.recv() => true,
            }
        }
        (Ok(mut sigint), Err(e)) => {
            tracing::warn!("Failed to create SIGTERM handler: {}", e);
            sigint.recv().await.is_some()
        }
        (Err(e), Ok(mut sigterm)) => {
            tracing::warn!("Failed to create SIGINT handler: {}", e);
            sigterm.recv().await.is_some()
        }
        (Err(e), Err(_)) => {
            tracing::warn!("Failed to create signal handlers: {}", e);
            false
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}
