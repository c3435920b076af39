//! Serializes lifecycle transitions.
//!
//! Watch callbacks and signal handlers only queue events; the controller is
//! the single consumer, so two transitions never run at the same time.
//! Events that pile up while a transition runs are coalesced and only the
//! most significant one is acted on.

use super::{Environment, State};
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Bring the environment up.
    Execute,
    /// The checked-out branch changed.
    BranchChanged,
    /// The current branch's remote ref moved.
    RefChanged,
    /// Tear everything down and stop.
    ShutdownRequested,
}

impl LifecycleEvent {
    fn priority(self) -> u8 {
        match self {
            LifecycleEvent::ShutdownRequested => 3,
            LifecycleEvent::BranchChanged => 2,
            LifecycleEvent::Execute => 1,
            LifecycleEvent::RefChanged => 0,
        }
    }
}

/// Pick the event to act on from a burst; ties keep the earliest.
fn coalesce(events: impl IntoIterator<Item = LifecycleEvent>) -> Option<LifecycleEvent> {
    events.into_iter().fold(None, |picked, event| match picked {
        Some(current) if current.priority() >= event.priority() => Some(current),
        _ => Some(event),
    })
}

pub struct RestartController {
    env: Arc<Environment>,
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
}

impl RestartController {
    /// Attach to the environment's event queue. Only one controller may exist.
    pub fn new(env: Arc<Environment>) -> Result<Self> {
        let events = env
            .take_event_receiver()
            .ok_or_else(|| Error::Config("A restart controller is already running".into()))?;
        Ok(Self { env, events })
    }

    /// Consume events until shutdown or a fatal failure.
    ///
    /// Fatal failures clean the environment up before they are returned.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let first = tokio::select! {
                biased;
                _ = self.env.parent.cancelled() => return Ok(()),
                event = self.events.recv() => event,
            };
            let Some(first) = first else {
                return Ok(());
            };

            let mut burst = vec![first];
            while let Ok(event) = self.events.try_recv() {
                burst.push(event);
            }
            let Some(event) = coalesce(burst) else {
                continue;
            };
            tracing::debug!("Handling {:?}", event);

            match event {
                LifecycleEvent::Execute => self.handle_execute().await?,
                LifecycleEvent::BranchChanged => self.restart_after_checkout().await?,
                LifecycleEvent::RefChanged => self.restart_migrations().await,
                LifecycleEvent::ShutdownRequested => {
                    self.env.cleanup().await;
                    return Ok(());
                }
            }
        }
    }

    async fn handle_execute(&self) -> Result<()> {
        if self.env.shutdown_requested() {
            tracing::debug!("Shutdown pending; not starting a new run");
            return Ok(());
        }
        match self.env.execute().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Run interrupted: {}", e);
                Ok(())
            }
            Err(e) => self.fail(e).await,
        }
    }

    /// Stop and remove the containers of the old branch, then come back up
    /// against the new branch's data directory.
    ///
    /// A shutdown request arriving meanwhile ends the restart early; the
    /// queued request is then handled by the next loop iteration.
    async fn restart_after_checkout(&self) -> Result<()> {
        if self.env.shutdown_requested() {
            return Ok(());
        }
        tracing::warn!("Git branch changed, restarting the environment");

        self.env.interrupt_execution();
        let token = self.env.renew_execution();

        for purge in [false, true] {
            match self.env.shutdown(purge, &token).await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() && self.env.shutdown_requested() => {
                    tracing::debug!("Restart interrupted by shutdown: {}", e);
                    return Ok(());
                }
                Err(e) => return self.fail(e).await,
            }
        }

        self.env.refresh_paths();
        if let Err(e) = self.env.arm_remote_watch() {
            tracing::error!("Failed to watch the remote ref: {}", e);
        }

        self.handle_execute().await
    }

    /// Re-apply migrations and metadata after the remote ref moved.
    async fn restart_migrations(&self) {
        if self.env.state() != State::Active {
            tracing::debug!("Ignoring remote ref change in state {}", self.env.state());
            return;
        }
        tracing::info!("Remote ref changed, applying migrations and metadata");

        let token = self.env.renew_execution();
        let _guard = token.clone().drop_guard();
        if let Err(e) = self.env.prepare(&token).await {
            tracing::error!("Failed to apply migrations and metadata: {}", e);
        }
    }

    async fn fail(&self, error: Error) -> Result<()> {
        tracing::error!("{}", error);
        self.env.cleanup().await;
        Err(error)
    }
}
