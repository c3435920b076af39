use super::Environment;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long cleanup waits for a background task after asking it to stop.
const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A background task owned by the environment and stopped during cleanup.
#[derive(Debug)]
pub struct ServerHandle {
    name: String,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Spawn `run` with a token that is cancelled when the environment cleans up.
    pub fn spawn<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run(shutdown.clone()));
        Self {
            name: name.into(),
            shutdown,
            task,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let mut task = self.task;
        match tokio::time::timeout(SERVER_STOP_TIMEOUT, &mut task).await {
            Ok(Ok(())) => tracing::debug!("Stopped {}", self.name),
            Ok(Err(e)) => tracing::warn!("{} ended abnormally: {}", self.name, e),
            Err(_) => {
                tracing::warn!("{} did not stop in time; aborting", self.name);
                task.abort();
            }
        }
    }
}

impl Environment {
    pub fn register_server(&self, server: ServerHandle) {
        tracing::debug!("Registered background task {}", server.name());
        self.servers.lock().push(server);
    }

    pub(super) async fn stop_servers(&self) {
        let servers = std::mem::take(&mut *self.servers.lock());
        futures::future::join_all(servers.into_iter().map(ServerHandle::stop)).await;
    }
}
