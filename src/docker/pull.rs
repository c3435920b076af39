use super::DockerError;
use async_trait::async_trait;
use std::time::Duration;

/// Pulls an image reference (`image:tag`) into the local Docker cache.
#[async_trait]
pub trait ImagePuller: Send + Sync {
    async fn pull(&self, image: &str) -> Result<(), DockerError>;
}

/// Image pulls can take a while on slow links.
pub const DEFAULT_PULL_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Pulls through `docker image pull`, capturing the combined output.
///
/// On failure the captured output is logged before the error is returned.
#[derive(Debug, Clone)]
pub struct CliImagePuller {
    binary: String,
    timeout: Duration,
}

impl CliImagePuller {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
            timeout: DEFAULT_PULL_TIMEOUT,
        }
    }
}

impl Default for CliImagePuller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImagePuller for CliImagePuller {
    async fn pull(&self, image: &str) -> Result<(), DockerError> {
        let cmd_str = format!("{} image pull {}", self.binary, image);
        tracing::info!("Pulling image {}", image);

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args(["image", "pull", image])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| DockerError::timeout(&cmd_str, self.timeout))?
        .map_err(|e| DockerError::exec_failed(&cmd_str, e))?;

        if output.status.success() {
            return Ok(());
        }

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        tracing::error!("{}", combined.trim_end());
        Err(DockerError::failed(cmd_str, &output))
    }
}
