use super::Environment;
use crate::error::{Error, Result};
use std::collections::{BTreeSet, HashSet};

impl Environment {
    /// Make sure every required `image:version` is available locally.
    ///
    /// Missing images are pulled one at a time; the first failed pull aborts.
    pub async fn check_images(&self) -> Result<()> {
        let required: BTreeSet<String> = self
            .services
            .snapshot()
            .iter()
            .filter_map(|service| service.image_ref())
            .collect();
        if required.is_empty() {
            return Ok(());
        }

        let available: HashSet<String> = self.docker.list_images().await?.into_iter().collect();

        for image in required.iter().filter(|image| !available.contains(*image)) {
            tracing::info!("Image {} not found locally", image);
            if let Err(e) = self.puller.pull(image).await {
                tracing::error!("Failed to pull image {}", image);
                tracing::info!("Pull it manually with `docker image pull {}`", image);
                return Err(Error::ImagePull {
                    image: image.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }
}
