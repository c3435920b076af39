use super::Config;
use crate::error::{Error, Result};

impl Config {
    /// Basic sanity checks. Deeper schema validation is left to the services.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty()
            || !self
                .prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::Validation(format!(
                "prefix '{}' must be non-empty and contain only letters, digits, '-' or '_'",
                self.prefix
            )));
        }

        if self.healthcheck.attempts == 0 {
            return Err(Error::Validation(
                "healthcheck.attempts must be at least 1".to_string(),
            ));
        }
        match self.healthcheck.interval() {
            Some(interval) if !interval.is_zero() => {}
            _ => {
                return Err(Error::Validation(format!(
                    "healthcheck.interval '{}' is not a positive duration",
                    self.healthcheck.interval
                )))
            }
        }
        if self.healthcheck.timeout().is_none() {
            return Err(Error::Validation(format!(
                "healthcheck.timeout '{}' is not a duration",
                self.healthcheck.timeout
            )));
        }
        if self.docker.timeout().is_none() {
            return Err(Error::Validation(format!(
                "docker.timeout '{}' is not a duration",
                self.docker.timeout
            )));
        }

        for (name, service) in &self.services {
            if name.is_empty() || name.contains('/') {
                return Err(Error::Validation(format!(
                    "invalid service name '{}'",
                    name
                )));
            }
            if let Some(path) = &service.healthcheck {
                if !path.starts_with('/') {
                    return Err(Error::Validation(format!(
                        "service '{}': healthcheck path '{}' must start with '/'",
                        name, path
                    )));
                }
            }
            if service.healthcheck.is_some() && service.image.is_none() {
                return Err(Error::Validation(format!(
                    "service '{}': healthcheck requires image",
                    name
                )));
            }
            if service.container_port.is_some() && service.port.is_none() {
                return Err(Error::Validation(format!(
                    "service '{}': container_port requires port",
                    name
                )));
            }
        }

        Ok(())
    }
}
