//! Turns service configuration into container specifications.

use super::{Config, ProjectPaths, ServiceConfig};
use crate::docker::{ContainerSpec, PortBinding, PREFIX_LABEL, SERVICE_LABEL};
use std::collections::BTreeMap;
use std::path::Path;

/// Container name for a service: `<prefix>_<service>`.
pub fn container_name(prefix: &str, service: &str) -> String {
    format!("{}_{}", prefix, service)
}

/// Build a [`ContainerSpec`] for every service that declares an image.
///
/// `{project}`, `{nhost}`, `{data}` and `{network}` placeholders in
/// environment values, volumes and commands are expanded. Relative bind-mount
/// sources (`./` or `../`) are resolved against the project root.
pub fn materialize(config: &Config, paths: &ProjectPaths) -> BTreeMap<String, ContainerSpec> {
    config
        .services
        .iter()
        .filter_map(|(name, service)| {
            materialize_service(config, paths, name, service).map(|spec| (name.clone(), spec))
        })
        .collect()
}

fn materialize_service(
    config: &Config,
    paths: &ProjectPaths,
    name: &str,
    service: &ServiceConfig,
) -> Option<ContainerSpec> {
    let image = service.image_ref()?;
    let expand = |value: &str| expand_placeholders(value, config, paths);

    let env = service
        .environment
        .iter()
        .map(|(key, value)| (key.clone(), expand(value)))
        .collect();

    let ports = service
        .port
        .map(|host| PortBinding {
            host,
            container: service.container_port.unwrap_or(host),
        })
        .into_iter()
        .collect();

    let volumes = service
        .volumes
        .iter()
        .map(|volume| resolve_volume(&expand(volume), &paths.root))
        .collect();

    let mut labels = BTreeMap::new();
    labels.insert(PREFIX_LABEL.to_string(), config.prefix.clone());
    labels.insert(SERVICE_LABEL.to_string(), name.to_string());

    Some(ContainerSpec {
        name: container_name(&config.prefix, name),
        image,
        env,
        ports,
        volumes,
        command: service.command.iter().map(|arg| expand(arg)).collect(),
        labels,
        aliases: vec![name.to_string()],
    })
}

fn expand_placeholders(value: &str, config: &Config, paths: &ProjectPaths) -> String {
    value
        .replace("{project}", &paths.root.to_string_lossy())
        .replace("{nhost}", &paths.nhost_dir.to_string_lossy())
        .replace("{data}", &paths.data_dir.to_string_lossy())
        .replace("{network}", &config.prefix)
}

fn resolve_volume(volume: &str, root: &Path) -> String {
    match volume.split_once(':') {
        Some((source, rest)) if source.starts_with("./") || source.starts_with("../") => {
            format!("{}:{}", root.join(source).display(), rest)
        }
        _ => volume.to_string(),
    }
}
