use super::ServiceRegistry;
use crate::docker::ContainerSummary;

/// How container names and ports translate into service records.
#[derive(Debug, Clone, Copy)]
pub struct MappingRules<'a> {
    pub prefix: &'a str,
    pub mail_service: &'a str,
    /// Published port of the mail service that is never used as its service port.
    pub smtp_port: Option<u16>,
}

/// Reconcile container listings into service records.
///
/// Containers not named `<prefix>_<service>` are ignored. The container ID is
/// always refreshed; the port and address only change when a published port
/// is found, so a listing without ports never erases what is already known.
/// With several published ports the last one listed wins.
/// Returns the names of the services that were touched.
pub fn wrap_containers_as_services(
    registry: &ServiceRegistry,
    rules: &MappingRules<'_>,
    containers: &[ContainerSummary],
) -> Vec<String> {
    let name_prefix = format!("{}_", rules.prefix);
    let mut mapped = Vec::new();

    for container in containers {
        let Some(raw_name) = container.names.first() else {
            continue;
        };
        let Some(name) = raw_name
            .trim_start_matches('/')
            .strip_prefix(&name_prefix)
            .filter(|name| !name.is_empty())
        else {
            continue;
        };

        let service = registry.get_or_discover(name);
        service.set_container_id(container.id.clone());

        let published = container
            .ports
            .iter()
            .rev()
            .find(|mapping| {
                mapping.is_published()
                    && !(name == rules.mail_service
                        && Some(mapping.public_port) == rules.smtp_port)
            });
        if let Some(mapping) = published {
            service.set_port(mapping.public_port);
        }

        tracing::debug!(
            "Mapped container {} to service '{}' (port {:?})",
            container.id,
            name,
            service.port()
        );
        mapped.push(name.to_string());
    }

    mapped
}
