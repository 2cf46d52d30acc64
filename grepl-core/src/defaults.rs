//! # Default Target Resolution
//!
//! Works out which package and service a session targets when the user did not configure them.
//!
//! A default is only picked when the schema leaves no choice: a single package (once the
//! reflection package is set aside) and a single service. Anything ambiguous leaves the default
//! unset, silently, and the user has to pick one later.
//!
//! Configured defaults are never replaced; they are only committed to the descriptor source, so
//! running the resolution again is harmless.
use crate::{
    config::DefaultConfig,
    names,
    reflection::REFLECTION_SERVICE_NAMES,
    source::{DescriptorSource, SourceError},
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to list packages: '{0}'")]
    ListPackages(#[source] SourceError),
    #[error("Failed to list services: '{0}'")]
    ListServices(#[source] SourceError),
    #[error("Failed to set '{package}' as the default package: '{source}'")]
    UsePackage { package: String, source: SourceError },
    #[error("Failed to set '{service}' as the default service: '{source}'")]
    UseService { service: String, source: SourceError },
}

/// Resolves the default package and service of `defaults` against `source`.
///
/// On success the resolved values are committed to `source` through
/// [`DescriptorSource::use_package`] and [`DescriptorSource::use_service`]. When the package
/// cannot be decided, services are not looked at.
pub async fn resolve_defaults(
    defaults: &mut DefaultConfig,
    source: &mut impl DescriptorSource,
) -> Result<(), ResolveError> {
    if defaults.package.is_empty() {
        let packages = source
            .list_packages()
            .await
            .map_err(ResolveError::ListPackages)?;

        let packages = filter_reflection_packages(&packages);

        match packages.as_slice() {
            [package] => {
                tracing::info!(%package, "Using the only package as default");
                defaults.package = package.clone();
            }
            packages if packages.iter().any(String::is_empty) => {
                tracing::debug!("Schema declares services outside of any package");
            }
            packages => {
                tracing::debug!(?packages, "Several packages available, no default package");
                return Ok(());
            }
        }
    }

    source
        .use_package(&defaults.package)
        .await
        .map_err(|source| ResolveError::UsePackage {
            package: defaults.package.clone(),
            source,
        })?;

    if defaults.service.is_empty() {
        let services = source
            .list_services()
            .await
            .map_err(ResolveError::ListServices)?;

        let services = drop_reflection_services(services);

        let [service] = services.as_slice() else {
            tracing::debug!(?services, "No single service available, no default service");
            return Ok(());
        };

        let (_, name) = names::split_service_name(service);
        tracing::info!(service = %name, "Using the only service as default");
        defaults.service = name.to_string();
    }

    source
        .use_service(&defaults.service)
        .await
        .map_err(|source| ResolveError::UseService {
            service: defaults.service.clone(),
            source,
        })?;

    Ok(())
}

/// Removes the packages of the well-known reflection services from `packages`.
pub fn filter_reflection_packages(packages: &[String]) -> Vec<String> {
    let reflection_packages: Vec<&str> = REFLECTION_SERVICE_NAMES
        .iter()
        .map(|name| names::split_service_name(name).0)
        .collect();

    packages
        .iter()
        .filter(|package| !reflection_packages.contains(&package.as_str()))
        .cloned()
        .collect()
}

/// Removes the well-known reflection services from a list of fully-qualified service names.
pub fn drop_reflection_services(services: Vec<String>) -> Vec<String> {
    services
        .into_iter()
        .filter(|service| !REFLECTION_SERVICE_NAMES.contains(&service.as_str()))
        .collect()
}
