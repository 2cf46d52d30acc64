//! # Descriptor Sources
//!
//! A descriptor source answers "which packages and services exist" for a session, and keeps
//! track of the package and service the session currently targets.
//!
//! Two backings are provided:
//!
//! * **[`ReflectionSource`]:** asks the server through `grpc.reflection.v1`. The schema is fetched
//!   on first use and cached for the rest of the session.
//! * **[`FileSource`]:** decodes binary `FileDescriptorSet` files (as produced by
//!   `protoc --descriptor_set_out`).
//!
//! [`new_descriptor_source`] picks one of them from the wire client of the session.
mod files;
mod reflection;

pub use files::FileSource;
pub use reflection::ReflectionSource;

use crate::{
    client::Client, grpc::web::WebTransport, names, reflection::client::ReflectionResolveError,
};
use prost_reflect::{DescriptorError, DescriptorPool};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use tonic::transport::Channel;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Reflection request failed: '{0}'")]
    Reflection(#[source] ReflectionResolveError),
    #[error("TLS handshake failed, check whether client or server is misconfigured")]
    TlsHandshake(#[source] ReflectionResolveError),
    #[error("Failed to build the descriptor pool: '{0}'")]
    Descriptor(#[from] DescriptorError),
    #[error("Failed to read descriptor set '{}': '{source}'", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Package '{0}' not found")]
    PackageNotFound(String),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
}

/// The queries a session runs against its schema.
///
/// Package names are as declared in the descriptor files (`""` for files without a package).
/// Service names are fully qualified.
#[allow(async_fn_in_trait)]
pub trait DescriptorSource {
    /// Lists the packages declaring at least one service.
    async fn list_packages(&mut self) -> Result<Vec<String>, SourceError>;

    /// Lists the fully-qualified names of all services.
    async fn list_services(&mut self) -> Result<Vec<String>, SourceError>;

    /// Makes `package` the active package.
    async fn use_package(&mut self, package: &str) -> Result<(), SourceError>;

    /// Makes `service`, a name relative to the active package, the active service.
    async fn use_service(&mut self, service: &str) -> Result<(), SourceError>;
}

/// A descriptor pool plus the package and service currently in use.
#[derive(Debug, Clone)]
pub struct Schema {
    pool: DescriptorPool,
    package: Option<String>,
    service: Option<String>,
}

impl Schema {
    pub fn new(pool: DescriptorPool) -> Self {
        Self {
            pool,
            package: None,
            service: None,
        }
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// The active package, if any.
    pub fn package(&self) -> Option<&str> {
        self.package.as_deref()
    }

    /// The fully-qualified name of the active service, if any.
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn packages(&self) -> Vec<String> {
        self.pool
            .services()
            .map(|s| s.parent_file().package_name().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn services(&self) -> Vec<String> {
        self.pool
            .services()
            .map(|s| s.full_name().to_string())
            .collect()
    }

    pub fn use_package(&mut self, package: &str) -> Result<(), SourceError> {
        let exists = self
            .pool
            .services()
            .any(|s| s.parent_file().package_name() == package);

        if !exists {
            return Err(SourceError::PackageNotFound(package.to_string()));
        }

        if self.package() != Some(package) {
            self.service = None;
        }

        self.package = Some(package.to_string());
        Ok(())
    }

    pub fn use_service(&mut self, service: &str) -> Result<(), SourceError> {
        let package = self.package().unwrap_or_default();
        let full_name = names::join_service_name(package, service);

        if self.pool.get_service_by_name(&full_name).is_none() {
            return Err(SourceError::ServiceNotFound(full_name));
        }

        self.service = Some(full_name);
        Ok(())
    }
}

/// The descriptor source of a session.
pub enum Source {
    Reflection(ReflectionSource<Channel>),
    WebReflection(ReflectionSource<WebTransport>),
    Files(FileSource),
}

/// Builds the descriptor source matching `client`.
///
/// Reflection-enabled clients get a [`ReflectionSource`] sharing their transport. Otherwise the
/// schema is read from `descriptor_sets`.
pub fn new_descriptor_source(
    client: &Client,
    descriptor_sets: &[impl AsRef<Path>],
) -> Result<Source, SourceError> {
    if !client.uses_reflection() {
        tracing::debug!(files = descriptor_sets.len(), "Using descriptor set files");
        return Ok(Source::Files(FileSource::from_files(descriptor_sets)?));
    }

    tracing::debug!("Using server reflection");

    let source = match client {
        Client::Standard(conn) => {
            Source::Reflection(ReflectionSource::new(conn.reflection_client()))
        }
        Client::Web(conn) => {
            Source::WebReflection(ReflectionSource::new(conn.reflection_client()))
        }
    };

    Ok(source)
}

impl Source {
    /// The schema of the session, loading it on first use.
    pub async fn schema(&mut self) -> Result<&Schema, SourceError> {
        match self {
            Source::Reflection(source) => source.schema().await.map(|schema| &*schema),
            Source::WebReflection(source) => source.schema().await.map(|schema| &*schema),
            Source::Files(source) => Ok(source.schema()),
        }
    }
}

impl DescriptorSource for Source {
    async fn list_packages(&mut self) -> Result<Vec<String>, SourceError> {
        match self {
            Source::Reflection(source) => source.list_packages().await,
            Source::WebReflection(source) => source.list_packages().await,
            Source::Files(source) => source.list_packages().await,
        }
    }

    async fn list_services(&mut self) -> Result<Vec<String>, SourceError> {
        match self {
            Source::Reflection(source) => source.list_services().await,
            Source::WebReflection(source) => source.list_services().await,
            Source::Files(source) => source.list_services().await,
        }
    }

    async fn use_package(&mut self, package: &str) -> Result<(), SourceError> {
        match self {
            Source::Reflection(source) => source.use_package(package).await,
            Source::WebReflection(source) => source.use_package(package).await,
            Source::Files(source) => source.use_package(package).await,
        }
    }

    async fn use_service(&mut self, service: &str) -> Result<(), SourceError> {
        match self {
            Source::Reflection(source) => source.use_service(service).await,
            Source::WebReflection(source) => source.use_service(service).await,
            Source::Files(source) => source.use_service(service).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(DescriptorPool::decode(echo_service::FILE_DESCRIPTOR_SET).unwrap())
    }

    #[test]
    fn test_packages_and_services() {
        let schema = schema();
        assert_eq!(schema.packages(), vec!["echo"]);
        assert_eq!(schema.services(), vec!["echo.EchoService"]);
    }

    #[test]
    fn test_use_service_joins_active_package() {
        let mut schema = schema();

        assert!(matches!(
            schema.use_service("EchoService"),
            Err(SourceError::ServiceNotFound(name)) if name == "EchoService"
        ));

        schema.use_package("echo").unwrap();
        schema.use_service("EchoService").unwrap();
        assert_eq!(schema.service(), Some("echo.EchoService"));
    }

    #[test]
    fn test_use_package_keeps_service_when_unchanged() {
        let mut schema = schema();
        schema.use_package("echo").unwrap();
        schema.use_service("EchoService").unwrap();

        schema.use_package("echo").unwrap();
        assert_eq!(schema.service(), Some("echo.EchoService"));

        assert!(matches!(
            schema.use_package("missing"),
            Err(SourceError::PackageNotFound(name)) if name == "missing"
        ));
        assert_eq!(schema.package(), Some("echo"));
    }
}
