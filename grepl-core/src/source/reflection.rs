use super::{DescriptorSource, Schema, SourceError};
use crate::{
    BoxError,
    reflection::client::{ReflectionClient, ReflectionResolveError},
};
use http_body::Body as HttpBody;
use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorSet;
use std::{collections::HashMap, error::Error};
use tonic::{Code, client::GrpcService};

/// A descriptor source backed by the server reflection service.
///
/// Nothing is requested until the first query. The schema is then assembled from the files
/// defining every listed service and kept for the rest of the session.
pub struct ReflectionSource<S> {
    client: ReflectionClient<S>,
    schema: Option<Schema>,
}

impl<S> ReflectionSource<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(client: ReflectionClient<S>) -> Self {
        Self {
            client,
            schema: None,
        }
    }

    /// The schema exposed by the server, fetched on first use.
    pub async fn schema(&mut self) -> Result<&mut Schema, SourceError> {
        let schema = match self.schema.take() {
            Some(schema) => schema,
            None => Schema::new(self.fetch_pool().await?),
        };

        Ok(self.schema.insert(schema))
    }

    async fn fetch_pool(&mut self) -> Result<DescriptorPool, SourceError> {
        let services = self
            .client
            .list_services()
            .await
            .map_err(reflection_error)?;

        let mut files = HashMap::new();

        for service in &services {
            let fd_set = match self.client.file_descriptor_set_by_symbol(service).await {
                Ok(fd_set) => fd_set,
                Err(err) if err.status().is_some_and(|s| s.code() == Code::NotFound) => {
                    tracing::warn!(%service, "Server listed a service it cannot describe, skipping");
                    continue;
                }
                Err(err) => return Err(reflection_error(err)),
            };

            for file in fd_set.file {
                if let Some(name) = file.name.clone() {
                    files.entry(name).or_insert(file);
                }
            }
        }

        tracing::debug!(
            services = services.len(),
            files = files.len(),
            "Fetched schema through reflection"
        );

        let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
            file: files.into_values().collect(),
        })?;

        Ok(pool)
    }
}

impl<S> DescriptorSource for ReflectionSource<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    async fn list_packages(&mut self) -> Result<Vec<String>, SourceError> {
        Ok(self.schema().await?.packages())
    }

    async fn list_services(&mut self) -> Result<Vec<String>, SourceError> {
        Ok(self.schema().await?.services())
    }

    async fn use_package(&mut self, package: &str) -> Result<(), SourceError> {
        self.schema().await?.use_package(package)
    }

    async fn use_service(&mut self, service: &str) -> Result<(), SourceError> {
        self.schema().await?.use_service(service)
    }
}

fn reflection_error(err: ReflectionResolveError) -> SourceError {
    if err.status().is_some_and(is_tls_failure) {
        SourceError::TlsHandshake(err)
    } else {
        SourceError::Reflection(err)
    }
}

/// Whether the transport failed because of TLS (bad certificate, unknown CA, protocol mismatch).
fn is_tls_failure(status: &tonic::Status) -> bool {
    let mut current = status.source();

    while let Some(err) = current {
        if wraps_rustls_error(err) {
            return true;
        }

        current = err.source();
    }

    false
}

/// `io::Error::source` skips the wrapped error, so nested io errors are unwrapped by hand.
fn wraps_rustls_error(mut err: &(dyn Error + 'static)) -> bool {
    loop {
        if err.is::<rustls::Error>() {
            return true;
        }

        match err
            .downcast_ref::<std::io::Error>()
            .and_then(|io| io.get_ref())
        {
            Some(inner) => err = inner as &(dyn Error + 'static),
            None => return false,
        }
    }
}
