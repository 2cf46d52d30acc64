use super::{DescriptorSource, Schema, SourceError};
use prost_reflect::DescriptorPool;
use std::path::Path;

/// A descriptor source backed by binary `FileDescriptorSet` files.
#[derive(Debug, Clone)]
pub struct FileSource {
    schema: Schema,
}

impl FileSource {
    /// Reads and merges every descriptor set in `paths`.
    ///
    /// Files shared by several sets (e.g. well-known types) are only added once.
    pub fn from_files(paths: &[impl AsRef<Path>]) -> Result<Self, SourceError> {
        let mut pool = DescriptorPool::new();

        for path in paths {
            let path = path.as_ref();
            let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            pool.decode_file_descriptor_set(bytes.as_slice())?;
            tracing::debug!(path = %path.display(), "Loaded descriptor set");
        }

        Ok(Self::from_pool(pool))
    }

    /// Decodes a single encoded `FileDescriptorSet`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SourceError> {
        Ok(Self::from_pool(DescriptorPool::decode(bytes)?))
    }

    pub fn from_pool(pool: DescriptorPool) -> Self {
        Self {
            schema: Schema::new(pool),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl DescriptorSource for FileSource {
    async fn list_packages(&mut self) -> Result<Vec<String>, SourceError> {
        Ok(self.schema.packages())
    }

    async fn list_services(&mut self) -> Result<Vec<String>, SourceError> {
        Ok(self.schema.services())
    }

    async fn use_package(&mut self, package: &str) -> Result<(), SourceError> {
        self.schema.use_package(package)
    }

    async fn use_service(&mut self, service: &str) -> Result<(), SourceError> {
        self.schema.use_service(service)
    }
}
