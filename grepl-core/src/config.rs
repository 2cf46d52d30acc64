//! # Session Configuration
//!
//! The configuration a session starts from. It is usually loaded from a TOML file and then
//! overridden by command-line flags:
//!
//! ```toml
//! [server]
//! host = "localhost"
//! port = 50051
//! reflection = true
//!
//! [request]
//! timeout = 5
//!
//! [request.headers]
//! authorization = ["Bearer token"]
//!
//! [default]
//! package = "echo"
//! ```
//!
//! Every section and field is optional. Empty strings and paths mean "not set".
use crate::client::{ClientEndpoint, Headers};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': '{source}'", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config '{}': '{source}'", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub server: ServerConfig,
    pub request: RequestConfig,
    pub default: DefaultConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Name used to verify the server certificate, when it differs from `host`.
    pub name: String,
    pub reflection: bool,
    pub tls: bool,
    /// Talk gRPC-Web instead of gRPC.
    pub web: bool,
    /// Path prefix of gRPC-Web requests.
    pub prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            name: String::new(),
            reflection: false,
            tls: false,
            web: false,
            prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    pub ca_cert_file: PathBuf,
    pub cert_file: PathBuf,
    pub cert_key_file: PathBuf,
    pub headers: Headers,
    /// Per-request timeout, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// The package and service a session targets when a command does not name one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultConfig {
    pub package: String,
    pub service: String,
    /// Binary `FileDescriptorSet` files used when reflection is disabled.
    pub descriptor_sets: Vec<PathBuf>,
}

impl SessionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `host:port` of the server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// The endpoint the session client is built from.
    pub fn endpoint(&self) -> ClientEndpoint {
        ClientEndpoint {
            address: self.address(),
            server_name: self.server.name.clone(),
            prefix: self.server.prefix.clone(),
            web: self.server.web,
            reflection: self.server.reflection,
            tls: self.server.tls,
            ca_cert: self.request.ca_cert_file.clone(),
            cert: self.request.cert_file.clone(),
            cert_key: self.request.cert_key_file.clone(),
            headers: self.request.headers.clone(),
            timeout: self.request.timeout.map(Duration::from_secs),
        }
    }
}
