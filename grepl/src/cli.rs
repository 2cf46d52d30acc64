//! # CLI
//!
//! This module defines the command-line interface of `grepl` using `clap`.
//!
//! Connection options are global: they can be given before or after the subcommand, and they
//! override the values of the `--config` file.
use clap::{Parser, Subcommand};
use grepl_core::{client::Headers, config::SessionConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grepl", version, about = "gRPC client with automatic default targets")]
pub struct Cli {
    /// TOML session configuration to start from
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Name used to verify the server certificate
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Discover the schema through server reflection
    #[arg(short, long, global = true)]
    pub reflection: bool,

    /// Secure the connection with TLS
    #[arg(short, long, global = true)]
    pub tls: bool,

    /// Talk gRPC-Web instead of gRPC
    #[arg(long, global = true)]
    pub web: bool,

    /// Path prefix of gRPC-Web requests (e.g. /api)
    #[arg(long, global = true)]
    pub prefix: Option<String>,

    /// Trusted CA certificate bundle (PEM)
    #[arg(long, global = true)]
    pub cacert: Option<PathBuf>,

    /// Client certificate for mutual TLS (PEM)
    #[arg(long, global = true)]
    pub cert: Option<PathBuf>,

    /// Client certificate key for mutual TLS (PEM)
    #[arg(long, global = true)]
    pub certkey: Option<PathBuf>,

    /// Request header, repeatable. Replaces the configured values of the same key.
    #[arg(short = 'H', long = "header", global = true, value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Default package
    #[arg(long, global = true)]
    pub package: Option<String>,

    /// Default service, relative to the default package
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Binary FileDescriptorSet used when reflection is disabled, repeatable
    #[arg(long = "descriptor-set", global = true)]
    pub descriptor_sets: Vec<PathBuf>,

    /// Per-request timeout, in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and print the default package and service
    Defaults,

    /// List available packages or services
    List {
        #[command(subcommand)]
        sub: ListCommands,
    },

    /// Perform a gRPC call
    ///
    /// The RPC can be fully qualified (`package.Service/Method`), relative to the default
    /// package (`Service/Method`) or relative to the default service (`Method`).
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// grepl --reflection call echo.EchoService/UnaryEcho --body '{"message": "hi"}'
    /// grepl --reflection call UnaryEcho --body '{"message": "hi"}'
    /// ```
    Call {
        /// RPC to call
        rpc: String,

        /// JSON body (Object for Unary, Array for client streaming)
        #[arg(long, value_parser = parse_body)]
        body: serde_json::Value,
    },
}

#[derive(Subcommand)]
pub enum ListCommands {
    /// List the packages declaring services
    Packages,
    /// List all services, fully qualified
    Services,
}

impl Cli {
    /// Overrides `config` with the options given on the command line.
    pub fn apply(&self, config: &mut SessionConfig) {
        let server = &mut config.server;

        if let Some(host) = &self.host {
            server.host = host.clone();
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if let Some(name) = &self.name {
            server.name = name.clone();
        }
        if let Some(prefix) = &self.prefix {
            server.prefix = prefix.clone();
        }

        server.reflection |= self.reflection;
        server.tls |= self.tls;
        server.web |= self.web;

        let request = &mut config.request;

        if let Some(path) = &self.cacert {
            request.ca_cert_file = path.clone();
        }
        if let Some(path) = &self.cert {
            request.cert_file = path.clone();
        }
        if let Some(path) = &self.certkey {
            request.cert_key_file = path.clone();
        }
        if self.timeout.is_some() {
            request.timeout = self.timeout;
        }

        let headers: Headers = self.headers.iter().cloned().collect();
        for (key, _) in &self.headers {
            request.headers.set(key.clone(), headers.get_all(key).to_vec());
        }

        let default = &mut config.default;

        if let Some(package) = &self.package {
            default.package = package.clone();
        }
        if let Some(service) = &self.service {
            default.service = service.clone();
        }
        if !self.descriptor_sets.is_empty() {
            default.descriptor_sets = self.descriptor_sets.clone();
        }
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "grepl",
            "--port",
            "9000",
            "--reflection",
            "-H",
            "x-a: 1",
            "-H",
            "x-a:2",
            "--package",
            "echo",
            "defaults",
        ]);

        let mut config = SessionConfig::default();
        config.request.headers.append("x-a", "file");
        config.request.headers.append("x-b", "kept");
        cli.apply(&mut config);

        assert_eq!(config.address(), "127.0.0.1:9000");
        assert!(config.server.reflection);
        assert!(!config.server.tls);
        assert_eq!(config.request.headers.get_all("x-a"), ["1", "2"]);
        assert_eq!(config.request.headers.get_all("x-b"), ["kept"]);
        assert_eq!(config.default.package, "echo");
        assert!(config.default.service.is_empty());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "grepl",
            "call",
            "UnaryEcho",
            "--body",
            r#"{"message": "hi"}"#,
            "--web",
            "--prefix",
            "/api",
        ]);

        let mut config = SessionConfig::default();
        cli.apply(&mut config);

        assert!(config.server.web);
        assert_eq!(config.server.prefix, "/api");
        assert!(matches!(cli.command, Commands::Call { ref rpc, .. } if rpc == "UnaryEcho"));
    }

    #[test]
    fn test_invalid_header_and_body() {
        assert!(parse_header("no-colon").is_err());
        assert_eq!(
            parse_header(" k : v ").unwrap(),
            ("k".to_string(), "v".to_string())
        );
        assert!(parse_body("{not json").is_err());
    }
}
