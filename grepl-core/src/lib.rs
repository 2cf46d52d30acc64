//! # Grepl Core
//!
//! `grepl-core` contains everything an interactive gRPC client needs before the user types
//! the first command: building the transport security, picking the wire client and working
//! out which package and service the session should target by default.
//!
//! ## Key Components
//!
//! * **[`tls::TransportSecurity`]:** Turns CA / certificate / key file paths into a validated
//!   TLS configuration (plain, server TLS or mutual TLS).
//! * **[`client::Client`]:** A dynamic gRPC client. It is either a standard HTTP/2 gRPC client or
//!   a gRPC-Web client, selected once from a [`client::ClientEndpoint`].
//! * **[`source::DescriptorSource`]:** The schema seen by the session, backed either by the
//!   server reflection service or by local `FileDescriptorSet` files.
//! * **[`defaults::resolve_defaults`]:** Picks the default package and service when the schema
//!   leaves no room for ambiguity.
//! * **[`config::SessionConfig`]:** The session configuration that ties all of the above together.
//!
//! ## Internal clients
//!
//! * **[`grpc::client::GrpcClient`]:** A generic gRPC client using a JSON codec, shared by both
//!   wire clients.
//! * **[`reflection::client::ReflectionClient`]:** A `grpc.reflection.v1` client offering only
//!   the functionality that we need to build a descriptor pool.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod config;
pub mod defaults;
pub mod grpc;
pub mod names;
pub mod reflection;
pub mod source;
pub mod tls;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
