//! # Server Reflection
//!
//! Talks the gRPC Server Reflection Protocol so that a session can discover the schema of a
//! server at runtime instead of relying on local descriptor files.
//!
//! The well-known reflection service names live here as well: they are filtered out when
//! picking default targets, whether reflection is enabled or not.
pub mod client;

/// Fully-qualified name of the `v1alpha` reflection service.
pub const REFLECTION_SERVICE_NAME: &str = "grpc.reflection.v1alpha.ServerReflection";

/// Fully-qualified name of the `v1` reflection service.
pub const REFLECTION_V1_SERVICE_NAME: &str = "grpc.reflection.v1.ServerReflection";

/// Every reflection service name excluded from default resolution.
pub const REFLECTION_SERVICE_NAMES: [&str; 2] =
    [REFLECTION_SERVICE_NAME, REFLECTION_V1_SERVICE_NAME];
