//! # Grepl Client
//!
//! This module builds the wire client of a session and exposes the four call shapes
//! (unary, server streaming, client streaming, bidirectional streaming).
//!
//! A [`Client`] is one of two variants, chosen once from [`ClientEndpoint::web`]:
//!
//! 1. **[`Client::Standard`]**: HTTP/2 gRPC over a lazily connecting `tonic` channel.
//! 2. **[`Client::Web`]**: gRPC-Web over HTTP/1.1 (see [`crate::grpc::web`]).
//!
//! Both variants validate their credentials the same way, through
//! [`TransportSecurity::build`], and only when TLS is enabled.
//!
//! Calls name their target with a fully-qualified RPC name (`package.Service/Method`). The name
//! is resolved against the session schema before anything is sent, so a malformed or unknown
//! name is rejected even by a client that has no address.
//!
//! ## Example
//!
//! ```rust,no_run
//! use grepl_core::client::{Client, ClientEndpoint};
//! use grepl_core::prost_reflect::DescriptorPool;
//!
//! # async fn run(pool: DescriptorPool) -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = ClientEndpoint {
//!     address: "localhost:50051".to_string(),
//!     ..Default::default()
//! };
//!
//! let mut client = Client::new(&endpoint)?;
//! let response = client
//!     .unary(&pool, "echo.EchoService/UnaryEcho", serde_json::json!({ "message": "hi" }))
//!     .await?;
//! # Ok(())
//! # }
//! ```
mod endpoint;

pub use endpoint::{ClientEndpoint, Headers};

use crate::{
    BoxError,
    grpc::{
        client::{GrpcClient, GrpcRequestError},
        web::{self, WebTransport},
    },
    names,
    reflection::client::ReflectionClient,
    tls::{TlsError, TransportSecurity},
};
use futures_util::{Stream, StreamExt, stream::BoxStream};
use http::Uri;
use http_body::Body as HttpBody;
use prost_reflect::{DescriptorPool, MethodDescriptor};
use tonic::transport::{Channel, Endpoint};

/// Errors that can occur while building a [`Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error("Invalid address '{address}': '{source}'")]
    InvalidUri {
        address: String,
        source: http::uri::InvalidUri,
    },
    #[error("Invalid TLS configuration for '{address}': '{source}'")]
    InvalidTlsConfig {
        address: String,
        source: tonic::transport::Error,
    },
}

/// Errors that can occur when performing a call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Invalid RPC name '{0}', expected 'package.Service/Method'")]
    InvalidRpcName(String),
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{method}' not found in service '{service}'")]
    MethodNotFound { service: String, method: String },
    #[error("gRPC client request error: '{0}'")]
    GrpcRequestError(#[from] GrpcRequestError),
}

/// A stream of response messages.
pub type ResponseStream = BoxStream<'static, Result<serde_json::Value, tonic::Status>>;

/// The wire client of a session.
#[derive(Clone)]
pub enum Client {
    Standard(Connection<Channel>),
    Web(Connection<WebTransport>),
}

/// A transport together with the clients built on top of it.
#[derive(Clone)]
pub struct Connection<S> {
    grpc_client: GrpcClient<S>,
    reflection_client: ReflectionClient<S>,
    reflection: bool,
}

impl<S> Connection<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    fn new(service: S, endpoint: &ClientEndpoint) -> Self {
        let grpc_client = GrpcClient::new(service.clone())
            .headers(endpoint.headers.clone())
            .timeout(endpoint.timeout);

        Self {
            grpc_client,
            reflection_client: ReflectionClient::new(service),
            reflection: endpoint.reflection,
        }
    }

    /// A reflection client sharing this connection's transport.
    pub fn reflection_client(&self) -> ReflectionClient<S> {
        self.reflection_client.clone()
    }
}

impl Client {
    /// Builds the client variant selected by `endpoint.web`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Ok(Client)` - The client. No connection is attempted until the first call.
    /// * `Err(ClientBuildError::Tls(TlsError::MutualAuthParamsInsufficient))` - TLS is enabled and
    ///   only one of the client certificate and key was given.
    /// * `Err(ClientBuildError)` - Any other credential or address problem.
    pub fn new(endpoint: &ClientEndpoint) -> Result<Self, ClientBuildError> {
        if endpoint.web {
            Self::web(endpoint)
        } else {
            Self::standard(endpoint)
        }
    }

    /// Builds a standard gRPC client.
    ///
    /// The server certificate is verified against `endpoint.server_name`, or against the host
    /// of the address when no server name is given.
    pub fn standard(endpoint: &ClientEndpoint) -> Result<Self, ClientBuildError> {
        let security = transport_security(endpoint)?;
        let origin = parse_origin(endpoint)?;

        let mut channel = Endpoint::from(origin);

        if let Some(timeout) = endpoint.timeout {
            channel = channel.timeout(timeout);
        }

        if let Some(security) = security {
            channel = channel
                .tls_config(security.to_tonic(Some(&endpoint.server_name)))
                .map_err(|source| ClientBuildError::InvalidTlsConfig {
                    address: endpoint.address.clone(),
                    source,
                })?;
        }

        tracing::debug!(
            address = %endpoint.address,
            tls = endpoint.tls,
            "Built standard gRPC client"
        );

        Ok(Client::Standard(Connection::new(
            channel.connect_lazy(),
            endpoint,
        )))
    }

    /// Builds a gRPC-Web client.
    ///
    /// An empty address is accepted: the resulting client still validates RPC names, and fails
    /// once it tries to reach the network.
    pub fn web(endpoint: &ClientEndpoint) -> Result<Self, ClientBuildError> {
        let security = transport_security(endpoint)?.unwrap_or_default();

        let origin = (!endpoint.address.is_empty())
            .then(|| parse_origin(endpoint))
            .transpose()?;

        tracing::debug!(
            address = %endpoint.address,
            prefix = %endpoint.prefix,
            tls = endpoint.tls,
            "Built gRPC-Web client"
        );

        let transport = web::transport(security.to_rustls()?, origin);

        Ok(Client::Web(Connection::new(transport, endpoint)))
    }

    /// Whether the session schema should come from server reflection.
    pub fn uses_reflection(&self) -> bool {
        match self {
            Client::Standard(conn) => conn.reflection,
            Client::Web(conn) => conn.reflection,
        }
    }

    /// Performs a unary call.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(CallError)` - The RPC name did not resolve, or the request could not be sent.
    pub async fn unary(
        &mut self,
        schema: &DescriptorPool,
        fqrn: &str,
        payload: serde_json::Value,
    ) -> Result<Result<serde_json::Value, tonic::Status>, CallError> {
        let method = resolve_method(schema, fqrn)?;

        let result = match self {
            Client::Standard(conn) => conn.grpc_client.unary(&method, payload).await?,
            Client::Web(conn) => conn.grpc_client.unary(&method, payload).await?,
        };

        Ok(result)
    }

    /// Performs a server streaming call.
    pub async fn server_streaming(
        &mut self,
        schema: &DescriptorPool,
        fqrn: &str,
        payload: serde_json::Value,
    ) -> Result<Result<ResponseStream, tonic::Status>, CallError> {
        let method = resolve_method(schema, fqrn)?;

        let result = match self {
            Client::Standard(conn) => conn.grpc_client.server_streaming(&method, payload).await?,
            Client::Web(conn) => conn.grpc_client.server_streaming(&method, payload).await?,
        };

        Ok(result.map(StreamExt::boxed))
    }

    /// Performs a client streaming call.
    pub async fn client_streaming(
        &mut self,
        schema: &DescriptorPool,
        fqrn: &str,
        payload_stream: impl Stream<Item = serde_json::Value> + Send + 'static,
    ) -> Result<Result<serde_json::Value, tonic::Status>, CallError> {
        let method = resolve_method(schema, fqrn)?;

        let result = match self {
            Client::Standard(conn) => {
                conn.grpc_client
                    .client_streaming(&method, payload_stream)
                    .await?
            }
            Client::Web(conn) => {
                conn.grpc_client
                    .client_streaming(&method, payload_stream)
                    .await?
            }
        };

        Ok(result)
    }

    /// Performs a bidirectional streaming call.
    pub async fn bidirectional_streaming(
        &mut self,
        schema: &DescriptorPool,
        fqrn: &str,
        payload_stream: impl Stream<Item = serde_json::Value> + Send + 'static,
    ) -> Result<Result<ResponseStream, tonic::Status>, CallError> {
        let method = resolve_method(schema, fqrn)?;

        let result = match self {
            Client::Standard(conn) => {
                conn.grpc_client
                    .bidirectional_streaming(&method, payload_stream)
                    .await?
            }
            Client::Web(conn) => {
                conn.grpc_client
                    .bidirectional_streaming(&method, payload_stream)
                    .await?
            }
        };

        Ok(result.map(StreamExt::boxed))
    }
}

/// Resolves a fully-qualified RPC name against `schema`.
///
/// Accepts `package.Service/Method` and `package.Service.Method`.
pub fn resolve_method(schema: &DescriptorPool, fqrn: &str) -> Result<MethodDescriptor, CallError> {
    let (service, method) =
        names::split_rpc_name(fqrn).ok_or_else(|| CallError::InvalidRpcName(fqrn.to_string()))?;

    schema
        .get_service_by_name(service)
        .ok_or_else(|| CallError::ServiceNotFound(service.to_string()))?
        .methods()
        .find(|m| m.name() == method)
        .ok_or_else(|| CallError::MethodNotFound {
            service: service.to_string(),
            method: method.to_string(),
        })
}

fn transport_security(endpoint: &ClientEndpoint) -> Result<Option<TransportSecurity>, TlsError> {
    if !endpoint.tls {
        return Ok(None);
    }

    TransportSecurity::build(&endpoint.ca_cert, &endpoint.cert, &endpoint.cert_key).map(Some)
}

fn parse_origin(endpoint: &ClientEndpoint) -> Result<Uri, ClientBuildError> {
    endpoint
        .origin()
        .parse()
        .map_err(|source| ClientBuildError::InvalidUri {
            address: endpoint.address.clone(),
            source,
        })
}
