//! # Generic gRPC Client
//!
//! This module wraps `tonic::client::Grpc` to provide a transport-agnostic interface for
//! gRPC communication. It does not know the Protobuf messages being exchanged: it builds the
//! HTTP/2 path (e.g. `/package.Service/Method`) from a `MethodDescriptor` at runtime and hands
//! the `serde_json::Value` payloads to the [`super::codec::JsonCodec`].
//!
//! Every request carries the client's [`Headers`] as outgoing metadata. Keys ending in `-bin`
//! are sent as binary metadata; every value of a key is appended in order.
use super::codec::JsonCodec;
use crate::{BoxError, client::Headers};
use futures_util::Stream;
use http::uri::{InvalidUri, PathAndQuery};
use http_body::Body as HttpBody;
use prost_reflect::MethodDescriptor;
use std::{str::FromStr, time::Duration};
use tonic::{
    client::GrpcService,
    metadata::{
        AsciiMetadataKey, AsciiMetadataValue, BinaryMetadataKey, BinaryMetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid request path '{path}': '{source}'")]
    InvalidPath { path: String, source: InvalidUri },
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// A dynamic gRPC client over any `tonic` compatible transport.
#[derive(Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
    headers: Headers,
    timeout: Option<Duration>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Wraps a service that knows where to send requests (e.g. a `Channel`).
    pub fn new(service: S) -> Self {
        Self {
            client: tonic::client::Grpc::new(service),
            headers: Headers::default(),
            timeout: None,
        }
    }

    /// Sets the metadata attached to every request.
    pub fn headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the `grpc-timeout` announced on every request.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// # Returns
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to build the request or the transport was not ready.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        payload: serde_json::Value,
    ) -> Result<Result<serde_json::Value, tonic::Status>, GrpcRequestError> {
        let path = http_path(method)?;
        let request = self.build_request(payload)?;
        self.ready().await?;

        match self
            .client
            .unary(request, path, JsonCodec::for_method(method))
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Server Streaming gRPC call (Single Request -> Stream of Responses).
    pub async fn server_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload: serde_json::Value,
    ) -> Result<
        Result<tonic::Streaming<serde_json::Value>, tonic::Status>,
        GrpcRequestError,
    > {
        let path = http_path(method)?;
        let request = self.build_request(payload)?;
        self.ready().await?;

        match self
            .client
            .server_streaming(request, path, JsonCodec::for_method(method))
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Client Streaming gRPC call (Stream of Requests -> Single Response).
    pub async fn client_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload_stream: impl Stream<Item = serde_json::Value> + Send + 'static,
    ) -> Result<Result<serde_json::Value, tonic::Status>, GrpcRequestError> {
        let path = http_path(method)?;
        let request = self.build_request(payload_stream)?;
        self.ready().await?;

        match self
            .client
            .client_streaming(request, path, JsonCodec::for_method(method))
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Bidirectional Streaming gRPC call (Stream of Requests -> Stream of Responses).
    pub async fn bidirectional_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload_stream: impl Stream<Item = serde_json::Value> + Send + 'static,
    ) -> Result<
        Result<tonic::Streaming<serde_json::Value>, tonic::Status>,
        GrpcRequestError,
    > {
        let path = http_path(method)?;
        let request = self.build_request(payload_stream)?;
        self.ready().await?;

        match self
            .client
            .streaming(request, path, JsonCodec::for_method(method))
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    async fn ready(&mut self) -> Result<(), GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))
    }

    fn build_request<T>(&self, payload: T) -> Result<tonic::Request<T>, GrpcRequestError> {
        let mut request = tonic::Request::new(payload);

        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }

        for (key, value) in self.headers.iter() {
            append_metadata(request.metadata_mut(), key, value)?;
        }

        Ok(request)
    }
}

fn append_metadata(
    metadata: &mut tonic::metadata::MetadataMap,
    key: &str,
    value: &str,
) -> Result<(), GrpcRequestError> {
    let invalid_key = |source: InvalidMetadataKey| GrpcRequestError::InvalidMetadataKey {
        key: key.to_string(),
        source,
    };

    if key.ends_with("-bin") {
        let key = BinaryMetadataKey::from_str(key).map_err(invalid_key)?;
        metadata.append_bin(key, BinaryMetadataValue::from_bytes(value.as_bytes()));
        return Ok(());
    }

    let parsed_key = AsciiMetadataKey::from_str(key).map_err(invalid_key)?;
    let parsed_value = AsciiMetadataValue::from_str(value).map_err(|source| {
        GrpcRequestError::InvalidMetadataValue {
            key: key.to_string(),
            source,
        }
    })?;
    metadata.append(parsed_key, parsed_value);

    Ok(())
}

fn http_path(method: &MethodDescriptor) -> Result<PathAndQuery, GrpcRequestError> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    PathAndQuery::from_str(&path).map_err(|source| GrpcRequestError::InvalidPath { path, source })
}
