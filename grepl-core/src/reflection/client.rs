//! # Reflection Client
//!
//! A client for `grpc.reflection.v1`.
//!
//! It answers the two questions a descriptor source asks a live server: which services are
//! exposed, and which files (with all their transitive imports) define a given symbol.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use futures_util::stream::once;
use http_body::Body as HttpBody;
use prost::Message;
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{HashMap, HashSet};
use tonic::{client::GrpcService, transport::Channel};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, server_reflection_client::ServerReflectionClient,
    server_reflection_request::MessageRequest, server_reflection_response::MessageResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ReflectionResolveError {
    #[error(
        "Failed to start a stream request with the reflection server, reflection might not be supported: '{0}'"
    )]
    ServerStreamInitFailed(#[source] tonic::Status),

    #[error("The server stream returned an error status: '{0}'")]
    ServerStreamFailure(#[source] tonic::Status),

    #[error("Reflection stream closed unexpectedly")]
    StreamClosed,

    #[error("Server returned reflection error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: Received unexpected response type: {0}")]
    UnexpectedResponseType(String),

    #[error("Failed to decode FileDescriptorProto: {0}")]
    DecodeError(#[from] prost::DecodeError),
}

impl ReflectionResolveError {
    /// The status returned by the server or the transport, if any.
    pub fn status(&self) -> Option<&tonic::Status> {
        match self {
            Self::ServerStreamInitFailed(status) | Self::ServerStreamFailure(status) => {
                Some(status)
            }
            _ => None,
        }
    }
}

// The reflection protocol does not define what the host field is for, so it is left empty.
const EMPTY_HOST: &str = "";

/// A client for the gRPC Server Reflection Protocol.
///
/// Every request is sent on a stream of its own and answered before the next one goes out, so
/// the client also works over gRPC-Web, which cannot stream requests.
#[derive(Clone)]
pub struct ReflectionClient<S = Channel> {
    client: ServerReflectionClient<S>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
        }
    }

    /// Lists the fully-qualified names of all services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionResolveError> {
        match self
            .exchange(MessageRequest::ListServices(String::new()))
            .await?
        {
            MessageResponse::ListServicesResponse(resp) => {
                Ok(resp.service.into_iter().map(|s| s.name).collect())
            }
            other => Err(ReflectionResolveError::UnexpectedResponseType(format!(
                "{other:?}",
            ))),
        }
    }

    /// Fetches the file defining `symbol` (e.g. `my.package.MyService`) and every file it
    /// transitively imports.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionResolveError> {
        let response = self
            .exchange(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;

        let mut collected_files = HashMap::new();
        let mut pending = collect_descriptors(response, &mut collected_files)?;
        let mut requested: HashSet<String> = pending.iter().cloned().collect();

        while let Some(filename) = pending.pop() {
            if collected_files.contains_key(&filename) {
                continue;
            }

            let response = self
                .exchange(MessageRequest::FileByFilename(filename))
                .await?;

            for dep in collect_descriptors(response, &mut collected_files)? {
                if requested.insert(dep.clone()) {
                    pending.push(dep);
                }
            }
        }

        Ok(FileDescriptorSet {
            file: collected_files.into_values().collect(),
        })
    }

    async fn exchange(
        &mut self,
        message_request: MessageRequest,
    ) -> Result<MessageResponse, ReflectionResolveError> {
        let req = ServerReflectionRequest {
            host: EMPTY_HOST.to_string(),
            message_request: Some(message_request),
        };

        let mut response_stream = self
            .client
            .server_reflection_info(once(async { req }))
            .await
            .map_err(ReflectionResolveError::ServerStreamInitFailed)?
            .into_inner();

        let response = response_stream
            .message()
            .await
            .map_err(ReflectionResolveError::ServerStreamFailure)?
            .ok_or(ReflectionResolveError::StreamClosed)?;

        match response.message_response {
            Some(MessageResponse::ErrorResponse(e)) => Err(ReflectionResolveError::ServerError {
                code: e.error_code,
                message: e.error_message,
            }),
            Some(message_response) => Ok(message_response),
            None => Err(ReflectionResolveError::UnexpectedResponseType(
                "Empty Message".into(),
            )),
        }
    }
}

/// Decodes the files of a descriptor response into `collected_files`.
///
/// Returns the imports of the new files that have not been collected yet.
fn collect_descriptors(
    response: MessageResponse,
    collected_files: &mut HashMap<String, FileDescriptorProto>,
) -> Result<Vec<String>, ReflectionResolveError> {
    let res = match response {
        MessageResponse::FileDescriptorResponse(res) => res,
        other => {
            return Err(ReflectionResolveError::UnexpectedResponseType(format!(
                "{other:?}"
            )));
        }
    };

    let mut missing = Vec::new();

    for raw in res.file_descriptor_proto {
        let fd = FileDescriptorProto::decode(raw.as_ref())?;

        let Some(name) = fd.name.clone() else {
            continue;
        };

        if collected_files.contains_key(&name) {
            continue;
        }

        missing.extend(
            fd.dependency
                .iter()
                .filter(|dep| !collected_files.contains_key(*dep))
                .cloned(),
        );

        collected_files.insert(name, fd);
    }

    Ok(missing)
}
