//! # Session
//!
//! Bootstraps a session from its configuration: the wire client, the descriptor source and the
//! default package and service. Commands then run against the bootstrapped session.
use anyhow::{Context, Result, bail};
use futures_util::{StreamExt, stream};
use grepl_core::{
    client::{self, Client},
    config::SessionConfig,
    defaults::resolve_defaults,
    names,
    source::{DescriptorSource, Source, new_descriptor_source},
    tonic::Status,
};

pub struct Session {
    pub config: SessionConfig,
    client: Client,
    source: Source,
}

/// The outcome of a call, with streamed responses collected.
pub enum CallOutput {
    Unary(Result<serde_json::Value, Status>),
    Streaming(Result<Vec<Result<serde_json::Value, Status>>, Status>),
}

impl Session {
    pub async fn bootstrap(mut config: SessionConfig) -> Result<Self> {
        let endpoint = config.endpoint();

        let client = Client::new(&endpoint).with_context(|| {
            if endpoint.web {
                "failed to instantiate a gRPC-Web client"
            } else {
                "failed to instantiate a gRPC client"
            }
        })?;

        let mut source = new_descriptor_source(&client, &config.default.descriptor_sets)
            .context("failed to instantiate the descriptor source")?;

        resolve_defaults(&mut config.default, &mut source)
            .await
            .context("failed to resolve the default package and service")?;

        tracing::debug!(
            package = %config.default.package,
            service = %config.default.service,
            "Session ready"
        );

        Ok(Self {
            config,
            client,
            source,
        })
    }

    pub async fn list_packages(&mut self) -> Result<Vec<String>> {
        Ok(self.source.list_packages().await?)
    }

    pub async fn list_services(&mut self) -> Result<Vec<String>> {
        Ok(self.source.list_services().await?)
    }

    /// Expands `rpc` into a fully-qualified RPC name using the session defaults.
    pub fn qualify(&self, rpc: &str) -> Result<String> {
        let default = &self.config.default;

        if let Some((service, method)) = rpc.split_once('/') {
            if service.contains('.') {
                return Ok(rpc.to_string());
            }

            let service = names::join_service_name(&default.package, service);
            return Ok(format!("{service}/{method}"));
        }

        if rpc.contains('.') {
            return Ok(rpc.to_string());
        }

        if default.service.is_empty() {
            bail!("no default service, call '{rpc}' as 'Service/{rpc}' or pass --service");
        }

        let service = names::join_service_name(&default.package, &default.service);
        Ok(format!("{service}/{rpc}"))
    }

    /// Calls `rpc` with `body`, picking the call shape from the method definition.
    ///
    /// Client streaming methods take an array body, one element per message.
    pub async fn call(&mut self, rpc: &str, body: serde_json::Value) -> Result<CallOutput> {
        let fqrn = self.qualify(rpc)?;
        let pool = self.source.schema().await?.pool().clone();
        let method = client::resolve_method(&pool, &fqrn)?;

        tracing::debug!(rpc = %fqrn, "Calling");

        let output = match (method.is_client_streaming(), method.is_server_streaming()) {
            (false, false) => CallOutput::Unary(self.client.unary(&pool, &fqrn, body).await?),
            (false, true) => {
                let result = self.client.server_streaming(&pool, &fqrn, body).await?;
                CallOutput::Streaming(collect(result).await)
            }
            (true, false) => {
                let messages = stream::iter(into_messages(body));
                CallOutput::Unary(self.client.client_streaming(&pool, &fqrn, messages).await?)
            }
            (true, true) => {
                let messages = stream::iter(into_messages(body));
                let result = self
                    .client
                    .bidirectional_streaming(&pool, &fqrn, messages)
                    .await?;
                CallOutput::Streaming(collect(result).await)
            }
        };

        Ok(output)
    }
}

fn into_messages(body: serde_json::Value) -> Vec<serde_json::Value> {
    match body {
        serde_json::Value::Array(messages) => messages,
        message => vec![message],
    }
}

async fn collect(
    result: Result<client::ResponseStream, Status>,
) -> Result<Vec<Result<serde_json::Value, Status>>, Status> {
    Ok(result?.collect().await)
}
