//! # gRPC-Web Transport
//!
//! gRPC-Web servers (and the proxies in front of them) usually speak HTTP/1.1 and expect the
//! `application/grpc-web` framing. This module stacks `tonic-web`'s client layer on top of a
//! `hyper` client so that the generic [`super::client::GrpcClient`] and the reflection client
//! can talk to them unchanged.
//!
//! gRPC-Web endpoints are often mounted under a path prefix (e.g. `https://host/api`), so the
//! outermost [`WebOrigin`] layer rewrites every request URI against the configured origin.
use http::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use std::task::{Context, Poll};
use tonic_web::{GrpcWebCall, GrpcWebClientLayer, GrpcWebClientService};
use tower::{Layer, Service};

/// The service stack used by gRPC-Web clients.
pub type WebTransport = WebOrigin<
    GrpcWebClientService<Client<HttpsConnector<HttpConnector>, GrpcWebCall<tonic::body::Body>>>,
>;

/// Builds a gRPC-Web transport sending every request to `origin`.
///
/// `https` origins are secured with `tls`. Without an origin, requests keep their bare path
/// and fail when sent.
pub fn transport(tls: rustls::ClientConfig, origin: Option<Uri>) -> WebTransport {
    let connector = HttpsConnectorBuilder::new()
        .with_tls_config(tls)
        .https_or_http()
        .enable_http1()
        .build();

    let client = Client::builder(TokioExecutor::new()).build(connector);

    WebOrigin {
        inner: GrpcWebClientLayer::new().layer(client),
        origin,
    }
}

/// Points requests at an origin, keeping the origin path as a prefix of the request path.
#[derive(Debug, Clone)]
pub struct WebOrigin<S> {
    inner: S,
    origin: Option<Uri>,
}

impl<S> WebOrigin<S> {
    fn rewrite(&self, uri: &Uri) -> Option<Uri> {
        let origin = self.origin.as_ref()?;
        let prefix = origin.path().trim_end_matches('/');
        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

        Uri::builder()
            .scheme(origin.scheme()?.clone())
            .authority(origin.authority()?.clone())
            .path_and_query(format!("{prefix}{path}"))
            .build()
            .ok()
    }
}

impl<S, B> Service<http::Request<B>> for WebOrigin<S>
where
    S: Service<http::Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: http::Request<B>) -> Self::Future {
        if let Some(uri) = self.rewrite(request.uri()) {
            *request.uri_mut() = uri;
        }

        self.inner.call(request)
    }
}
