use echo_service::{EchoServiceServer, FILE_DESCRIPTOR_SET};
use echo_service_impl::EchoServiceImpl;
use futures_util::{StreamExt, stream};
use grepl_core::client::{CallError, Client, ClientBuildError, ClientEndpoint, Headers};
use grepl_core::config::DefaultConfig;
use grepl_core::defaults::resolve_defaults;
use grepl_core::source::{DescriptorSource, Source, new_descriptor_source};
use grepl_core::tls::TlsError;
use prost_reflect::DescriptorPool;
use serde_json::json;
use std::{io::Write, net::SocketAddr, path::PathBuf};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Code, transport::Server};
use tonic_web::GrpcWebLayer;


const NO_FILES: &[PathBuf] = &[];

/// Serves the echo service plus reflection on a random local port, for gRPC and gRPC-Web.
async fn serve() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .unwrap();

    let server = Server::builder()
        .accept_http1(true)
        .layer(GrpcWebLayer::new())
        .add_service(reflection_service)
        .add_service(EchoServiceServer::new(EchoServiceImpl))
        .serve_with_incoming(TcpListenerStream::new(listener));

    tokio::spawn(server);

    addr
}

async fn connect(endpoint: ClientEndpoint) -> (Client, Source) {
    let client = Client::new(&endpoint).unwrap();
    let source = new_descriptor_source(&client, NO_FILES).unwrap();
    (client, source)
}

fn local(addr: SocketAddr, web: bool) -> ClientEndpoint {
    ClientEndpoint {
        address: addr.to_string(),
        reflection: true,
        web,
        ..Default::default()
    }
}

fn echo_pool() -> DescriptorPool {
    DescriptorPool::decode(FILE_DESCRIPTOR_SET).unwrap()
}

fn pem_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn key_pair_files() -> (NamedTempFile, NamedTempFile) {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    (pem_file(&cert.pem()), pem_file(&key_pair.serialize_pem()))
}

#[tokio::test]
async fn test_standard_client_all_call_shapes() {
    let addr = serve().await;
    let (mut client, mut source) = connect(local(addr, false)).await;
    let pool = source.schema().await.unwrap().pool().clone();

    let res = client
        .unary(&pool, "echo.EchoService/UnaryEcho", json!({ "message": "hi" }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res, json!({ "message": "hi" }));

    let stream = client
        .server_streaming(
            &pool,
            "echo.EchoService/ServerStreamingEcho",
            json!({ "message": "s" }),
        )
        .await
        .unwrap()
        .unwrap();
    let messages: Vec<_> = stream.map(|r| r.unwrap()["message"].clone()).collect().await;
    assert_eq!(messages, vec!["s - seq 0", "s - seq 1", "s - seq 2"]);

    let input = stream::iter(vec![json!({ "message": "a" }), json!({ "message": "b" })]);
    let res = client
        .client_streaming(&pool, "echo.EchoService/ClientStreamingEcho", input)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res, json!({ "message": "ab" }));

    let input = stream::iter(vec![json!({ "message": "x" }), json!({ "message": "y" })]);
    let stream = client
        .bidirectional_streaming(&pool, "echo.EchoService.BidirectionalEcho", input)
        .await
        .unwrap()
        .unwrap();
    let messages: Vec<_> = stream.map(|r| r.unwrap()["message"].clone()).collect().await;
    assert_eq!(messages, vec!["echo: x", "echo: y"]);
}

#[tokio::test]
async fn test_standard_client_sends_headers_in_order() {
    let addr = serve().await;
    let mut endpoint = local(addr, false);
    endpoint.headers = Headers::from_iter([("x-tag", "first"), ("x-tag", "second")]);

    let mut client = Client::new(&endpoint).unwrap();

    let res = client
        .unary(&echo_pool(), "echo.EchoService/UnaryEcho", json!({ "message": "hi" }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res, json!({ "message": "hi [first,second]" }));
}

#[tokio::test]
async fn test_server_error_is_returned_as_status() {
    let addr = serve().await;
    let mut client = Client::new(&local(addr, false)).unwrap();

    let status = client
        .unary(&echo_pool(), "echo.EchoService/UnaryEcho", json!({ "message": "fail" }))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn test_web_client_over_grpc_web() {
    let addr = serve().await;
    let mut endpoint = local(addr, true);
    endpoint.headers = Headers::from_iter([("x-tag", "web")]);

    let (mut client, mut source) = connect(endpoint).await;
    assert!(matches!(source, Source::WebReflection(_)));

    let pool = source.schema().await.unwrap().pool().clone();

    let res = client
        .unary(&pool, "echo.EchoService/UnaryEcho", json!({ "message": "hi" }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res, json!({ "message": "hi [web]" }));

    let stream = client
        .server_streaming(
            &pool,
            "echo.EchoService/ServerStreamingEcho",
            json!({ "message": "w" }),
        )
        .await
        .unwrap()
        .unwrap();
    let messages: Vec<_> = stream.map(|r| r.unwrap()["message"].clone()).collect().await;
    assert_eq!(messages, vec!["w - seq 0", "w - seq 1", "w - seq 2"]);
}

#[tokio::test]
async fn test_defaults_resolved_through_reflection() {
    let addr = serve().await;

    for web in [false, true] {
        let (_client, mut source) = connect(local(addr, web)).await;

        let mut packages = source.list_packages().await.unwrap();
        packages.sort();
        assert_eq!(packages, vec!["echo", "grpc.reflection.v1"]);

        let mut defaults = DefaultConfig::default();
        resolve_defaults(&mut defaults, &mut source).await.unwrap();

        assert_eq!(defaults.package, "echo");
        assert_eq!(defaults.service, "EchoService");

        let schema = source.schema().await.unwrap();
        assert_eq!(schema.package(), Some("echo"));
        assert_eq!(schema.service(), Some("echo.EchoService"));
    }
}

#[tokio::test]
async fn test_reflection_failure_is_reported() {
    // Nothing listens on this port once the listener is dropped.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let (_client, mut source) = connect(local(addr, false)).await;
    let err = source.list_packages().await.unwrap_err();

    assert!(matches!(
        err,
        grepl_core::source::SourceError::Reflection(_)
    ));
}

#[tokio::test]
async fn test_tls_client_against_plaintext_server_is_a_handshake_failure() {
    let addr = serve().await;

    for web in [false, true] {
        let endpoint = ClientEndpoint {
            tls: true,
            ..local(addr, web)
        };
        let (_client, mut source) = connect(endpoint).await;
        let err = source.list_packages().await.unwrap_err();

        assert!(
            matches!(err, grepl_core::source::SourceError::TlsHandshake(_)),
            "web={web} err={err:?}"
        );
    }
}

#[tokio::test]
async fn test_degenerate_web_client_rejects_invalid_rpc_names() {
    let endpoint = ClientEndpoint {
        web: true,
        ..Default::default()
    };
    let mut client = Client::new(&endpoint).unwrap();
    let pool = echo_pool();

    let err = client
        .unary(&pool, "invalid-fqrn", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidRpcName(name) if name == "invalid-fqrn"));

    let err = client
        .server_streaming(&pool, "invalid-fqrn", json!({}))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CallError::InvalidRpcName(_)));

    let err = client
        .client_streaming(&pool, "invalid-fqrn", stream::empty::<serde_json::Value>())
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidRpcName(_)));

    let err = client
        .bidirectional_streaming(&pool, "invalid-fqrn", stream::empty::<serde_json::Value>())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, CallError::InvalidRpcName(_)));
}

#[tokio::test]
async fn test_unknown_service_and_method() {
    let mut client = Client::new(&ClientEndpoint {
        web: true,
        ..Default::default()
    })
    .unwrap();
    let pool = echo_pool();

    let err = client
        .unary(&pool, "echo.Ghost/UnaryEcho", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, CallError::ServiceNotFound(name) if name == "echo.Ghost"));

    let err = client
        .unary(&pool, "echo.EchoService/Ghost", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CallError::MethodNotFound { service, method } if service == "echo.EchoService" && method == "Ghost"
    ));
}

#[tokio::test]
async fn test_insufficient_mutual_auth_params() {
    let (cert, key) = key_pair_files();

    for web in [false, true] {
        let only_cert = ClientEndpoint {
            address: "localhost:50051".to_string(),
            tls: true,
            web,
            cert: cert.path().to_path_buf(),
            ..Default::default()
        };
        let only_key = ClientEndpoint {
            cert: PathBuf::new(),
            cert_key: key.path().to_path_buf(),
            ..only_cert.clone()
        };

        for endpoint in [only_cert, only_key] {
            let err = Client::new(&endpoint).err().unwrap();
            assert!(matches!(
                err,
                ClientBuildError::Tls(TlsError::MutualAuthParamsInsufficient)
            ));
        }
    }
}

#[tokio::test]
async fn test_credentials_ignored_without_tls() {
    let (cert, _key) = key_pair_files();

    for web in [false, true] {
        let endpoint = ClientEndpoint {
            address: "localhost:50051".to_string(),
            web,
            cert: cert.path().to_path_buf(),
            ..Default::default()
        };

        assert!(Client::new(&endpoint).is_ok());
    }
}

#[tokio::test]
async fn test_mutual_tls_clients() {
    let (cert, key) = key_pair_files();
    let (ca, _) = key_pair_files();

    for web in [false, true] {
        let endpoint = ClientEndpoint {
            address: "localhost:50051".to_string(),
            server_name: "localhost".to_string(),
            tls: true,
            web,
            ca_cert: ca.path().to_path_buf(),
            cert: cert.path().to_path_buf(),
            cert_key: key.path().to_path_buf(),
            ..Default::default()
        };

        let client = Client::new(&endpoint).unwrap();
        assert!(client.uses_reflection() == endpoint.reflection);
    }
}

#[tokio::test]
async fn test_unreadable_ca_is_reported() {
    let endpoint = ClientEndpoint {
        address: "localhost:50051".to_string(),
        tls: true,
        ca_cert: PathBuf::from("/nonexistent/ca.pem"),
        ..Default::default()
    };

    let err = Client::new(&endpoint).err().unwrap();
    assert!(matches!(
        err,
        ClientBuildError::Tls(TlsError::Read {
            role: grepl_core::tls::CredentialRole::CaCertificate,
            ..
        })
    ));
}
