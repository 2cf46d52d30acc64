use echo_service::{EchoServiceServer, FILE_DESCRIPTOR_SET};
use echo_service_impl::EchoServiceImpl;
use grepl_core::reflection::client::{ReflectionClient, ReflectionResolveError};
use prost_reflect::DescriptorPool;
use tonic::Code;
use tonic_reflection::server::v1::ServerReflectionServer;


fn setup_reflection_client()
-> ReflectionClient<ServerReflectionServer<impl tonic_reflection::server::v1::ServerReflection>> {
    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()
        .expect("Failed to setup Reflection Service");

    ReflectionClient::new(reflection_service)
}

#[tokio::test]
async fn test_list_services() {
    let mut client = setup_reflection_client();

    let mut services = client.list_services().await.unwrap();
    services.sort();

    assert_eq!(
        services,
        vec!["echo.EchoService", "grpc.reflection.v1.ServerReflection"]
    );
}

#[tokio::test]
async fn test_fetches_service_file_descriptor() {
    let mut client = setup_reflection_client();

    let fd_set = client
        .file_descriptor_set_by_symbol("echo.EchoService")
        .await
        .expect("Failed to fetch file descriptor set by symbol");

    let pool =
        DescriptorPool::from_file_descriptor_set(fd_set).expect("Failed to build descriptor pool");

    let service = pool
        .get_service_by_name("echo.EchoService")
        .expect("Failed to find service in file descriptor");

    let shapes: Vec<_> = service
        .methods()
        .map(|m| {
            (
                m.name().to_string(),
                m.is_client_streaming(),
                m.is_server_streaming(),
            )
        })
        .collect();

    assert!(shapes.contains(&("UnaryEcho".to_string(), false, false)));
    assert!(shapes.contains(&("ServerStreamingEcho".to_string(), false, true)));
    assert!(shapes.contains(&("ClientStreamingEcho".to_string(), true, false)));
    assert!(shapes.contains(&("BidirectionalEcho".to_string(), true, true)));

    assert!(service.methods().all(|m| m.input().name() == "EchoRequest"));
    assert!(service.methods().all(|m| m.output().name() == "EchoResponse"));
}

#[tokio::test]
async fn test_unknown_symbol_is_not_found() {
    let mut client = setup_reflection_client();

    let result = client
        .file_descriptor_set_by_symbol("non.existent.Service")
        .await;

    assert!(matches!(
        result,
        Err(ReflectionResolveError::ServerStreamFailure(status)) if status.code() == Code::NotFound
    ));
}

#[tokio::test]
async fn test_server_without_reflection() {
    let server = EchoServiceServer::new(EchoServiceImpl);
    let mut client = ReflectionClient::new(server);

    let err = client.list_services().await.unwrap_err();

    assert!(matches!(err, ReflectionResolveError::ServerStreamInitFailed(_)));
    assert_eq!(err.status().map(|s| s.code()), Some(Code::Unimplemented));
}
