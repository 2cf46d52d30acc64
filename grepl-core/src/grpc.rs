//! # Generic gRPC Transport
//!
//! Low-level building blocks for performing gRPC calls with dynamic message types.
//!
//! The same [`client::GrpcClient`] drives both wire flavours: a `tonic` HTTP/2 channel for
//! standard gRPC, and the [`web::WebTransport`] stack for gRPC-Web servers.
pub mod client;
pub mod codec;
pub mod web;
