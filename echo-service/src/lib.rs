//! # Echo Service
//!
//! **INTERNAL USE ONLY**: This crate provides the `echo.EchoService` definitions and their
//! encoded `FileDescriptorSet` for the `grepl-core` integration tests.
//!
//! The service implementation lives with the tests, which also serve it through
//! `tonic-reflection` when exercising reflection-backed sessions.

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/echo.rs"));
}

pub use pb::echo_service_server::{EchoService, EchoServiceServer};
pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");
