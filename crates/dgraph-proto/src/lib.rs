//! Dgraph gRPC Protocol Definitions
//!
//! This crate provides the generated wire types and the gRPC client stub for
//! the `api.Dgraph` service, compiled from `proto/api.proto`.
//!
//! # Overview
//!
//! The protocol defines:
//! - Queries with variables and a read-consistency marker (`LinRead`)
//! - Mutations in N-Quad or JSON encodings
//! - Schema alteration and predicate/database drops
//! - Transaction finalization (`CommitOrAbort`)
//!
//! # Example
//!
//! ```ignore
//! use dgraph_proto::{api, DgraphClient};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = DgraphClient::connect("http://localhost:9080").await?;
//!
//!     let request = api::Request {
//!         query: "{ me(func: has(name)) { name } }".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let response = client.query(request).await?;
//!     println!("Result: {:?}", response.into_inner().json);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

/// Generated protobuf types and gRPC client for package `api`.
#[allow(missing_docs)]
#[allow(clippy::derive_partial_eq_without_eq)]
pub mod api {
    tonic::include_proto!("api");
}

// Re-export the client type
pub use api::dgraph_client::DgraphClient;
