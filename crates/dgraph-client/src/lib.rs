//! # dgraph-client
//!
//! Transactional gRPC client for Dgraph.
//!
//! This crate provides:
//!
//! - **Connection Pooling**: one connection per cluster member, with a pluggable
//!   selection policy (uniformly random by default)
//! - **Transactions**: optimistic transactions with read-consistency tracking
//!   across every transaction of a client
//! - **Conflict Detection**: aborted and failed-precondition statuses surface as
//!   [`ClientError::Conflict`] so callers can retry with a new transaction
//! - **Helpers**: schema text builder, mutation constructors and TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dgraph_client::{mutation, Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new()
//!         .endpoints(["http://alpha-1:9080", "http://alpha-2:9080"])
//!         .deadline_secs(5);
//!     let client = Client::connect(&config).await?;
//!
//!     client.set_schema("name: string @index(exact) .").await?;
//!
//!     let mut txn = client.new_txn();
//!     let assigned = txn
//!         .mutate(mutation::set_nquads(r#"_:alice <name> "Alice" ."#))
//!         .await?;
//!     txn.commit().await?;
//!     println!("alice = {}", assigned.uids["alice"]);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Retrying Conflicts
//!
//! ```rust,ignore
//! use dgraph_client::{ClientError, TransactionExt};
//!
//! loop {
//!     let result: Result<(), ClientError> = client
//!         .run_transaction(|txn| {
//!             Box::pin(async move {
//!                 txn.mutate(mutation::set_nquads("<0x1> <balance> \"10\" .")).await?;
//!                 Ok(())
//!             })
//!         })
//!         .await;
//!
//!     match result {
//!         Err(e) if e.is_conflict() => continue,
//!         other => return other,
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Error types.
pub mod error;

/// Client configuration.
pub mod config;

/// Read-consistency markers.
pub mod context;

/// Single-server connections.
pub mod connection;

/// Connection pool.
pub mod pool;

/// Client handle.
pub mod client;

/// Transaction handle.
pub mod transaction;

/// Mutation constructors.
pub mod mutation;

/// Schema text builder.
pub mod schema;

#[cfg(test)]
mod mock;

// Re-exports
pub use client::{Client, ClientStats};
pub use config::ClientConfig;
pub use connection::{CallOptions, Connection, ConnectionConfig, DgraphStub, GrpcStub};
pub use context::{merge_lin_reads, LinReadExt};
pub use dgraph_proto::api;
pub use error::{ClientError, ClientResult, ErrorKind};
pub use pool::{ConnectionPool, ConnectionSelector, RandomSelector, RoundRobinSelector};
pub use transaction::{Transaction, TransactionExt, TxnState};
