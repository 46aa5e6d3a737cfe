//! Error types for the client library.

use std::fmt;

use thiserror::Error;
use tonic::{Code, Status};

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Operation attempted on a committed or discarded transaction.
    #[error("transaction has already been committed or discarded")]
    TransactionFinished,

    /// Two server responses reported different start timestamps for one transaction.
    #[error("start timestamp mismatch: transaction has {local}, server reported {remote}")]
    StartTsMismatch {
        /// Start timestamp already held by the transaction.
        local: u64,
        /// Start timestamp carried by the offending response.
        remote: u64,
    },

    /// Optimistic concurrency conflict; retry with a new transaction.
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// Remote call failed with a gRPC status.
    #[error("rpc failed: {0}")]
    Rpc(Status),

    /// Channel could not be established.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Client constructed over a pool with no connections.
    #[error("pool has no connections")]
    EmptyPool,

    /// Connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Result payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Outcome category of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Misuse detected locally, such as reusing a finished transaction.
    Usage,
    /// Client and server disagree about transaction state. Not retryable.
    Protocol,
    /// Write conflict; the caller may retry with a fresh transaction.
    Conflict,
    /// Transport or server failure passed through unchanged.
    Transport,
    /// Bad configuration or construction arguments.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Usage => write!(f, "usage"),
            ErrorKind::Protocol => write!(f, "protocol"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Transport => write!(f, "transport"),
            ErrorKind::Config => write!(f, "config"),
        }
    }
}

impl ClientError {
    /// Returns the outcome category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::TransactionFinished => ErrorKind::Usage,
            ClientError::StartTsMismatch { .. } => ErrorKind::Protocol,
            ClientError::Conflict(_) => ErrorKind::Conflict,
            ClientError::Rpc(_)
            | ClientError::Transport(_)
            | ClientError::ConnectionClosed
            | ClientError::Cancelled
            | ClientError::Serialization(_)
            | ClientError::Io(_) => ErrorKind::Transport,
            ClientError::EmptyPool | ClientError::InvalidConfig(_) | ClientError::Config(_) => {
                ErrorKind::Config
            }
        }
    }

    /// Returns true for optimistic concurrency conflicts.
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Returns the gRPC status code for remote failures.
    pub fn code(&self) -> Option<Code> {
        match self {
            ClientError::Rpc(status) => Some(status.code()),
            _ => None,
        }
    }

    /// Re-signals aborted and failed-precondition statuses as [`ClientError::Conflict`].
    ///
    /// Applied to failures of `mutate` and `commit` only.
    pub(crate) fn into_conflict(self) -> Self {
        match self {
            ClientError::Rpc(status) if is_conflict_code(status.code()) => {
                ClientError::Conflict(status.message().to_string())
            }
            other => other,
        }
    }
}

impl From<Status> for ClientError {
    fn from(status: Status) -> Self {
        ClientError::Rpc(status)
    }
}

/// Status codes the server uses to report write-write and read-write conflicts.
pub fn is_conflict_code(code: Code) -> bool {
    matches!(code, Code::Aborted | Code::FailedPrecondition)
}
