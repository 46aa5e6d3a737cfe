//! Connection pool over the members of one cluster.
//!
//! The pool only grows; connections leave it through [`ConnectionPool::close_all`].
//! Which member serves a call is decided by a [`ConnectionSelector`].

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

use super::connection::Connection;
use super::error::{ClientError, ClientResult};

/// Picks the pool member that serves the next call.
pub trait ConnectionSelector: Send + Sync + fmt::Debug {
    /// Returns an index in `0..pool_size`. `pool_size` is never zero.
    fn select(&self, pool_size: usize) -> usize;
}

/// Uniformly random selection. This is the default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl ConnectionSelector for RandomSelector {
    fn select(&self, pool_size: usize) -> usize {
        rand::thread_rng().gen_range(0..pool_size)
    }
}

/// Cycles through the pool in order.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl RoundRobinSelector {
    /// Creates a selector starting at the first member.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConnectionSelector for RoundRobinSelector {
    fn select(&self, pool_size: usize) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed) % pool_size
    }
}

/// Connections to servers of a single cluster.
#[derive(Default)]
pub struct ConnectionPool {
    connections: RwLock<Vec<Arc<Connection>>>,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pool from existing connections.
    pub fn from_connections(connections: impl IntoIterator<Item = Connection>) -> Self {
        let pool = Self::new();
        pool.add_all(connections);
        pool
    }

    /// Adds a connection.
    pub fn add(&self, connection: Connection) -> &Self {
        self.connections.write().push(Arc::new(connection));
        self
    }

    /// Adds several connections.
    pub fn add_all(&self, connections: impl IntoIterator<Item = Connection>) -> &Self {
        let connections: Vec<_> = connections.into_iter().map(Arc::new).collect();
        self.connections.write().extend(connections);
        self
    }

    /// Returns the number of connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns true if the pool has no connections.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Returns a snapshot of the current members.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    /// Returns the endpoints of the current members.
    pub fn endpoints(&self) -> Vec<String> {
        self.connections
            .read()
            .iter()
            .map(|c| c.endpoint().to_string())
            .collect()
    }

    /// Picks one member using `selector`.
    pub fn pick(&self, selector: &dyn ConnectionSelector) -> ClientResult<Arc<Connection>> {
        let connections = self.connections.read();
        if connections.is_empty() {
            return Err(ClientError::EmptyPool);
        }
        let index = selector.select(connections.len()) % connections.len();
        Ok(Arc::clone(&connections[index]))
    }

    /// Closes every connection.
    ///
    /// Every member gets a shutdown attempt; the first failure is returned
    /// once all attempts have been made.
    pub async fn close_all(&self) -> ClientResult<()> {
        let connections = self.connections();
        let mut first_error = None;

        for connection in connections {
            if let Err(e) = connection.close().await {
                tracing::warn!(endpoint = %connection.endpoint(), error = %e, "failed to close connection");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("endpoints", &self.endpoints())
            .finish()
    }
}
