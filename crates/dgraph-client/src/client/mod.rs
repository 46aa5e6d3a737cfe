//! The main `Client`: connection selection, administrative operations and the
//! read-consistency marker shared by its transactions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use dgraph_proto::api::{self, LinRead};

use super::config::ClientConfig;
use super::connection::{CallOptions, Connection};
use super::context::merge_lin_reads;
use super::error::{ClientError, ClientResult};
use super::pool::{ConnectionPool, ConnectionSelector, RandomSelector};
use super::transaction::Transaction;

/// Statistics about client usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Transactions created.
    pub transactions: u64,
    /// Queries sent.
    pub queries: u64,
    /// Mutations sent.
    pub mutations: u64,
    /// Commits sent.
    pub commits: u64,
    /// Aborts sent.
    pub discards: u64,
    /// Mutations or commits rejected as conflicts.
    pub conflicts: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    transactions: AtomicU64,
    queries: AtomicU64,
    mutations: AtomicU64,
    commits: AtomicU64,
    discards: AtomicU64,
    conflicts: AtomicU64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Stat {
    Transaction,
    Query,
    Mutation,
    Commit,
    Discard,
    Conflict,
}

impl StatsCounters {
    pub(crate) fn record(&self, stat: Stat) {
        let counter = match stat {
            Stat::Transaction => &self.transactions,
            Stat::Query => &self.queries,
            Stat::Mutation => &self.mutations,
            Stat::Commit => &self.commits,
            Stat::Discard => &self.discards,
            Stat::Conflict => &self.conflicts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ClientStats {
        ClientStats {
            transactions: self.transactions.load(Ordering::Relaxed),
            queries: self.queries.load(Ordering::Relaxed),
            mutations: self.mutations.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            discards: self.discards.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}

/// Dgraph client.
///
/// Safe to share between tasks. Every transaction created from the same client
/// starts from the highest read-consistency marker the client has observed.
pub struct Client {
    /// Cluster members.
    pool: ConnectionPool,
    /// Per-call deadline.
    deadline: Option<Duration>,
    /// Connection selection policy.
    selector: Box<dyn ConnectionSelector>,
    /// Highest marker observed by any transaction of this client.
    lin_read: Mutex<LinRead>,
    /// Statistics.
    stats: StatsCounters,
}

impl Client {
    /// Creates a client over `pool`.
    ///
    /// Fails with [`ClientError::EmptyPool`] if the pool has no connections.
    pub fn new(pool: ConnectionPool) -> ClientResult<Self> {
        if pool.is_empty() {
            return Err(ClientError::EmptyPool);
        }
        Ok(Self {
            pool,
            deadline: None,
            selector: Box::new(RandomSelector),
            lin_read: Mutex::new(LinRead::default()),
            stats: StatsCounters::default(),
        })
    }

    /// Creates a client over a single connection.
    pub fn with_connection(connection: Connection) -> ClientResult<Self> {
        Self::new(ConnectionPool::from_connections([connection]))
    }

    /// Connects to every configured endpoint.
    pub async fn connect(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let pool = ConnectionPool::new();
        for conn_config in config.connection_configs() {
            pool.add(Connection::connect(&conn_config).await?);
        }
        Ok(Self::new(pool)?.with_deadline(config.deadline()))
    }

    /// Creates a client whose connections dial on first use.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let connections = config
            .connection_configs()
            .iter()
            .map(Connection::connect_lazy)
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self::new(ConnectionPool::from_connections(connections))?
            .with_deadline(config.deadline()))
    }

    /// Sets the per-call deadline in whole seconds.
    ///
    /// Zero is rejected, as in [`ClientConfig::validate`].
    pub fn deadline_secs(self, secs: u64) -> ClientResult<Self> {
        if secs == 0 {
            return Err(ClientError::InvalidConfig(
                "deadline_secs must be greater than 0".to_string(),
            ));
        }
        Ok(self.with_deadline(Some(Duration::from_secs(secs))))
    }

    fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Replaces the connection selection policy.
    pub fn selector(mut self, selector: impl ConnectionSelector + 'static) -> Self {
        self.selector = Box::new(selector);
        self
    }

    /// Returns the per-call deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Returns client statistics.
    pub fn stats(&self) -> ClientStats {
        self.stats.snapshot()
    }

    pub(crate) fn record(&self, stat: Stat) {
        self.stats.record(stat);
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Creates a new transaction.
    ///
    /// Finish it with [`Transaction::commit`] or [`Transaction::discard`].
    /// Discard is a no-op after commit, so calling it unconditionally is safe.
    pub fn new_txn(&self) -> Transaction<'_> {
        self.record(Stat::Transaction);
        Transaction::new(self, self.lin_read())
    }

    /// Returns a copy of the shared read-consistency marker.
    pub fn lin_read(&self) -> LinRead {
        self.lin_read.lock().clone()
    }

    /// Folds `lin_read` into the shared marker and returns the new value.
    pub fn merge_lin_read(&self, lin_read: &LinRead) -> LinRead {
        let mut shared = self.lin_read.lock();
        let merged = merge_lin_reads(&shared, lin_read);
        *shared = merged.clone();
        merged
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Alters the schema or drops data.
    ///
    /// Set `schema` to change predicates, `drop_attr` to drop one predicate, or
    /// `drop_all` to drop everything.
    pub async fn alter(&self, operation: api::Operation) -> ClientResult<()> {
        let (conn, opts) = self.any_connection()?;
        conn.alter(operation, &opts).await?;
        Ok(())
    }

    /// Like [`alter`](Self::alter), cancelled when `token` fires.
    pub async fn alter_with_token(
        &self,
        operation: api::Operation,
        token: CancellationToken,
    ) -> ClientResult<()> {
        let (conn, opts) = self.any_connection()?;
        conn.alter(operation, &opts.cancel_on(token)).await?;
        Ok(())
    }

    /// Applies schema text.
    pub async fn set_schema(&self, schema: impl Into<String>) -> ClientResult<()> {
        self.alter(api::Operation {
            schema: schema.into(),
            ..Default::default()
        })
        .await
    }

    /// Drops one predicate and its data.
    pub async fn drop_attr(&self, predicate: impl Into<String>) -> ClientResult<()> {
        self.alter(api::Operation {
            drop_attr: predicate.into(),
            ..Default::default()
        })
        .await
    }

    /// Drops all data and schema.
    pub async fn drop_all(&self) -> ClientResult<()> {
        self.alter(api::Operation {
            drop_all: true,
            ..Default::default()
        })
        .await
    }

    /// Returns the version tag of one server.
    pub async fn check_version(&self) -> ClientResult<String> {
        let (conn, opts) = self.any_connection()?;
        Ok(conn.check_version(&opts).await?.tag)
    }

    /// Closes every pooled connection.
    pub async fn close(&self) -> ClientResult<()> {
        self.pool.close_all().await
    }

    /// Picks a connection and stamps the call deadline.
    pub(crate) fn any_connection(&self) -> ClientResult<(Arc<Connection>, CallOptions)> {
        let conn = self.pool.pick(self.selector.as_ref())?;
        let mut opts = CallOptions::new();
        if let Some(deadline) = self.deadline {
            opts = opts.timeout(deadline);
        }
        tracing::trace!(endpoint = %conn.endpoint(), "selected connection");
        Ok((conn, opts))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("pool", &self.pool)
            .field("deadline", &self.deadline)
            .field("selector", &self.selector)
            .finish()
    }
}
