//! Transaction handle.
//!
//! A transaction moves from [`TxnState::Active`] to [`TxnState::Mutated`] after
//! its first successful write and ends in [`TxnState::Finished`] after commit,
//! discard, or a commit-now mutation. Nothing leaves `Finished`.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use dgraph_proto::api::{self, LinRead, TxnContext};

use super::client::{Client, Stat};
use super::connection::{CallOptions, Connection};
use super::context::{merge_optional, reconcile_start_ts, seeded_context};
use super::error::{ClientError, ClientResult};

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// No successful write yet.
    Active,
    /// At least one write succeeded; commit or discard is pending.
    Mutated,
    /// Committed or discarded.
    Finished,
}

/// A transaction handle.
///
/// Dropping a mutated transaction that was neither committed nor discarded
/// schedules a best-effort abort on the current tokio runtime. Awaiting
/// [`discard`](Self::discard) is still the reliable way to clean up.
pub struct Transaction<'a> {
    /// Owning client.
    client: &'a Client,
    /// Current context, replaced wholesale on every merge.
    context: Arc<TxnContext>,
    finished: bool,
    mutated: bool,
    /// Raced against every remote call.
    cancel: Option<CancellationToken>,
}

impl<'a> Transaction<'a> {
    /// Creates a transaction seeded with a copy of the client's marker.
    pub(crate) fn new(client: &'a Client, lin_read: LinRead) -> Self {
        Self {
            client,
            context: Arc::new(seeded_context(lin_read)),
            finished: false,
            mutated: false,
            cancel: None,
        }
    }

    /// Cancels every remote call of this transaction once `token` fires.
    ///
    /// A transaction whose write was cancelled in flight has unknown server
    /// state and should be discarded.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns a snapshot of the current context.
    pub fn context(&self) -> Arc<TxnContext> {
        Arc::clone(&self.context)
    }

    /// Returns the start timestamp, 0 until the server assigns one.
    pub fn start_ts(&self) -> u64 {
        self.context.start_ts
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> TxnState {
        if self.finished {
            TxnState::Finished
        } else if self.mutated {
            TxnState::Mutated
        } else {
            TxnState::Active
        }
    }

    /// Returns true once committed or discarded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Runs a query and returns the raw response.
    pub async fn query(&mut self, query: impl Into<String>) -> ClientResult<api::Response> {
        self.query_with_vars(query, HashMap::new()).await
    }

    /// Runs a query with named variables.
    pub async fn query_with_vars(
        &mut self,
        query: impl Into<String>,
        vars: HashMap<String, String>,
    ) -> ClientResult<api::Response> {
        self.ensure_active()?;

        let request = api::Request {
            query: query.into(),
            vars,
            start_ts: self.context.start_ts,
            lin_read: self.context.lin_read.clone(),
        };

        let (conn, opts) = self.connection()?;
        self.client.record(Stat::Query);
        let response = conn.query(request, &opts).await?;

        self.merge_context(response.txn.as_ref())?;
        Ok(response)
    }

    /// Runs a query and decodes the JSON payload into `T`.
    pub async fn query_as<T: DeserializeOwned>(&mut self, query: impl Into<String>) -> ClientResult<T> {
        let response = self.query(query).await?;
        Ok(serde_json::from_slice(&response.json)?)
    }

    /// Runs a query with named variables and decodes the JSON payload into `T`.
    pub async fn query_with_vars_as<T: DeserializeOwned>(
        &mut self,
        query: impl Into<String>,
        vars: HashMap<String, String>,
    ) -> ClientResult<T> {
        let response = self.query_with_vars(query, vars).await?;
        Ok(serde_json::from_slice(&response.json)?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Applies a mutation.
    ///
    /// With `commit_now` set, a successful mutation also finishes the
    /// transaction. On failure the transaction is discarded before the error
    /// is returned; aborted and failed-precondition statuses come back as
    /// [`ClientError::Conflict`].
    pub async fn mutate(&mut self, mut mutation: api::Mutation) -> ClientResult<api::Assigned> {
        self.ensure_active()?;
        mutation.start_ts = self.context.start_ts;
        let commit_now = mutation.commit_now;

        let (conn, opts) = self.connection()?;
        self.client.record(Stat::Mutation);

        match conn.mutate(mutation, &opts).await {
            Ok(assigned) => {
                self.mutated = true;
                if commit_now {
                    self.finished = true;
                }
                self.merge_context(assigned.context.as_ref())?;
                Ok(assigned)
            }
            Err(e) => {
                if let Err(discard_err) = self.discard().await {
                    tracing::warn!(error = %discard_err, "failed to discard after mutation error");
                }
                Err(self.conflict(e))
            }
        }
    }

    /// Commits the transaction.
    ///
    /// Committing a transaction that never wrote anything is free.
    pub async fn commit(&mut self) -> ClientResult<()> {
        self.ensure_active()?;
        self.finished = true;

        if !self.mutated {
            return Ok(());
        }

        let (conn, opts) = self.connection()?;
        self.client.record(Stat::Commit);
        tracing::debug!(start_ts = self.context.start_ts, "committing transaction");

        match conn.commit_or_abort((*self.context).clone(), &opts).await {
            Ok(_) => Ok(()),
            Err(e) => Err(self.conflict(e)),
        }
    }

    /// Discards the transaction.
    ///
    /// A no-op when already finished or never mutated, so it is safe to call
    /// unconditionally after [`commit`](Self::commit). The abort ignores the
    /// transaction's cancellation token. Errors are returned unchanged.
    pub async fn discard(&mut self) -> ClientResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        if !self.mutated {
            return Ok(());
        }

        let mut aborted = (*self.context).clone();
        aborted.aborted = true;
        self.context = Arc::new(aborted);

        // The abort is sent even after the token fired, bounded by the deadline only.
        let (conn, opts) = self.client.any_connection()?;
        self.client.record(Stat::Discard);
        tracing::debug!(start_ts = self.context.start_ts, "aborting transaction");

        conn.commit_or_abort((*self.context).clone(), &opts).await?;
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_active(&self) -> ClientResult<()> {
        if self.finished {
            return Err(ClientError::TransactionFinished);
        }
        Ok(())
    }

    fn connection(&self) -> ClientResult<(Arc<Connection>, CallOptions)> {
        let (conn, opts) = self.client.any_connection()?;
        Ok(match &self.cancel {
            Some(token) => (conn, opts.cancel_on(token.clone())),
            None => (conn, opts),
        })
    }

    fn conflict(&self, err: ClientError) -> ClientError {
        let err = err.into_conflict();
        if err.is_conflict() {
            self.client.record(Stat::Conflict);
        }
        err
    }

    /// Folds a server-reported context into this transaction and the client.
    fn merge_context(&mut self, src: Option<&TxnContext>) -> ClientResult<()> {
        let Some(src) = src else {
            return Ok(());
        };

        let mut merged = (*self.context).clone();
        let lin_read = merge_optional(self.context.lin_read.as_ref(), src.lin_read.as_ref());
        self.client.merge_lin_read(&lin_read);
        merged.lin_read = Some(lin_read);

        match reconcile_start_ts(self.context.start_ts, src.start_ts) {
            Ok(start_ts) => merged.start_ts = start_ts,
            Err(e) => {
                tracing::warn!(error = %e, "server reported a different start timestamp");
                self.context = Arc::new(merged);
                return Err(e);
            }
        }

        merged.keys.extend(src.keys.iter().cloned());
        self.context = Arc::new(merged);
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished || !self.mutated {
            return;
        }
        self.finished = true;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                start_ts = self.context.start_ts,
                "transaction dropped outside a runtime; server will expire it"
            );
            return;
        };
        let (conn, opts) = match self.client.any_connection() {
            Ok(picked) => picked,
            Err(e) => {
                tracing::warn!(error = %e, "cannot abort dropped transaction");
                return;
            }
        };

        let mut context = (*self.context).clone();
        context.aborted = true;
        self.client.record(Stat::Discard);
        tracing::debug!(start_ts = context.start_ts, "aborting dropped transaction");

        handle.spawn(async move {
            if let Err(e) = conn.commit_or_abort(context, &opts).await {
                tracing::warn!(error = %e, "failed to abort dropped transaction");
            }
        });
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("start_ts", &self.context.start_ts)
            .field("state", &self.state())
            .finish()
    }
}

/// Extension trait for running code in a transaction.
pub trait TransactionExt {
    /// Runs a closure within a new transaction.
    ///
    /// If the closure returns `Ok`, the transaction is committed. The
    /// transaction is discarded on every path, which is a no-op after a
    /// successful commit.
    fn run_transaction<'c, F, T, E>(&'c self, f: F) -> impl Future<Output = Result<T, E>>
    where
        F: for<'t> FnOnce(
            &'t mut Transaction<'c>,
        ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 't>>,
        E: From<ClientError>;
}

impl TransactionExt for Client {
    async fn run_transaction<'c, F, T, E>(&'c self, f: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(
            &'t mut Transaction<'c>,
        ) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send + 't>>,
        E: From<ClientError>,
    {
        let mut txn = self.new_txn();

        let result = match f(&mut txn).await {
            Ok(value) => txn.commit().await.map(|()| value).map_err(E::from),
            Err(e) => Err(e),
        };

        if let Err(e) = txn.discard().await {
            tracing::warn!(error = %e, "failed to discard transaction");
        }

        result
    }
}
