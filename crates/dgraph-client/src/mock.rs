//! Scripted in-memory stub for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tonic::Status;

use dgraph_proto::api;

use crate::connection::DgraphStub;

/// Start timestamp handed out when no response is scripted.
pub(crate) const DEFAULT_START_TS: u64 = 10;

/// Builds a transaction context.
pub(crate) fn txn_context(start_ts: u64, lin_read: &[(u32, u64)], keys: &[&str]) -> api::TxnContext {
    api::TxnContext {
        start_ts,
        keys: keys.iter().map(|k| k.to_string()).collect(),
        lin_read: Some(api::LinRead {
            ids: lin_read.iter().copied().collect(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[derive(Debug, Default)]
struct Calls {
    query: usize,
    mutate: usize,
    alter: usize,
    commit: usize,
    abort: usize,
    version: usize,
    shutdown: usize,
}

#[derive(Debug, Default)]
struct MockState {
    delay: Option<Duration>,
    queries: VecDeque<Result<api::Response, Status>>,
    mutations: VecDeque<Result<api::Assigned, Status>>,
    finalizes: VecDeque<Result<api::TxnContext, Status>>,
    alters: VecDeque<Result<api::Payload, Status>>,
    shutdown_error: Option<Status>,
    calls: Calls,
    sent_requests: Vec<api::Request>,
    sent_mutations: Vec<api::Mutation>,
    sent_contexts: Vec<api::TxnContext>,
    last_timeout: Option<Duration>,
}

/// A stub that replays scripted responses and records what it was sent.
#[derive(Debug, Default)]
pub(crate) struct MockStub {
    state: Mutex<MockState>,
}

impl MockStub {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        self.state.lock().delay = Some(delay);
        self
    }

    pub(crate) fn push_query(&self, result: Result<api::Response, Status>) {
        self.state.lock().queries.push_back(result);
    }

    pub(crate) fn push_mutation(&self, result: Result<api::Assigned, Status>) {
        self.state.lock().mutations.push_back(result);
    }

    pub(crate) fn push_finalize(&self, result: Result<api::TxnContext, Status>) {
        self.state.lock().finalizes.push_back(result);
    }

    pub(crate) fn push_alter(&self, result: Result<api::Payload, Status>) {
        self.state.lock().alters.push_back(result);
    }

    pub(crate) fn fail_shutdown(&self, status: Status) {
        self.state.lock().shutdown_error = Some(status);
    }

    pub(crate) fn query_calls(&self) -> usize {
        self.state.lock().calls.query
    }

    pub(crate) fn mutate_calls(&self) -> usize {
        self.state.lock().calls.mutate
    }

    pub(crate) fn alter_calls(&self) -> usize {
        self.state.lock().calls.alter
    }

    pub(crate) fn commit_calls(&self) -> usize {
        self.state.lock().calls.commit
    }

    pub(crate) fn abort_calls(&self) -> usize {
        self.state.lock().calls.abort
    }

    pub(crate) fn shutdown_calls(&self) -> usize {
        self.state.lock().calls.shutdown
    }

    /// Total calls that would have reached a server.
    pub(crate) fn remote_calls(&self) -> usize {
        let state = self.state.lock();
        let calls = &state.calls;
        calls.query + calls.mutate + calls.alter + calls.commit + calls.abort + calls.version
    }

    pub(crate) fn last_timeout(&self) -> Option<Duration> {
        self.state.lock().last_timeout
    }

    pub(crate) fn sent_requests(&self) -> Vec<api::Request> {
        self.state.lock().sent_requests.clone()
    }

    pub(crate) fn sent_mutations(&self) -> Vec<api::Mutation> {
        self.state.lock().sent_mutations.clone()
    }

    pub(crate) fn sent_contexts(&self) -> Vec<api::TxnContext> {
        self.state.lock().sent_contexts.clone()
    }

    async fn pause(&self, timeout: Option<Duration>) {
        let delay = {
            let mut state = self.state.lock();
            state.last_timeout = timeout;
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[tonic::async_trait]
impl DgraphStub for MockStub {
    async fn query(
        &self,
        request: api::Request,
        timeout: Option<Duration>,
    ) -> Result<api::Response, Status> {
        self.pause(timeout).await;
        let mut state = self.state.lock();
        state.calls.query += 1;
        state.sent_requests.push(request);
        state.queries.pop_front().unwrap_or_else(|| {
            Ok(api::Response {
                json: br#"{"q":[]}"#.to_vec(),
                txn: Some(txn_context(DEFAULT_START_TS, &[(1, 1)], &[])),
                ..Default::default()
            })
        })
    }

    async fn mutate(
        &self,
        mutation: api::Mutation,
        timeout: Option<Duration>,
    ) -> Result<api::Assigned, Status> {
        self.pause(timeout).await;
        let mut state = self.state.lock();
        state.calls.mutate += 1;
        state.sent_mutations.push(mutation);
        state.mutations.pop_front().unwrap_or_else(|| {
            Ok(api::Assigned {
                context: Some(txn_context(DEFAULT_START_TS, &[(1, 2)], &["key"])),
                ..Default::default()
            })
        })
    }

    async fn alter(
        &self,
        _operation: api::Operation,
        timeout: Option<Duration>,
    ) -> Result<api::Payload, Status> {
        self.pause(timeout).await;
        let mut state = self.state.lock();
        state.calls.alter += 1;
        state
            .alters
            .pop_front()
            .unwrap_or_else(|| Ok(api::Payload::default()))
    }

    async fn commit_or_abort(
        &self,
        context: api::TxnContext,
        timeout: Option<Duration>,
    ) -> Result<api::TxnContext, Status> {
        self.pause(timeout).await;
        let mut state = self.state.lock();
        if context.aborted {
            state.calls.abort += 1;
        } else {
            state.calls.commit += 1;
        }
        state.sent_contexts.push(context.clone());
        state.finalizes.pop_front().unwrap_or(Ok(context))
    }

    async fn check_version(&self, timeout: Option<Duration>) -> Result<api::Version, Status> {
        self.pause(timeout).await;
        let mut state = self.state.lock();
        state.calls.version += 1;
        Ok(api::Version {
            tag: "v1.0.0-mock".to_string(),
        })
    }

    async fn shutdown(&self) -> Result<(), Status> {
        let mut state = self.state.lock();
        state.calls.shutdown += 1;
        match state.shutdown_error.take() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}
