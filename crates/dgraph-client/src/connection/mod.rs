//! A single connection to one server endpoint.
//!
//! A [`Connection`] pairs an endpoint with a [`DgraphStub`], the seam through
//! which every remote call flows. [`GrpcStub`] is the tonic implementation;
//! tests substitute in-memory stubs.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

use dgraph_proto::api;
use dgraph_proto::DgraphClient;

use super::error::{ClientError, ClientResult};

/// Remote operations of the `api.Dgraph` service.
///
/// `timeout` is the time left before the caller's deadline, if any.
#[tonic::async_trait]
pub trait DgraphStub: Send + Sync + fmt::Debug {
    /// Runs a query.
    async fn query(
        &self,
        request: api::Request,
        timeout: Option<Duration>,
    ) -> Result<api::Response, Status>;

    /// Applies a mutation.
    async fn mutate(
        &self,
        mutation: api::Mutation,
        timeout: Option<Duration>,
    ) -> Result<api::Assigned, Status>;

    /// Runs an administrative operation.
    async fn alter(
        &self,
        operation: api::Operation,
        timeout: Option<Duration>,
    ) -> Result<api::Payload, Status>;

    /// Commits, or aborts when `context.aborted` is set.
    async fn commit_or_abort(
        &self,
        context: api::TxnContext,
        timeout: Option<Duration>,
    ) -> Result<api::TxnContext, Status>;

    /// Returns the server version.
    async fn check_version(&self, timeout: Option<Duration>) -> Result<api::Version, Status>;

    /// Releases transport resources.
    async fn shutdown(&self) -> Result<(), Status> {
        Ok(())
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server URI, e.g. `http://localhost:9080`.
    pub endpoint: String,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// TCP keepalive interval.
    pub tcp_keepalive: Option<Duration>,
    /// Whether to disable Nagle's algorithm.
    pub tcp_nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9080".to_string(),
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: None,
            tcp_nodelay: true,
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the TCP keepalive interval.
    pub fn tcp_keepalive(mut self, keepalive: Option<Duration>) -> Self {
        self.tcp_keepalive = keepalive;
        self
    }

    /// Sets TCP_NODELAY.
    pub fn tcp_nodelay(mut self, nodelay: bool) -> Self {
        self.tcp_nodelay = nodelay;
        self
    }

    fn to_endpoint(&self) -> ClientResult<Endpoint> {
        let endpoint = Endpoint::from_shared(self.endpoint.clone()).map_err(|e| {
            ClientError::InvalidConfig(format!("invalid endpoint {:?}: {}", self.endpoint, e))
        })?;
        Ok(endpoint
            .connect_timeout(self.connect_timeout)
            .tcp_keepalive(self.tcp_keepalive)
            .tcp_nodelay(self.tcp_nodelay))
    }
}

/// [`DgraphStub`] backed by a tonic channel.
///
/// [`shutdown`](DgraphStub::shutdown) drops the stub's channel handle. Calls
/// already in flight hold their own clone until they complete; once the last
/// clone is gone the underlying HTTP/2 connection is closed.
#[derive(Debug)]
pub struct GrpcStub {
    client: RwLock<Option<DgraphClient<Channel>>>,
}

impl GrpcStub {
    /// Wraps an existing channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            client: RwLock::new(Some(DgraphClient::new(channel))),
        }
    }

    fn client(&self) -> Result<DgraphClient<Channel>, Status> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| Status::unavailable("channel was shut down"))
    }
}

fn with_timeout<T>(message: T, timeout: Option<Duration>) -> tonic::Request<T> {
    let mut request = tonic::Request::new(message);
    if let Some(timeout) = timeout {
        request.set_timeout(timeout);
    }
    request
}

#[tonic::async_trait]
impl DgraphStub for GrpcStub {
    async fn query(
        &self,
        request: api::Request,
        timeout: Option<Duration>,
    ) -> Result<api::Response, Status> {
        let response = self.client()?.query(with_timeout(request, timeout)).await?;
        Ok(response.into_inner())
    }

    async fn mutate(
        &self,
        mutation: api::Mutation,
        timeout: Option<Duration>,
    ) -> Result<api::Assigned, Status> {
        let response = self.client()?.mutate(with_timeout(mutation, timeout)).await?;
        Ok(response.into_inner())
    }

    async fn alter(
        &self,
        operation: api::Operation,
        timeout: Option<Duration>,
    ) -> Result<api::Payload, Status> {
        let response = self.client()?.alter(with_timeout(operation, timeout)).await?;
        Ok(response.into_inner())
    }

    async fn commit_or_abort(
        &self,
        context: api::TxnContext,
        timeout: Option<Duration>,
    ) -> Result<api::TxnContext, Status> {
        let response = self
            .client()?
            .commit_or_abort(with_timeout(context, timeout))
            .await?;
        Ok(response.into_inner())
    }

    async fn check_version(&self, timeout: Option<Duration>) -> Result<api::Version, Status> {
        let response = self
            .client()?
            .check_version(with_timeout(api::Check {}, timeout))
            .await?;
        Ok(response.into_inner())
    }

    async fn shutdown(&self) -> Result<(), Status> {
        drop(self.client.write().take());
        Ok(())
    }
}

/// Per-call options attached by the client's selection policy.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Absolute deadline for the call.
    pub deadline: Option<Instant>,
    /// Cancellation signal raced against the call.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// Creates options with no deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a deadline `timeout` from now.
    ///
    /// A timeout too large to represent as an instant leaves the call
    /// unbounded.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    /// Attaches a cancellation token.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Time left before the deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Runs `call` under the deadline and the cancellation token.
    ///
    /// A token that is already cancelled wins before `call` is polled, so no
    /// request is sent.
    pub(crate) async fn run<T, F>(&self, call: F) -> ClientResult<T>
    where
        F: Future<Output = Result<T, Status>>,
    {
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, call)
                    .await
                    .unwrap_or_else(|_| Err(Status::deadline_exceeded("deadline exceeded"))),
                None => call.await,
            }
        };

        let result = match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(ClientError::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        };

        result.map_err(ClientError::Rpc)
    }
}

/// A connection to a single server.
pub struct Connection {
    endpoint: String,
    stub: RwLock<Option<Arc<dyn DgraphStub>>>,
}

impl Connection {
    /// Creates a connection over an existing stub.
    pub fn with_stub(endpoint: impl Into<String>, stub: Arc<dyn DgraphStub>) -> Self {
        Self {
            endpoint: endpoint.into(),
            stub: RwLock::new(Some(stub)),
        }
    }

    /// Creates a connection over an existing channel.
    pub fn from_channel(endpoint: impl Into<String>, channel: Channel) -> Self {
        Self::with_stub(endpoint, Arc::new(GrpcStub::new(channel)))
    }

    /// Connects to the configured endpoint.
    pub async fn connect(config: &ConnectionConfig) -> ClientResult<Self> {
        let channel = config.to_endpoint()?.connect().await?;
        tracing::debug!(endpoint = %config.endpoint, "connected");
        Ok(Self::from_channel(config.endpoint.clone(), channel))
    }

    /// Creates a connection whose channel connects on first use.
    pub fn connect_lazy(config: &ConnectionConfig) -> ClientResult<Self> {
        let channel = config.to_endpoint()?.connect_lazy();
        Ok(Self::from_channel(config.endpoint.clone(), channel))
    }

    /// Returns the endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns true once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.stub.read().is_none()
    }

    /// Shuts the connection down. Closing twice is a no-op.
    pub async fn close(&self) -> ClientResult<()> {
        let stub = self.stub.write().take();
        match stub {
            Some(stub) => {
                tracing::debug!(endpoint = %self.endpoint, "closing connection");
                stub.shutdown().await.map_err(ClientError::Rpc)
            }
            None => Ok(()),
        }
    }

    fn stub(&self) -> ClientResult<Arc<dyn DgraphStub>> {
        self.stub.read().clone().ok_or(ClientError::ConnectionClosed)
    }

    /// Runs a query.
    pub async fn query(
        &self,
        request: api::Request,
        opts: &CallOptions,
    ) -> ClientResult<api::Response> {
        let stub = self.stub()?;
        opts.run(stub.query(request, opts.remaining())).await
    }

    /// Applies a mutation.
    pub async fn mutate(
        &self,
        mutation: api::Mutation,
        opts: &CallOptions,
    ) -> ClientResult<api::Assigned> {
        let stub = self.stub()?;
        opts.run(stub.mutate(mutation, opts.remaining())).await
    }

    /// Runs an administrative operation.
    pub async fn alter(
        &self,
        operation: api::Operation,
        opts: &CallOptions,
    ) -> ClientResult<api::Payload> {
        let stub = self.stub()?;
        opts.run(stub.alter(operation, opts.remaining())).await
    }

    /// Commits or aborts a transaction context.
    pub async fn commit_or_abort(
        &self,
        context: api::TxnContext,
        opts: &CallOptions,
    ) -> ClientResult<api::TxnContext> {
        let stub = self.stub()?;
        opts.run(stub.commit_or_abort(context, opts.remaining()))
            .await
    }

    /// Returns the server version.
    pub async fn check_version(&self, opts: &CallOptions) -> ClientResult<api::Version> {
        let stub = self.stub()?;
        opts.run(stub.check_version(opts.remaining())).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}
