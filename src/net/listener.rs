//! Listener set: the plaintext and optional TLS servers sharing one handler.
//!
//! # Responsibilities
//! - Bind each configured address (bind errors are startup errors)
//! - Run each accept loop on its own supervised task
//! - Report unrequested terminations through the termination funnel
//! - Stop listeners cooperatively against a shared deadline

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::lifecycle::funnel::{FunnelSender, TerminationFunnel};
use crate::lifecycle::startup::StartupError;
use crate::net::tls::{load_tls_config, TlsMaterial};
use crate::observability::metrics;

/// Wire protocol a listener speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Plain,
    Tls,
}

impl Protocol {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Plain => "plain",
            Protocol::Tls => "tls",
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Plain => "http",
            Protocol::Tls => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a started listener: its protocol and bound address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    protocol: Protocol,
    addr: SocketAddr,
}

impl ListenerId {
    pub fn new(protocol: Protocol, addr: SocketAddr) -> Self {
        Self { protocol, addr }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.protocol.scheme(), self.addr)
    }
}

/// What to start: protocol, bind address and, for TLS, the material to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    protocol: Protocol,
    bind: SocketAddr,
    tls: Option<TlsMaterial>,
}

impl ListenerSpec {
    pub fn plain(bind: SocketAddr) -> Self {
        Self {
            protocol: Protocol::Plain,
            bind,
            tls: None,
        }
    }

    pub fn tls(bind: SocketAddr, material: TlsMaterial) -> Self {
        Self {
            protocol: Protocol::Tls,
            bind,
            tls: Some(material),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn bind(&self) -> SocketAddr {
        self.bind
    }

    pub fn tls_material(&self) -> Option<&TlsMaterial> {
        self.tls.as_ref()
    }
}

/// Runtime failure of a running listener.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("listener I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("listener exited without being asked to stop")]
    UnexpectedExit,
}

/// Failure to stop a listener cleanly.
#[derive(Debug, thiserror::Error)]
pub enum StopError {
    #[error("grace period expired with {open_connections} connection(s) still open, forced closure")]
    DeadlineExceeded { open_connections: usize },
    #[error("listener failed while draining: {0}")]
    Serve(#[source] ServeError),
    #[error("listener task panicked: {0}")]
    Panicked(String),
}

/// Result of stopping one listener.
#[derive(Debug)]
pub struct StopOutcome {
    pub listener: ListenerId,
    pub result: Result<(), StopError>,
}

enum TaskExit {
    /// Failure already pushed to the funnel.
    Reported,
    /// Serve loop returned after a stop request.
    Stopped(Result<(), ServeError>),
}

/// One running listener bound to the shared handler.
///
/// Never restarted: `stop` consumes the instance.
pub struct ServerInstance {
    id: ListenerId,
    handle: Handle,
    stop_requested: Arc<AtomicBool>,
    task: JoinHandle<TaskExit>,
}

impl ServerInstance {
    /// Bind the listener address and start serving `handler` on it.
    pub async fn start(
        spec: &ListenerSpec,
        handler: Router,
        funnel: &TerminationFunnel,
    ) -> Result<Self, StartupError> {
        // Load TLS before binding so bad material never holds a port.
        let rustls = match spec.tls_material() {
            Some(material) => Some(load_tls_config(material).await.map_err(|source| {
                StartupError::Tls {
                    cert_path: material.cert_path.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let bind_error = |source: std::io::Error| StartupError::Bind {
            addr: spec.bind(),
            source,
        };
        let listener = TcpListener::bind(spec.bind()).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        let std_listener = listener.into_std().map_err(bind_error)?;

        let id = ListenerId::new(spec.protocol(), local_addr);
        let handle = Handle::new();
        let app = handler.into_make_service();
        let sender = funnel.sender(id);

        let instance = match rustls {
            Some(rustls) => {
                let server = axum_server::from_tcp_rustls(std_listener, rustls).handle(handle.clone());
                Self::supervise(id, handle, async move { server.serve(app).await }, sender)
            }
            None => {
                let server = axum_server::from_tcp(std_listener).handle(handle.clone());
                Self::supervise(id, handle, async move { server.serve(app).await }, sender)
            }
        };

        Ok(instance)
    }

    /// Run `serve` as a supervised listener task.
    ///
    /// If `serve` returns before `stop` was called, the outcome is pushed to
    /// the funnel exactly once. `handle` must be the handle `serve` observes
    /// for shutdown.
    pub fn supervise<F>(id: ListenerId, handle: Handle, serve: F, funnel: FunnelSender) -> Self
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        let stop_requested = Arc::new(AtomicBool::new(false));
        let stopping = Arc::clone(&stop_requested);

        let task = tokio::spawn(async move {
            let _running = metrics::RunningListener::new(id.protocol());
            let result = serve.await;

            if stopping.load(Ordering::SeqCst) {
                return TaskExit::Stopped(result.map_err(ServeError::Io));
            }

            let error = match result {
                Ok(()) => ServeError::UnexpectedExit,
                Err(e) => ServeError::Io(e),
            };
            tracing::error!(listener = %id, error = %error, "Listener terminated");
            metrics::record_listener_failure(id.protocol());
            funnel.report(error);
            TaskExit::Reported
        });

        tracing::info!(listener = %id, "Listener started");
        metrics::record_listener_started(id.protocol());

        Self {
            id,
            handle,
            stop_requested,
            task,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Whether the accept loop is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop accepting, drain in-flight connections until `deadline`, then
    /// force-close whatever is left.
    ///
    /// A listener that already failed has nothing left to drain; stopping it
    /// succeeds immediately.
    pub async fn stop(self, deadline: Instant) -> Result<(), StopError> {
        let Self {
            id,
            handle,
            stop_requested,
            mut task,
        } = self;

        stop_requested.store(true, Ordering::SeqCst);
        handle.graceful_shutdown(None);
        tracing::debug!(listener = %id, connections = handle.connection_count(), "Draining listener");

        let result = match tokio::time::timeout_at(deadline, &mut task).await {
            Ok(Ok(TaskExit::Reported)) => Ok(()),
            Ok(Ok(TaskExit::Stopped(result))) => result.map_err(StopError::Serve),
            Ok(Err(e)) => Err(StopError::Panicked(e.to_string())),
            Err(_) => {
                let open_connections = handle.connection_count();
                handle.shutdown();
                task.abort();
                let _ = task.await;
                Err(StopError::DeadlineExceeded { open_connections })
            }
        };

        match &result {
            Ok(()) => tracing::info!(listener = %id, "Listener stopped"),
            Err(e) => tracing::error!(listener = %id, error = %e, "Listener forced to shutdown"),
        }
        result
    }
}

impl std::fmt::Debug for ServerInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerInstance")
            .field("id", &self.id)
            .field("running", &self.is_running())
            .finish()
    }
}

/// The started listeners, at most one per protocol.
#[derive(Debug, Default)]
pub struct ListenerSet {
    instances: Vec<ServerInstance>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a listener for `spec`. Fails if that protocol is already running.
    pub async fn start(
        &mut self,
        spec: &ListenerSpec,
        handler: Router,
        funnel: &TerminationFunnel,
    ) -> Result<ListenerId, StartupError> {
        self.ensure_vacant(spec.protocol())?;
        let instance = ServerInstance::start(spec, handler, funnel).await?;
        Ok(self.push(instance))
    }

    /// Supervise an arbitrary serve future as the listener `id`.
    pub fn supervise<F>(
        &mut self,
        id: ListenerId,
        handle: Handle,
        serve: F,
        funnel: &TerminationFunnel,
    ) -> Result<ListenerId, StartupError>
    where
        F: Future<Output = std::io::Result<()>> + Send + 'static,
    {
        self.ensure_vacant(id.protocol())?;
        let instance = ServerInstance::supervise(id, handle, serve, funnel.sender(id));
        Ok(self.push(instance))
    }

    fn ensure_vacant(&self, protocol: Protocol) -> Result<(), StartupError> {
        if self.get(protocol).is_some() {
            return Err(StartupError::DuplicateListener(protocol));
        }
        Ok(())
    }

    fn push(&mut self, instance: ServerInstance) -> ListenerId {
        let id = instance.id();
        self.instances.push(instance);
        id
    }

    pub fn get(&self, protocol: Protocol) -> Option<&ServerInstance> {
        self.instances.iter().find(|i| i.id().protocol() == protocol)
    }

    pub fn ids(&self) -> Vec<ListenerId> {
        self.instances.iter().map(ServerInstance::id).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Stop every listener in parallel against one shared deadline.
    pub async fn stop_all(self, grace_period: Duration) -> Vec<StopOutcome> {
        let deadline = deadline_after(grace_period);
        join_all(self.instances.into_iter().map(|instance| async move {
            let listener = instance.id();
            StopOutcome {
                listener,
                result: instance.stop(deadline).await,
            }
        }))
        .await
    }
}

/// Roughly 30 years; stands in for a deadline too far out to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + grace_period`, saturating instead of overflowing `Instant`.
fn deadline_after(grace_period: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(grace_period).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn loopback() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 0))
    }

    fn app() -> Router {
        Router::new().route("/", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn start_binds_ephemeral_port() {
        let funnel = TerminationFunnel::new();
        let mut set = ListenerSet::new();

        let id = set.start(&ListenerSpec::plain(loopback()), app(), &funnel).await.unwrap();
        assert_eq!(id.protocol(), Protocol::Plain);
        assert_ne!(id.addr().port(), 0);
        assert!(tokio::net::TcpStream::connect(id.addr()).await.is_ok());

        let outcomes = set.stop_all(Duration::from_secs(1)).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
    }

    #[tokio::test]
    async fn bind_conflict_is_startup_error() {
        let funnel = TerminationFunnel::new();
        let taken = TcpListener::bind(loopback()).await.unwrap();
        let addr = taken.local_addr().unwrap();

        let err = ServerInstance::start(&ListenerSpec::plain(addr), app(), &funnel)
            .await
            .unwrap_err();
        assert!(matches!(err, StartupError::Bind { addr: a, .. } if a == addr));
    }

    #[tokio::test]
    async fn second_listener_of_same_protocol_rejected() {
        let funnel = TerminationFunnel::new();
        let mut set = ListenerSet::new();
        set.start(&ListenerSpec::plain(loopback()), app(), &funnel).await.unwrap();

        let err = set
            .start(&ListenerSpec::plain(loopback()), app(), &funnel)
            .await
            .unwrap_err();
        assert!(matches!(err, StartupError::DuplicateListener(Protocol::Plain)));
        assert_eq!(set.len(), 1);

        set.stop_all(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn unrequested_exit_is_reported_once() {
        let mut funnel = TerminationFunnel::new();
        let id = ListenerId::new(Protocol::Plain, loopback());
        let instance = ServerInstance::supervise(id, Handle::new(), async { Ok(()) }, funnel.sender(id));

        let event = funnel.recv().await;
        assert_eq!(event.source, id);
        assert!(matches!(event.error, ServeError::UnexpectedExit));

        // Stopping an already failed listener is a no-op.
        let deadline = Instant::now() + Duration::from_secs(1);
        assert!(instance.stop(deadline).await.is_ok());
        assert!(funnel.drain().is_empty());
    }

    #[tokio::test]
    async fn cooperative_stop_is_not_reported() {
        let mut funnel = TerminationFunnel::new();
        let mut set = ListenerSet::new();
        let id = set.start(&ListenerSpec::plain(loopback()), app(), &funnel).await.unwrap();
        assert!(set.get(Protocol::Plain).unwrap().is_running());

        let outcomes = set.stop_all(Duration::from_secs(1)).await;
        assert_eq!(outcomes[0].listener, id);
        assert!(outcomes[0].result.is_ok());
        assert!(funnel.drain().is_empty());
        assert!(tokio::net::TcpStream::connect(id.addr()).await.is_err());
    }

    #[tokio::test]
    async fn stuck_listener_is_forced_at_deadline() {
        let funnel = TerminationFunnel::new();
        let mut set = ListenerSet::new();
        let id = ListenerId::new(Protocol::Plain, loopback());
        set.supervise(id, Handle::new(), std::future::pending(), &funnel).unwrap();

        let outcomes = set.stop_all(Duration::from_millis(50)).await;
        assert!(matches!(
            outcomes[0].result,
            Err(StopError::DeadlineExceeded { .. })
        ));
    }

    #[test]
    fn unrepresentable_grace_period_saturates() {
        let before = Instant::now();
        let deadline = deadline_after(Duration::from_secs(i64::MAX as u64));
        assert!(deadline >= before + FAR_FUTURE);
        assert!(deadline_after(Duration::MAX) > before);
    }

    #[tokio::test]
    async fn stop_all_survives_huge_grace_period() {
        let funnel = TerminationFunnel::new();
        let mut set = ListenerSet::new();
        set.start(&ListenerSpec::plain(loopback()), app(), &funnel).await.unwrap();

        let outcomes = set.stop_all(Duration::from_secs(i64::MAX as u64)).await;
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].result.is_ok());
    }

    #[test]
    fn listener_id_display_uses_scheme() {
        let addr = SocketAddr::from(([127, 0, 0, 1], 8443));
        assert_eq!(ListenerId::new(Protocol::Tls, addr).to_string(), "https://127.0.0.1:8443");
        assert_eq!(ListenerId::new(Protocol::Plain, addr).to_string(), "http://127.0.0.1:8443");
    }
}
