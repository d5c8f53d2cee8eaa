//! Server connection supervisor.
//!
//! Owns the listening socket. Every accepted connection gets its own unit
//! in the [`TaskPool`] running the send engine; the accept loop never
//! waits on a transfer. When the pool refuses a unit the connection is
//! closed on the spot.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use burst_core::{BurstConfig, SendPlan};

use crate::link::{LinkError, LinkSignal};
use crate::pool::TaskPool;
use crate::send;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// 0 = OS-assigned.
    pub port: u16,
    pub backlog: u32,
    pub plan: SendPlan,
    /// How long to wait for the link before giving up. `None` = forever.
    pub link_timeout: Option<Duration>,
}

impl ServerSettings {
    pub fn from_config(config: &BurstConfig) -> Self {
        Self {
            port: config.server.port,
            backlog: config.server.backlog,
            plan: SendPlan::from(&config.server),
            link_timeout: config.link.connect_timeout(),
        }
    }
}

/// Listener setup failures. All of them end the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("link unavailable: {0}")]
    Link(#[from] LinkError),
    #[error("socket() failed: {0}")]
    Socket(#[source] std::io::Error),
    #[error("bind to port {port} failed: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("listen() failed: {0}")]
    Listen(#[source] std::io::Error),
}

pub struct ServerSupervisor {
    listener: TcpListener,
    plan: SendPlan,
    pool: TaskPool,
    shutdown: broadcast::Receiver<()>,
}

impl ServerSupervisor {
    /// Wait for the link, then create, bind, and listen.
    pub async fn bind(
        settings: &ServerSettings,
        link: &LinkSignal,
        pool: TaskPool,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<Self, ServerError> {
        link.wait_connected(settings.link_timeout).await?;

        let listener = open_listener(settings.port, settings.backlog)?;
        let port = listener.local_addr().map(|a| a.port()).unwrap_or(settings.port);
        tracing::info!(
            port,
            backlog = settings.backlog,
            total_bytes = settings.plan.total_bytes,
            chunk_size = settings.plan.chunk_size,
            max_clients = ?pool.limit(),
            "server listening"
        );

        Ok(Self {
            listener,
            plan: settings.plan,
            pool,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever. Returns only on shutdown; in-flight transfers keep
    /// running to completion.
    pub async fn run(mut self) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(active = self.pool.active(), "server supervisor shutting down");
                    return Ok(());
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.admit(stream, peer),
                        Err(e) => tracing::warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        tracing::info!(%peer, active = self.pool.active(), "client connected");

        let unit = format!("client-{peer}");
        if let Err(e) = self.pool.spawn(&unit, handle_client(stream, peer, self.plan)) {
            // The unstarted handler owned the stream; dropping it closed the socket.
            tracing::warn!(%peer, error = %e, "no unit for client, connection dropped");
        }
    }
}

async fn handle_client(mut stream: TcpStream, peer: SocketAddr, plan: SendPlan) {
    let report = send::serve(&mut stream, &plan).await;
    drop(stream);
    tracing::info!(
        %peer,
        sent = report.sent,
        target = report.target,
        outcome = ?report.outcome,
        "client disconnected"
    );
}

/// socket → SO_REUSEADDR → bind 0.0.0.0:port → listen(backlog).
fn open_listener(port: u16, backlog: u32) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
        .map_err(ServerError::Socket)?;

    if let Err(e) = socket.set_reuse_address(true) {
        tracing::warn!(error = %e, "SO_REUSEADDR not applied");
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket
        .bind(&addr.into())
        .map_err(|source| ServerError::Bind { port, source })?;

    let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
    socket.listen(backlog).map_err(ServerError::Listen)?;
    socket.set_nonblocking(true).map_err(ServerError::Listen)?;

    TcpListener::from_std(socket.into()).map_err(ServerError::Listen)
}
