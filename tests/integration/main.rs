//! burst integration test harness.
//!
//! Every test runs a real server supervisor and/or client cycles over
//! loopback TCP. Servers bind port 0 so tests never collide.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use burst_core::{ReceivePlan, SendPlan};
use burst_services::{
    ClientSettings, LinkSignal, ServerError, ServerSettings, ServerSupervisor, TaskPool,
};

mod admission;
mod lifecycle;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const REFERENCE_TOTAL: u64 = 100_000;
pub const REFERENCE_CHUNK: usize = 1460;

pub fn send_plan(total_bytes: u64, chunk_size: usize, pacing_ms: u64) -> SendPlan {
    SendPlan {
        total_bytes,
        chunk_size,
        pacing: Duration::from_millis(pacing_ms),
    }
}

pub fn client_settings(server: SocketAddr, total_bytes: u64, idle: Duration) -> ClientSettings {
    ClientSettings {
        server,
        plan: ReceivePlan {
            total_bytes,
            buffer_size: REFERENCE_CHUNK,
            idle_timeout: idle,
        },
        socket_retry: Duration::from_millis(20),
        connect_retry: Duration::from_millis(30),
        cycle_cooldown: Duration::from_millis(20),
        link_timeout: Some(Duration::from_secs(1)),
    }
}

/// A server supervisor running on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub pool: TaskPool,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn start(plan: SendPlan, max_clients: usize) -> Result<Self> {
        let settings = ServerSettings {
            port: 0,
            backlog: 5,
            plan,
            link_timeout: Some(Duration::from_secs(1)),
        };
        let pool = TaskPool::new(max_clients);
        let (shutdown, rx) = broadcast::channel(1);

        let server = ServerSupervisor::bind(&settings, &LinkSignal::connected(), pool.clone(), rx)
            .await
            .context("server bind")?;
        let port = server.local_addr()?.port();
        let task = tokio::spawn(server.run());

        Ok(Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            pool,
            shutdown,
            task,
        })
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.task.await?.context("server run")?;
        Ok(())
    }
}

/// Accepts connections and holds them open without sending anything.
pub async fn silent_server() -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    Ok((addr, task))
}

/// Poll `cond` every 10ms until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
