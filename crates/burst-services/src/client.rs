//! Client connection supervisor.
//!
//! One cycle = create socket → connect → receive → close. Cycles repeat
//! forever with a cooldown whose length depends on how the cycle ended.
//! Each cycle targets the full byte count regardless of earlier cycles.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpSocket;
use tokio::sync::broadcast;

use burst_core::{BurstConfig, ReceivePlan};

use crate::link::LinkSignal;
use crate::receive::{self, ReceiveReport};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub server: SocketAddr,
    pub plan: ReceivePlan,
    pub socket_retry: Duration,
    pub connect_retry: Duration,
    pub cycle_cooldown: Duration,
    /// `None` = wait for the link forever.
    pub link_timeout: Option<Duration>,
}

impl ClientSettings {
    pub fn from_config(config: &BurstConfig) -> Self {
        let c = &config.client;
        Self {
            server: SocketAddr::from((c.server_addr, c.server_port)),
            plan: ReceivePlan::from(c),
            socket_retry: c.socket_retry(),
            connect_retry: c.connect_retry(),
            cycle_cooldown: c.cycle_cooldown(),
            link_timeout: config.link.connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    SocketFailed(io::ErrorKind),
    ConnectFailed(io::ErrorKind),
    /// Connected; the report says how the transfer ended.
    Completed(ReceiveReport),
}

impl CycleOutcome {
    /// Pause before the next cycle.
    pub fn cooldown(&self, settings: &ClientSettings) -> Duration {
        match self {
            CycleOutcome::SocketFailed(_) => settings.socket_retry,
            CycleOutcome::ConnectFailed(_) => settings.connect_retry,
            CycleOutcome::Completed(_) => settings.cycle_cooldown,
        }
    }
}

pub struct ClientSupervisor {
    settings: ClientSettings,
    link: LinkSignal,
    shutdown: broadcast::Receiver<()>,
}

impl ClientSupervisor {
    pub fn new(settings: ClientSettings, link: LinkSignal, shutdown: broadcast::Receiver<()>) -> Self {
        Self {
            settings,
            link,
            shutdown,
        }
    }

    /// Reconnect loop. Returns only on shutdown or if the link never comes up.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.link
            .wait_connected(self.settings.link_timeout)
            .await
            .context("link never came up")?;

        tracing::info!(server = %self.settings.server, target = self.settings.plan.total_bytes, "client starting");

        let mut attempt = 0u64;
        loop {
            attempt += 1;
            let outcome = tokio::select! {
                _ = self.shutdown.recv() => break,
                outcome = run_cycle(&self.settings) => outcome,
            };

            let pause = outcome.cooldown(&self.settings);
            tracing::debug!(attempt, ?outcome, pause_ms = pause.as_millis() as u64, "cycle finished");

            tokio::select! {
                _ = self.shutdown.recv() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!(attempts = attempt, "client supervisor shutting down");
        Ok(())
    }
}

/// One connect-and-receive cycle. The socket is closed before returning.
pub async fn run_cycle(settings: &ClientSettings) -> CycleOutcome {
    let socket = match settings.server {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    };
    let socket = match socket {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "socket() failed");
            return CycleOutcome::SocketFailed(e.kind());
        }
    };

    tracing::info!(server = %settings.server, "connecting");
    let mut stream = match socket.connect(settings.server).await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(server = %settings.server, error = %e, "connect failed");
            return CycleOutcome::ConnectFailed(e.kind());
        }
    };

    tracing::info!(server = %settings.server, "connected, receiving");
    let report = receive::receive(&mut stream, &settings.plan).await;

    if let Err(e) = stream.shutdown().await {
        tracing::debug!(error = %e, "shutdown after receive failed");
    }
    drop(stream);

    tracing::info!(
        received = report.received,
        target = report.target,
        outcome = ?report.outcome,
        "disconnected"
    );
    CycleOutcome::Completed(report)
}
