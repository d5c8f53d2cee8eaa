//! burstd: bulk TCP transfer endpoint.
//!
//!   burstd server [--config PATH]   stream a fixed payload to every client
//!   burstd client [--config PATH]   receive that payload, reconnect forever

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use burst_core::BurstConfig;
use burst_services::{
    ClientSettings, ClientSupervisor, Credentials, LinkManager, ServerSettings, ServerSupervisor,
    TaskPool,
};

mod host_link;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Server,
    Client,
}

#[derive(Debug, PartialEq, Eq)]
enum Invocation {
    Version,
    Run { role: Role, config: Option<PathBuf> },
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Invocation> {
    let mut role = None;
    let mut config = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(Invocation::Version),
            "--config" | "-c" => {
                let path = args.next().context("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "server" => role = Some(Role::Server),
            "client" => role = Some(Role::Client),
            other => bail!("unknown argument '{other}' (expected server|client [--config PATH])"),
        }
    }

    match role {
        Some(role) => Ok(Invocation::Run { role, config }),
        None => bail!("usage: burstd server|client [--config PATH]"),
    }
}

fn load_config(explicit: Option<&PathBuf>) -> BurstConfig {
    let loaded = match explicit {
        Some(path) => BurstConfig::load_from(path),
        None => {
            if let Err(e) = BurstConfig::write_default_if_missing() {
                tracing::warn!(error = %e, "failed to write default config");
            }
            BurstConfig::load()
        }
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        BurstConfig::default()
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (role, config_path) = match parse_args(std::env::args().skip(1))? {
        Invocation::Version => {
            println!("burstd {VERSION}");
            return Ok(());
        }
        Invocation::Run { role, config } => (role, config),
    };
    tracing::info!(?role, version = VERSION, "burstd starting");

    let config = load_config(config_path.as_ref());

    // ── Link ─────────────────────────────────────────────────────────────────
    let credentials = Credentials {
        ssid: config.link.ssid.clone(),
        passphrase: config.link.passphrase.clone(),
    };
    let link = LinkManager::bring_up(
        Arc::new(host_link::HostLink::new()),
        &credentials,
        config.link.static_address.as_ref(),
        config.link.connect_timeout(),
    )
    .await
    .context("network link did not come up")?;

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Supervisor ───────────────────────────────────────────────────────────
    let supervisor_task = match role {
        Role::Server => {
            let settings = ServerSettings::from_config(&config);
            let pool = TaskPool::new(config.server.max_clients);
            let server =
                match ServerSupervisor::bind(&settings, &link.signal(), pool, shutdown_tx.subscribe())
                    .await
                {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(error = %e, "server supervisor failed to start");
                        return Err(e.into());
                    }
                };
            tokio::spawn(async move { server.run().await.map_err(anyhow::Error::from) })
        }
        Role::Client => {
            let settings = ClientSettings::from_config(&config);
            tokio::spawn(
                ClientSupervisor::new(settings, link.signal(), shutdown_tx.subscribe()).run(),
            )
        }
    };

    // ── Wait for exit ────────────────────────────────────────────────────────
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = supervisor_task    => tracing::error!("supervisor exited: {:?}", r),
    }

    Ok(())
}
