//! Link manager: keeps the station associated and publishes a single
//! connected/disconnected signal.
//!
//! The radio (or host OS) is behind [`LinkDriver`]. The manager reacts to
//! three driver events:
//!   Started          → start association
//!   Disconnected     → clear the signal, re-associate immediately
//!   AddressAcquired  → set the signal
//!
//! Re-association has no backoff and no attempt limit. Transfer engines do
//! not watch the signal; a link drop mid-transfer surfaces as a socket error.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use burst_core::StaticAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

/// Events reported by a [`LinkDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Interface is up and ready to associate.
    Started,
    /// Association lost or failed.
    Disconnected { reason: String },
    /// Address assigned (DHCP lease or static).
    AddressAcquired { address: Ipv4Addr },
}

/// Network credentials. `Debug` never prints the passphrase.
#[derive(Clone, Default)]
pub struct Credentials {
    pub ssid: String,
    pub passphrase: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("link driver failed: {0}")]
    Driver(String),
    #[error("link not connected after {0:?}")]
    Timeout(Duration),
    #[error("link signal closed")]
    Closed,
}

/// Link-layer connection manager consumed by [`LinkManager`].
///
/// All methods only initiate work; results arrive later as [`LinkEvent`]s
/// on the channel handed to `start`.
pub trait LinkDriver: Send + Sync {
    fn configure(
        &self,
        credentials: &Credentials,
        static_address: Option<&StaticAddress>,
    ) -> Result<(), LinkError>;

    fn start(&self, events: mpsc::UnboundedSender<LinkEvent>) -> Result<(), LinkError>;

    fn associate(&self) -> Result<(), LinkError>;
}

/// Observable connected/disconnected cell. Cheap to clone; all clones
/// observe the same state.
#[derive(Debug, Clone)]
pub struct LinkSignal {
    tx: Arc<watch::Sender<LinkState>>,
}

impl LinkSignal {
    /// Starts disconnected.
    pub fn new() -> Self {
        Self::with_state(LinkState::Disconnected)
    }

    /// Starts connected, for hosts where the link is managed elsewhere.
    pub fn connected() -> Self {
        Self::with_state(LinkState::Connected)
    }

    fn with_state(state: LinkState) -> Self {
        let (tx, _) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Returns the previous state.
    pub fn set(&self, state: LinkState) -> LinkState {
        self.tx.send_replace(state)
    }

    pub fn state(&self) -> LinkState {
        *self.tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Wait until connected. `None` waits forever.
    pub async fn wait_connected(&self, timeout: Option<Duration>) -> Result<(), LinkError> {
        let mut rx = self.tx.subscribe();
        let wait = async move {
            rx.wait_for(|s| *s == LinkState::Connected)
                .await
                .map(|_| ())
                .map_err(|_| LinkError::Closed)
        };
        match timeout {
            None => wait.await,
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| LinkError::Timeout(limit))?,
        }
    }
}

impl Default for LinkSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the event loop and the link signal. Dropping it stops reacting to
/// driver events; the last published state stays visible to clones.
pub struct LinkManager {
    signal: LinkSignal,
    events_task: JoinHandle<()>,
}

impl LinkManager {
    /// Configure and start the driver, then wait for the first address.
    pub async fn bring_up(
        driver: Arc<dyn LinkDriver>,
        credentials: &Credentials,
        static_address: Option<&StaticAddress>,
        timeout: Option<Duration>,
    ) -> Result<Self, LinkError> {
        driver.configure(credentials, static_address)?;

        let signal = LinkSignal::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let events_task = tokio::spawn(event_loop(driver.clone(), signal.clone(), events_rx));
        // From here on the manager owns the task; dropping it on error aborts it.
        let manager = Self {
            signal,
            events_task,
        };

        tracing::info!(ssid = %credentials.ssid, static_ip = ?static_address.map(|s| s.ip), "connecting to network");
        driver.start(events_tx)?;
        manager.signal.wait_connected(timeout).await?;

        Ok(manager)
    }

    pub fn signal(&self) -> LinkSignal {
        self.signal.clone()
    }
}

impl Drop for LinkManager {
    fn drop(&mut self) {
        self.events_task.abort();
    }
}

async fn event_loop(
    driver: Arc<dyn LinkDriver>,
    signal: LinkSignal,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
) {
    while let Some(event) = events.recv().await {
        handle_event(driver.as_ref(), &signal, event);
    }
    tracing::debug!("link driver dropped its event channel");
}

/// Apply one driver event to the signal.
pub fn handle_event(driver: &dyn LinkDriver, signal: &LinkSignal, event: LinkEvent) {
    match event {
        LinkEvent::Started => {
            tracing::debug!("link started, associating");
            associate(driver);
        }
        LinkEvent::Disconnected { reason } => {
            tracing::warn!(%reason, "link disconnected, reconnecting");
            signal.set(LinkState::Disconnected);
            associate(driver);
        }
        LinkEvent::AddressAcquired { address } => {
            let previous = signal.set(LinkState::Connected);
            if previous == LinkState::Connected {
                tracing::debug!(%address, "address renewed");
            } else {
                tracing::info!(%address, "link connected");
            }
        }
    }
}

fn associate(driver: &dyn LinkDriver) {
    if let Err(e) = driver.associate() {
        tracing::error!(error = %e, "association request failed");
    }
}
