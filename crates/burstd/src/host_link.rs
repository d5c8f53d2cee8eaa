//! Link driver for a general-purpose host.
//!
//! On a desktop or server the OS owns association and addressing, so
//! "associate" just discovers the address the kernel would route from.
//! A configured static address is reported as-is.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::mpsc;

use burst_core::StaticAddress;
use burst_services::{Credentials, LinkDriver, LinkError, LinkEvent};

/// Settle time before reporting a failed association, so the manager's
/// immediate retry does not spin.
const ASSOCIATE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// TEST-NET-1 address used only to pick a route; connecting a UDP socket
/// sends nothing.
const ROUTE_PROBE: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 9);

#[derive(Default)]
pub struct HostLink {
    static_address: OnceLock<Option<StaticAddress>>,
    events: OnceLock<mpsc::UnboundedSender<LinkEvent>>,
}

impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&self, event: LinkEvent) -> Result<(), LinkError> {
        let events = self
            .events
            .get()
            .ok_or_else(|| LinkError::Driver("driver not started".into()))?;
        events
            .send(event)
            .map_err(|_| LinkError::Driver("link manager gone".into()))
    }
}

impl LinkDriver for HostLink {
    fn configure(
        &self,
        credentials: &Credentials,
        static_address: Option<&StaticAddress>,
    ) -> Result<(), LinkError> {
        if !credentials.ssid.is_empty() {
            tracing::info!(ssid = %credentials.ssid, "association is managed by the host OS; credentials unused");
        }
        self.static_address
            .set(static_address.copied())
            .map_err(|_| LinkError::Driver("already configured".into()))
    }

    fn start(&self, events: mpsc::UnboundedSender<LinkEvent>) -> Result<(), LinkError> {
        self.events
            .set(events)
            .map_err(|_| LinkError::Driver("already started".into()))?;
        self.emit(LinkEvent::Started)
    }

    fn associate(&self) -> Result<(), LinkError> {
        if let Some(Some(fixed)) = self.static_address.get() {
            return self.emit(LinkEvent::AddressAcquired { address: fixed.ip });
        }

        match route_address(ROUTE_PROBE) {
            Ok(address) => self.emit(LinkEvent::AddressAcquired { address }),
            Err(e) => {
                let events = self
                    .events
                    .get()
                    .cloned()
                    .ok_or_else(|| LinkError::Driver("driver not started".into()))?;
                let reason = format!("no route: {e}");
                tokio::spawn(async move {
                    tokio::time::sleep(ASSOCIATE_RETRY_DELAY).await;
                    let _ = events.send(LinkEvent::Disconnected { reason });
                });
                Ok(())
            }
        }
    }
}

/// Source address the kernel would use to reach `target`.
fn route_address(target: SocketAddr) -> std::io::Result<Ipv4Addr> {
    let probe = UdpSocket::bind("0.0.0.0:0")?;
    probe.connect(target)?;
    match probe.local_addr()?.ip() {
        IpAddr::V4(v4) if !v4.is_unspecified() => Ok(v4),
        other => Err(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("unusable local address {other}"),
        )),
    }
}
