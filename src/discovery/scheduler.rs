//! Periodic search requests

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::error::DiscoveryError;

/// The M-SEARCH datagram sent on every tick
///
/// The `HOST` header carries the literal `reservedSSDPport` placeholder that
/// players have always been sent; they do not inspect it.
pub const SEARCH_REQUEST: &[u8] = b"M-SEARCH * HTTP/1.1\r\n\
HOST: 239.255.255.250:reservedSSDPport\r\n\
MAN: ssdp:discover\r\n\
MX: 1\r\n\
ST: urn:schemas-upnp-org:device:ZonePlayer:1";

/// Drives search requests on a fixed interval
///
/// The first tick completes immediately so a search goes out as soon as the
/// socket is ready.
#[derive(Debug)]
pub struct BroadcastScheduler {
    interval: Interval,
    target: SocketAddr,
    sent: u64,
}

impl BroadcastScheduler {
    /// Create a scheduler sending to `target` every `period`
    #[must_use]
    pub fn new(target: SocketAddr, period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now(), period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            target,
            sent: 0,
        }
    }

    /// Wait until the next search is due
    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Send one search request
    ///
    /// # Errors
    ///
    /// Returns `SendFailed` if the datagram cannot be sent.
    pub async fn send_search(&mut self, socket: &UdpSocket) -> Result<(), DiscoveryError> {
        socket
            .send_to(SEARCH_REQUEST, self.target)
            .await
            .map_err(|e| DiscoveryError::send_failed(self.target, &e))?;
        self.sent += 1;
        debug!("M-SEARCH #{} sent to {}", self.sent, self.target);
        Ok(())
    }

    /// Number of search requests sent so far
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent
    }
}
