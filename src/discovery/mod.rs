//! SSDP discovery of `ZonePlayer` devices
//!
//! A [`Discovery`] session shares one UDP socket and one search loop between
//! every concurrent [`Discovery::discover_player`] call. The socket is opened
//! by the first call, force-rebound on a fixed interval while calls are
//! pending, and closed when the last call resolves.

pub mod parser;
pub mod scheduler;
mod session;
pub mod socket;
#[cfg(test)]
mod tests;

pub use parser::parse_response;
pub use scheduler::SEARCH_REQUEST;
pub use session::Discovery;

use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::Result;
use crate::types::{DiscoveryRecord, DiscoveryRequest};

/// Device type every accepted response must mention
pub const ZONE_PLAYER_URN: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// SSDP multicast group
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// SSDP port search requests are sent to
pub const SSDP_PORT: u16 = 1900;

/// Local port the discovery socket binds on
pub const LOCAL_PORT: u16 = 1905;

/// Multicast TTL for search requests
pub const MULTICAST_TTL: u32 = 2;

/// Find a single player on a fresh default session
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use zoneplayer_discovery::{DiscoveryRequest, discover_player};
///
/// # async fn example() -> Result<(), zoneplayer_discovery::DiscoveryError> {
/// let request = DiscoveryRequest::household("Sonos_abc123").with_timeout(Duration::from_secs(5));
/// let player = discover_player(request).await?;
/// println!("{} at {}", player.location, player.ip);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns an error if the socket cannot be bound, a search request cannot
/// be sent, or the request's timeout elapses.
pub async fn discover_player(request: DiscoveryRequest) -> Result<DiscoveryRecord> {
    Discovery::with_defaults().discover_player(request).await
}

/// Collect every player that answers within `window` on a fresh default session
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or a search request
/// cannot be sent.
pub async fn scan(window: Duration) -> Result<Vec<DiscoveryRecord>> {
    Discovery::with_defaults().scan(window).await
}
