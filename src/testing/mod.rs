//! Test helpers for exercising discovery without real players

pub mod mock_player;

pub use mock_player::{MockZonePlayer, response_datagram};

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::types::{DiscoveryConfig, DiscoveryRecord};

/// Session config that binds on loopback and searches `target`
///
/// Uses an ephemeral local port and short intervals so tests stay fast.
#[must_use]
pub fn loopback_config(target: std::net::SocketAddr) -> DiscoveryConfig {
    DiscoveryConfig::builder()
        .local_addresses([IpAddr::V4(Ipv4Addr::LOCALHOST)])
        .local_port(0)
        .search_target(target)
        .search_interval(Duration::from_millis(50))
        .socket_refresh_interval(Duration::from_millis(250))
        .build()
}

/// Helper to create a `DiscoveryRecord` for testing
#[must_use]
pub fn create_test_record(uuid: &str, ip: Ipv4Addr, household: &str) -> DiscoveryRecord {
    DiscoveryRecord {
        household: Some(household.to_string()),
        location: format!("http://{ip}:1400/xml/device_description.xml"),
        uuid: Some(uuid.to_string()),
        ip: IpAddr::V4(ip),
    }
}
