use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::discovery::{LOCAL_PORT, MULTICAST_TTL, SSDP_MULTICAST_ADDR, SSDP_PORT};
use crate::error::DiscoveryError;

/// Configuration for a discovery session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Local interface addresses to bind on (default: `0.0.0.0`)
    ///
    /// The first address is used when the session starts; each forced
    /// socket refresh moves on to the next one.
    pub local_addresses: Vec<IpAddr>,

    /// Local port to bind on (default: 1905)
    pub local_port: u16,

    /// Destination of search requests (default: `239.255.255.250:1900`)
    pub search_target: SocketAddr,

    /// Multicast time-to-live for search requests (default: 2)
    pub multicast_ttl: u32,

    /// Interval between search requests (default: 1 second)
    pub search_interval: Duration,

    /// Interval between forced socket refreshes (default: 5 seconds)
    pub socket_refresh_interval: Duration,

    /// Deadline for discovery calls that do not set their own (default: none)
    pub default_timeout: Option<Duration>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            local_addresses: vec![IpAddr::V4(Ipv4Addr::UNSPECIFIED)],
            local_port: LOCAL_PORT,
            search_target: SocketAddr::V4(SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT)),
            multicast_ttl: MULTICAST_TTL,
            search_interval: Duration::from_secs(1),
            socket_refresh_interval: Duration::from_secs(5),
            default_timeout: None,
        }
    }
}

impl DiscoveryConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> DiscoveryConfigBuilder {
        DiscoveryConfigBuilder::default()
    }

    /// Check that the configuration can drive a session
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty address list or a zero interval.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.local_addresses.is_empty() {
            return Err(invalid("local_addresses", "must not be empty"));
        }
        if self.search_interval.is_zero() {
            return Err(invalid("search_interval", "must be greater than zero"));
        }
        if self.socket_refresh_interval.is_zero() {
            return Err(invalid(
                "socket_refresh_interval",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Local bind address for the given refresh round
    #[must_use]
    pub fn bind_addr(&self, round: usize) -> SocketAddr {
        let ip = self
            .local_addresses
            .get(round % self.local_addresses.len().max(1))
            .copied()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        SocketAddr::new(ip, self.local_port)
    }
}

fn invalid(name: &str, message: &str) -> DiscoveryError {
    DiscoveryError::InvalidConfig {
        name: name.to_string(),
        message: message.to_string(),
    }
}

/// Builder for `DiscoveryConfig`
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfigBuilder {
    config: DiscoveryConfig,
}

impl DiscoveryConfigBuilder {
    /// Replace the local interface addresses
    #[must_use]
    pub fn local_addresses(mut self, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        self.config.local_addresses = addresses.into_iter().collect();
        self
    }

    /// Set the local port
    #[must_use]
    pub fn local_port(mut self, port: u16) -> Self {
        self.config.local_port = port;
        self
    }

    /// Send search requests somewhere other than the SSDP multicast group
    #[must_use]
    pub fn search_target(mut self, target: SocketAddr) -> Self {
        self.config.search_target = target;
        self
    }

    /// Set the multicast TTL
    #[must_use]
    pub fn multicast_ttl(mut self, ttl: u32) -> Self {
        self.config.multicast_ttl = ttl;
        self
    }

    /// Set the search interval
    #[must_use]
    pub fn search_interval(mut self, interval: Duration) -> Self {
        self.config.search_interval = interval;
        self
    }

    /// Set the socket refresh interval
    #[must_use]
    pub fn socket_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.socket_refresh_interval = interval;
        self
    }

    /// Set the default per-call deadline
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> DiscoveryConfig {
        self.config
    }
}
