//! Discovery socket lifecycle
//!
//! One driver task owns the UDP socket together with the search and refresh
//! timers. Multicast sockets on some platforms silently stop receiving after
//! a while, so the driver closes and rebinds the socket on every refresh
//! tick whether or not it still looks healthy.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::parser::parse_response;
use super::scheduler::BroadcastScheduler;
use crate::error::DiscoveryError;
use crate::state::{DiscoveryEvent, EventBus};
use crate::types::DiscoveryConfig;

/// Receive buffer size; SSDP responses fit in a single Ethernet frame
const RECV_BUFFER_SIZE: usize = 2048;

/// Called once by the driver when the socket faults
pub type FaultHook = Box<dyn FnOnce(DiscoveryError) + Send + Sync + 'static>;

/// Create a UDP socket bound on `bind_addr` for SSDP search traffic
///
/// # Errors
///
/// Returns `BindFailed` if the socket cannot be created, bound or configured.
pub fn create_socket(
    bind_addr: SocketAddr,
    ttl: u32,
) -> Result<std::net::UdpSocket, DiscoveryError> {
    let bind_err = |e: io::Error| DiscoveryError::bind_failed(bind_addr, &e);

    let socket = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&bind_addr.into()).map_err(bind_err)?;

    if bind_addr.is_ipv4() {
        socket.set_multicast_ttl_v4(ttl).map_err(bind_err)?;
    } else {
        socket.set_multicast_hops_v6(ttl).map_err(bind_err)?;
    }

    socket.set_nonblocking(true).map_err(bind_err)?;

    Ok(socket.into())
}

fn bind_tokio_socket(bind_addr: SocketAddr, ttl: u32) -> Result<UdpSocket, DiscoveryError> {
    let socket = create_socket(bind_addr, ttl)?;
    UdpSocket::from_std(socket).map_err(|e| DiscoveryError::bind_failed(bind_addr, &e))
}

/// Owns the discovery socket and its timers
///
/// At most one socket exists per manager. Starting an already running
/// manager is a no-op, as is stopping an idle one.
#[derive(Debug)]
pub struct SocketManager {
    config: Arc<DiscoveryConfig>,
    bus: EventBus,
    active: Option<ActiveSocket>,
}

#[derive(Debug)]
struct ActiveSocket {
    shutdown: CancellationToken,
    local_addr: SocketAddr,
}

impl SocketManager {
    /// Create an idle manager publishing records on `bus`
    #[must_use]
    pub fn new(config: Arc<DiscoveryConfig>, bus: EventBus) -> Self {
        Self {
            config,
            bus,
            active: None,
        }
    }

    /// Bind the socket and spawn the driver task
    ///
    /// The first search request goes out as soon as the driver runs. Faults
    /// after this call returns (a failed rebind or send) stop the driver and
    /// are handed to `on_fault`.
    ///
    /// Returns the address the socket was first bound to.
    ///
    /// # Errors
    ///
    /// Returns `BindFailed` if the initial socket cannot be bound.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&mut self, on_fault: FaultHook) -> Result<SocketAddr, DiscoveryError> {
        if let Some(active) = &self.active {
            return Ok(active.local_addr);
        }

        let bind_addr = self.config.bind_addr(0);
        let socket = bind_tokio_socket(bind_addr, self.config.multicast_ttl)?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| DiscoveryError::bind_failed(bind_addr, &e))?;

        let shutdown = CancellationToken::new();
        let driver = Driver {
            config: Arc::clone(&self.config),
            bus: self.bus.clone(),
            shutdown: shutdown.clone(),
            on_fault,
        };
        tokio::spawn(driver.run(socket));

        info!("Discovery socket bound on {}", local_addr);
        self.active = Some(ActiveSocket {
            shutdown,
            local_addr,
        });

        Ok(local_addr)
    }

    /// Cancel both timers and close the socket
    ///
    /// Returns `false` if the manager was not running.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        active.shutdown.cancel();
        info!("Discovery socket on {} stopped", active.local_addr);
        true
    }

    /// Whether a socket is currently active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Address the active socket was first bound to
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.active.as_ref().map(|active| active.local_addr)
    }
}

impl Drop for SocketManager {
    fn drop(&mut self) {
        self.stop();
    }
}

enum Action {
    Shutdown,
    Refresh,
    Search,
    Received(io::Result<(usize, SocketAddr)>),
}

struct Driver {
    config: Arc<DiscoveryConfig>,
    bus: EventBus,
    shutdown: CancellationToken,
    on_fault: FaultHook,
}

impl Driver {
    async fn run(self, mut socket: UdpSocket) {
        let mut scheduler =
            BroadcastScheduler::new(self.config.search_target, self.config.search_interval);

        let period = self.config.socket_refresh_interval;
        let mut refresh = tokio::time::interval_at(Instant::now() + period, period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut round = 0;
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        loop {
            let action = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => Action::Shutdown,
                _ = refresh.tick() => Action::Refresh,
                () = scheduler.tick() => Action::Search,
                received = socket.recv_from(&mut buf) => Action::Received(received),
            };

            match action {
                Action::Shutdown => break,
                Action::Refresh => {
                    drop(socket);
                    round += 1;
                    let bind_addr = self.config.bind_addr(round);
                    socket = match bind_tokio_socket(bind_addr, self.config.multicast_ttl) {
                        Ok(socket) => socket,
                        Err(e) => return self.fault(e),
                    };
                    debug!("Discovery socket refreshed on {}", bind_addr);
                }
                Action::Search => {
                    if let Err(e) = scheduler.send_search(&socket).await {
                        drop(socket);
                        return self.fault(e);
                    }
                }
                Action::Received(Ok((len, from))) => self.handle_datagram(&buf[..len], from),
                Action::Received(Err(e)) => {
                    warn!("Discovery socket receive error: {}", e);
                }
            }
        }

        debug!(
            "Discovery driver exiting after {} search requests",
            scheduler.sent()
        );
    }

    fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) {
        let Some(record) = parse_response(datagram, from.ip()) else {
            trace!("Discarded {} byte datagram from {}", datagram.len(), from);
            return;
        };

        debug!(
            "Found player {:?} at {} ({})",
            record.uuid, record.ip, record.location
        );
        self.bus.publish(&DiscoveryEvent::Found(record));
    }

    fn fault(self, err: DiscoveryError) {
        if self.shutdown.is_cancelled() {
            debug!("Ignoring fault on stopped discovery socket: {}", err);
            return;
        }
        warn!("Discovery socket fault: {}", err);
        (self.on_fault)(err);
    }
}
