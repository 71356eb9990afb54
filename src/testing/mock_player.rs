//! Mock `ZonePlayer` for testing purposes.
//!
//! The mock listens on a loopback UDP port and answers every M-SEARCH it
//! receives with a scripted list of response datagrams, sent back to the
//! searching socket in order. Point a session's `search_target` at the mock
//! to run the whole discovery path without hardware.

use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{RwLock, mpsc};

use crate::discovery::ZONE_PLAYER_URN;

/// Build a search response as a `ZonePlayer` would send it
///
/// `uuid` and `household` are left out of the datagram when `None`.
#[must_use]
pub fn response_datagram(uuid: Option<&str>, location: &str, household: Option<&str>) -> Vec<u8> {
    let mut response = String::from("HTTP/1.1 200 OK\r\n");
    response.push_str("CACHE-CONTROL: max-age = 1800\r\n");
    response.push_str("EXT:\r\n");
    let _ = write!(response, "LOCATION: {location}\r\n");
    response.push_str("SERVER: Linux UPnP/1.0 Sonos/70.3-35220 (ZPS9)\r\n");
    let _ = write!(response, "ST: {ZONE_PLAYER_URN}\r\n");
    if let Some(uuid) = uuid {
        let _ = write!(response, "USN: uuid:{uuid}::{ZONE_PLAYER_URN}\r\n");
    }
    if let Some(household) = household {
        let _ = write!(response, "X-RINCON-HOUSEHOLD: {household}\r\n");
    }
    response.push_str("\r\n");
    response.into_bytes()
}

#[derive(Debug, Default)]
struct PlayerState {
    responses: Vec<Vec<u8>>,
    search_sources: Vec<SocketAddr>,
}

/// A loopback responder standing in for one or more players
#[derive(Debug)]
pub struct MockZonePlayer {
    state: Arc<RwLock<PlayerState>>,
    /// Channel to signal shutdown to the responder task.
    shutdown: Option<mpsc::Sender<()>>,
    /// The local address the responder is listening on.
    address: Option<SocketAddr>,
}

impl MockZonePlayer {
    /// Create a mock answering each search with `responses`
    #[must_use]
    pub fn new(responses: Vec<Vec<u8>>) -> Self {
        Self {
            state: Arc::new(RwLock::new(PlayerState {
                responses,
                search_sources: Vec::new(),
            })),
            shutdown: None,
            address: None,
        }
    }

    /// Starts the responder.
    ///
    /// Returns the address search requests should be sent to.
    ///
    /// # Errors
    ///
    /// Returns an error if the UDP socket cannot be bound.
    pub async fn start(&mut self) -> Result<SocketAddr, std::io::Error> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        self.address = Some(addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        self.shutdown = Some(shutdown_tx);

        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                tokio::select! {
                    result = socket.recv_from(&mut buf) => {
                        match result {
                            Ok((len, from)) if buf[..len].starts_with(b"M-SEARCH") => {
                                let responses = {
                                    let mut state = state.write().await;
                                    state.search_sources.push(from);
                                    state.responses.clone()
                                };
                                for response in responses {
                                    if let Err(e) = socket.send_to(&response, from).await {
                                        tracing::warn!("Mock player send error: {}", e);
                                    }
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::debug!("Mock player receive error: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Ok(addr)
    }

    /// Stops the responder.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Returns the address the responder is listening on.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// Replace the scripted responses for subsequent searches
    pub async fn set_responses(&self, responses: Vec<Vec<u8>>) {
        self.state.write().await.responses = responses;
    }

    /// Number of search requests received so far
    pub async fn search_count(&self) -> usize {
        self.state.read().await.search_sources.len()
    }

    /// Source address of every search request received, in arrival order
    pub async fn search_sources(&self) -> Vec<SocketAddr> {
        self.state.read().await.search_sources.clone()
    }
}
