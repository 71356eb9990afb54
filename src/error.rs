use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while discovering players
///
/// Errors are `Clone` because socket faults are broadcast to every pending
/// discovery call through the event bus.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    // ===== Socket Errors =====
    /// The discovery socket could not be created, bound or configured
    #[error("failed to bind discovery socket on {addr}: {message}")]
    BindFailed {
        /// Local address the socket was being bound to
        addr: SocketAddr,
        /// Kind of the underlying I/O error
        kind: io::ErrorKind,
        /// Description of the failure
        message: String,
    },

    /// A search request could not be sent
    #[error("failed to send search request to {target}: {message}")]
    SendFailed {
        /// Destination of the search request
        target: SocketAddr,
        /// Kind of the underlying I/O error
        kind: io::ErrorKind,
        /// Description of the failure
        message: String,
    },

    // ===== Session Errors =====
    /// No matching player answered before the deadline
    #[error("discovery timed out after {duration:?}")]
    Timeout {
        /// The deadline that elapsed
        duration: Duration,
    },

    /// The discovery session was stopped while the call was pending
    #[error("discovery session stopped")]
    Stopped,

    /// The event subscription backing a call was torn down
    #[error("discovery event bus closed")]
    EventBusClosed,

    // ===== Configuration Errors =====
    /// Invalid configuration value
    #[error("invalid configuration: {name} - {message}")]
    InvalidConfig {
        /// The name of the setting
        name: String,
        /// Description of the problem
        message: String,
    },
}

impl DiscoveryError {
    /// Build a [`DiscoveryError::BindFailed`] from an I/O error
    #[must_use]
    pub fn bind_failed(addr: SocketAddr, err: &io::Error) -> Self {
        Self::BindFailed {
            addr,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Build a [`DiscoveryError::SendFailed`] from an I/O error
    #[must_use]
    pub fn send_failed(target: SocketAddr, err: &io::Error) -> Self {
        Self::SendFailed {
            target,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Check if retrying the discovery may succeed
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Stopped => true,
            Self::BindFailed { kind, .. } | Self::SendFailed { kind, .. } => matches!(
                kind,
                io::ErrorKind::AddrInUse
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::NetworkUnreachable
                    | io::ErrorKind::HostUnreachable
            ),
            Self::EventBusClosed | Self::InvalidConfig { .. } => false,
        }
    }

    /// Check if this error was raised by the socket layer
    #[must_use]
    pub fn is_socket_fault(&self) -> bool {
        matches!(self, Self::BindFailed { .. } | Self::SendFailed { .. })
    }
}

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;
