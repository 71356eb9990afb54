//! # zoneplayer-discovery
//!
//! Find `ZonePlayer` audio players on the local network with SSDP.
//!
//! ## Features
//!
//! - One shared UDP socket and search loop for any number of concurrent lookups
//! - Per-lookup filters on player uuid and household
//! - Forced periodic socket rebinding to survive flaky multicast stacks
//! - Optional per-lookup deadlines
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use zoneplayer_discovery::{Discovery, DiscoveryConfig, DiscoveryRequest};
//!
//! # async fn example() -> Result<(), zoneplayer_discovery::DiscoveryError> {
//! let discovery = Discovery::new(DiscoveryConfig::default());
//!
//! let player = discovery
//!     .discover_player(DiscoveryRequest::any().with_timeout(Duration::from_secs(5)))
//!     .await?;
//!
//! // Hand the description URL to whatever speaks to the player
//! println!("{} at {}", player.location, player.ip);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Session**: [`Discovery`] counts pending lookups and owns the socket
//! - **Socket**: `discovery::socket` binds, refreshes and closes the socket
//! - **Scheduler**: `discovery::scheduler` sends the M-SEARCH on each tick
//! - **Parser**: `discovery::parser` turns responses into [`DiscoveryRecord`]s
//! - **Events**: [`EventBus`] carries `found` and `error` events to lookups

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Error types
pub mod error;
/// Discovery events
pub mod state;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

pub mod discovery;

// Re-exports
pub use discovery::{Discovery, discover_player, scan};
pub use error::DiscoveryError;
pub use state::{DiscoveryEvent, EventBus, EventKind, Subscription};
pub use types::{DiscoveryConfig, DiscoveryRecord, DiscoveryRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        Discovery, DiscoveryConfig, DiscoveryError, DiscoveryEvent, DiscoveryRecord,
        DiscoveryRequest, discover_player, scan,
    };
}
