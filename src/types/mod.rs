//! Core types module

mod config;
mod record;
mod request;

pub use config::{DiscoveryConfig, DiscoveryConfigBuilder};
pub use record::DiscoveryRecord;
pub use request::DiscoveryRequest;
