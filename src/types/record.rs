use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A player that answered a search request
///
/// Built once per valid response datagram and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    /// Household the player belongs to (from `X-RINCON-HOUSEHOLD`)
    pub household: Option<String>,

    /// URL of the player's device description (from `LOCATION`)
    pub location: String,

    /// Player identifier mined from the `USN` header
    pub uuid: Option<String>,

    /// Source address of the response datagram
    pub ip: IpAddr,
}

impl DiscoveryRecord {
    /// Key used to tell players apart when collecting several records
    ///
    /// Falls back to the location when the response carried no uuid.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.uuid.as_deref().unwrap_or(&self.location)
    }
}
