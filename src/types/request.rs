use std::time::Duration;

use super::DiscoveryRecord;

/// Filter for a single discovery call
///
/// Unset fields place no constraint on that dimension, so the default
/// request resolves on the first well-formed record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// Only accept the player with this uuid
    pub player: Option<String>,

    /// Only accept players in this household
    pub household: Option<String>,

    /// Give up after this long (overrides the session default)
    pub timeout: Option<Duration>,
}

impl DiscoveryRequest {
    /// Accept any player
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Target a specific player by uuid
    #[must_use]
    pub fn player(uuid: impl Into<String>) -> Self {
        Self {
            player: Some(uuid.into()),
            ..Self::default()
        }
    }

    /// Target any player of a household
    #[must_use]
    pub fn household(household: impl Into<String>) -> Self {
        Self {
            household: Some(household.into()),
            ..Self::default()
        }
    }

    /// Restrict to a household as well
    #[must_use]
    pub fn in_household(mut self, household: impl Into<String>) -> Self {
        self.household = Some(household.into());
        self
    }

    /// Set a deadline for this call
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check whether a record satisfies every constraint of this request
    #[must_use]
    pub fn matches(&self, record: &DiscoveryRecord) -> bool {
        let player_ok = self
            .player
            .as_deref()
            .is_none_or(|player| record.uuid.as_deref() == Some(player));
        let household_ok = self
            .household
            .as_deref()
            .is_none_or(|household| record.household.as_deref() == Some(household));

        player_ok && household_ok
    }
}
