//! Discovery events and the bus that distributes them

mod events;

pub use events::{DiscoveryEvent, EventBus, EventKind, Subscription, SubscriptionId};
