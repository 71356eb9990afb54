//! Discovery session coordinator

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::socket::{FaultHook, SocketManager};
use crate::error::{DiscoveryError, Result};
use crate::state::{DiscoveryEvent, EventBus, Subscription};
use crate::types::{DiscoveryConfig, DiscoveryRecord, DiscoveryRequest};

/// A discovery session shared by concurrent lookups
///
/// Cloning is cheap; clones drive the same socket. The socket and its
/// timers are active exactly while at least one lookup is pending (or
/// after an explicit [`Discovery::start`]).
///
/// # Example
///
/// ```rust,no_run
/// use zoneplayer_discovery::{Discovery, DiscoveryConfig, DiscoveryRequest};
///
/// # async fn example() -> Result<(), zoneplayer_discovery::DiscoveryError> {
/// let discovery = Discovery::new(DiscoveryConfig::default());
///
/// let (any, kitchen) = tokio::join!(
///     discovery.discover_player(DiscoveryRequest::any()),
///     discovery.discover_player(DiscoveryRequest::player("RINCON_000E58A0B1C201400")),
/// );
/// println!("first: {}, kitchen: {}", any?.location, kitchen?.location);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Discovery {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    config: Arc<DiscoveryConfig>,
    bus: EventBus,
    state: Mutex<SessionState>,
}

#[derive(Debug)]
struct SessionState {
    /// Pending lookups sharing the socket
    open_requests: usize,
    /// Advances every time the session stops
    generation: u64,
    socket: SocketManager,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionState {
    fn shut_down(&mut self) -> bool {
        self.open_requests = 0;
        self.generation += 1;
        self.socket.stop()
    }
}

impl Discovery {
    /// Create an idle session
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
        let config = Arc::new(config);
        let bus = EventBus::new();
        let socket = SocketManager::new(Arc::clone(&config), bus.clone());

        Self {
            shared: Arc::new(Shared {
                config,
                bus,
                state: Mutex::new(SessionState {
                    open_requests: 0,
                    generation: 0,
                    socket,
                }),
            }),
        }
    }

    /// Create an idle session with the default configuration
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DiscoveryConfig::default())
    }

    /// The session configuration
    #[must_use]
    pub fn config(&self) -> &DiscoveryConfig {
        &self.shared.config
    }

    /// The bus carrying this session's `found` and `error` events
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Observe every `found` and `error` event of this session
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.shared.bus.subscribe_all()
    }

    /// Number of lookups currently sharing the socket
    #[must_use]
    pub fn open_requests(&self) -> usize {
        self.shared.lock().open_requests
    }

    /// Whether the socket and search loop are active
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.lock().socket.is_running()
    }

    /// Start the socket and search loop without a pending lookup
    ///
    /// Does nothing if the session is already running. The loop stops again
    /// when the next lookup resolves and no other lookup is pending, or on
    /// [`Discovery::stop`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` or `BindFailed` if the socket cannot be started.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.lock();
        self.ensure_running(&mut state)
    }

    /// Stop the socket and search loop
    ///
    /// Pending lookups fail with [`DiscoveryError::Stopped`]. Calling this on
    /// an idle session is a no-op.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        let pending = state.open_requests;
        if state.shut_down() || pending > 0 {
            info!("Discovery session stopped with {} pending lookups", pending);
            // Published under the state lock so only lookups of the stopped
            // generation can see it
            self.shared
                .bus
                .publish(&DiscoveryEvent::Error(DiscoveryError::Stopped));
        }
    }

    /// Resolve a single player matching `request`
    ///
    /// Records that do not satisfy the request are skipped. The call fails
    /// if the socket faults, the session is stopped, or the request's
    /// timeout (or the session default) elapses first.
    ///
    /// # Errors
    ///
    /// Returns `BindFailed`/`SendFailed` on socket faults, `Stopped` if the
    /// session is stopped, and `Timeout` if no matching player answered in time.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub async fn discover_player(&self, request: DiscoveryRequest) -> Result<DiscoveryRecord> {
        let (mut subscription, mut slot) = self.acquire()?;

        let wait = wait_for_match(&mut subscription, &request);
        let outcome = match request.timeout.or(self.shared.config.default_timeout) {
            Some(duration) => tokio::time::timeout(duration, wait)
                .await
                .unwrap_or(Err(DiscoveryError::Timeout { duration })),
            None => wait.await,
        };

        slot.release();
        subscription.unsubscribe();

        match &outcome {
            Ok(record) => debug!("Resolved {:?} to {}", request, record.location),
            Err(e) => debug!("Lookup {:?} failed: {}", request, e),
        }
        outcome
    }

    /// Collect every player that answers within `window`
    ///
    /// Players are reported once each, in the order they first answered.
    ///
    /// # Errors
    ///
    /// Returns `BindFailed`/`SendFailed` on socket faults and `Stopped` if
    /// the session is stopped before the window closes.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub async fn scan(&self, window: Duration) -> Result<Vec<DiscoveryRecord>> {
        let (mut subscription, mut slot) = self.acquire()?;

        let deadline = tokio::time::Instant::now() + window;
        let mut seen = HashSet::new();
        let mut players = Vec::new();

        let outcome = loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => {
                    break Ok(());
                }
                event = subscription.recv() => {
                    match event {
                        Some(DiscoveryEvent::Found(record)) => {
                            if seen.insert(record.identity().to_string()) {
                                players.push(record);
                            }
                        }
                        Some(DiscoveryEvent::Error(e)) => break Err(e),
                        None => break Err(DiscoveryError::EventBusClosed),
                    }
                }
            }
        };

        slot.release();
        subscription.unsubscribe();

        outcome.map(|()| players)
    }

    /// Register a lookup in the current generation
    ///
    /// The subscription is taken under the same lock as the slot, so it never
    /// sees an error published for an earlier generation, and it listens
    /// before the first search goes out.
    fn acquire(&self) -> Result<(Subscription, RequestSlot)> {
        let mut state = self.shared.lock();
        let subscription = self.shared.bus.subscribe_all();
        self.ensure_running(&mut state)?;
        state.open_requests += 1;
        trace!("Lookup registered, {} pending", state.open_requests);

        let slot = RequestSlot {
            shared: Arc::clone(&self.shared),
            generation: state.generation,
            released: false,
        };
        Ok((subscription, slot))
    }

    fn ensure_running(&self, state: &mut SessionState) -> Result<()> {
        if state.socket.is_running() {
            return Ok(());
        }
        self.shared.config.validate()?;

        let on_fault = fault_hook(Arc::downgrade(&self.shared), state.generation);
        let local_addr = state.socket.start(on_fault)?;
        info!("Discovery session started on {}", local_addr);
        Ok(())
    }
}

fn fault_hook(shared: Weak<Shared>, generation: u64) -> FaultHook {
    Box::new(move |err| {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut state = shared.lock();
        // A newer session owns the socket by now
        if state.generation != generation {
            return;
        }
        state.shut_down();
        warn!("Discovery session reset after fault: {}", err);
        shared.bus.publish(&DiscoveryEvent::Error(err));
    })
}

async fn wait_for_match(
    subscription: &mut Subscription,
    request: &DiscoveryRequest,
) -> Result<DiscoveryRecord> {
    while let Some(event) = subscription.recv().await {
        match event {
            DiscoveryEvent::Found(record) if request.matches(&record) => return Ok(record),
            DiscoveryEvent::Found(record) => {
                trace!("Skipping {:?} for {:?}", record.uuid, request);
            }
            DiscoveryEvent::Error(e) => return Err(e),
        }
    }
    Err(DiscoveryError::EventBusClosed)
}

/// One lookup's share of the session
///
/// Released exactly once, explicitly or on drop, so a lookup future that is
/// dropped mid-flight still gives its share back.
struct RequestSlot {
    shared: Arc<Shared>,
    generation: u64,
    released: bool,
}

impl RequestSlot {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut state = self.shared.lock();
        // The session was reset under us; its counter no longer includes this slot
        if state.generation != self.generation {
            return;
        }

        state.open_requests = state.open_requests.saturating_sub(1);
        trace!("Lookup released, {} pending", state.open_requests);
        if state.open_requests == 0 {
            state.shut_down();
        }
    }
}

impl Drop for RequestSlot {
    fn drop(&mut self) {
        self.release();
    }
}
