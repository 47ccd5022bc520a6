//! Connection manager
//!
//! Waits for the simulator on a one-second tick, attempting a connect on the
//! first tick and then every `reconnect_interval_secs` ticks, and gives up
//! only when the run is cancelled. The current link state is published on a
//! watch channel for observers that want it without draining events.

use std::time::Duration;

use simlink_protocol::SimAdapter;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{AcquisitionEvent, EventSink};

/// Granularity of the reconnect wait
pub const RECONNECT_TICK: Duration = Duration::from_secs(1);

/// Link state as seen by the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    /// Waiting for the simulator to accept a connection
    Connecting,
    Connected,
    /// Serving packets from a replay file
    Replaying,
}

impl LinkState {
    /// Whether packets can currently flow
    pub fn is_active(&self) -> bool {
        matches!(self, LinkState::Connected | LinkState::Replaying)
    }
}

/// How a connect wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Cancelled,
}

/// Drives (re)connection to the simulator
#[derive(Debug)]
pub struct ConnectionManager {
    retry_ticks: u32,
    tick: Duration,
    state_tx: watch::Sender<LinkState>,
}

impl ConnectionManager {
    /// Create a manager attempting a connect every `reconnect_interval_secs`
    ///
    /// An interval of 0 is treated as 1.
    pub fn new(reconnect_interval_secs: u32) -> Self {
        let (state_tx, _) = watch::channel(LinkState::Disconnected);
        Self {
            retry_ticks: reconnect_interval_secs.max(1),
            tick: RECONNECT_TICK,
            state_tx,
        }
    }

    /// Subscribe to link state changes
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> LinkState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: LinkState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!("Link state {:?} -> {:?}", current, state);
                *current = state;
                true
            }
        });
    }

    /// Record that packets now come from a replay file
    pub fn mark_replaying(&self) {
        self.set_state(LinkState::Replaying);
    }

    /// Record that the link is gone
    pub fn mark_disconnected(&self) {
        self.set_state(LinkState::Disconnected);
    }

    /// Wait until the adapter connects or `cancel` fires
    ///
    /// Emits `WaitingToConnect` and a log line first, then `Connected` on
    /// success. Cancellation is observed within one tick.
    pub(crate) async fn connect<A: SimAdapter>(
        &self,
        adapter: &mut A,
        cancel: &CancellationToken,
        events: &EventSink,
    ) -> ConnectOutcome {
        events.emit(AcquisitionEvent::WaitingToConnect).await;
        events
            .log("Not connected to the simulator. Waiting ...", false)
            .await;
        self.set_state(LinkState::Connecting);

        let mut ticks: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                self.set_state(LinkState::Disconnected);
                return ConnectOutcome::Cancelled;
            }

            if ticks % self.retry_ticks == 0 {
                match adapter.connect() {
                    Ok(()) => {
                        self.set_state(LinkState::Connected);
                        events.emit(AcquisitionEvent::Connected).await;
                        events.log("Connected to the simulator.", false).await;
                        return ConnectOutcome::Connected;
                    }
                    Err(e) => debug!("Connect attempt failed: {}", e),
                }
            }
            ticks = ticks.wrapping_add(1);

            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(self.tick) => {}
            }
        }
    }
}
