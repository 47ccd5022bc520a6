//! Weather request side channel
//!
//! Any thread may submit a [`WeatherQuery`] while the acquisition loop runs.
//! The channel holds at most one pending query: a newer submission replaces
//! an older one that has not been serviced yet, even when the newer one is
//! invalid. A live cycle skips an invalid query, so submitting one cancels
//! the request in flight. Submitting also wakes the loop from its
//! inter-cycle sleep so the query is answered promptly.
//!
//! The slot mutex doubles as the loop's per-cycle critical section. The loop
//! holds a [`CycleGuard`] while it takes the pending query and talks to the
//! adapter, so a submission either lands before the take or waits for the
//! cycle to finish and is picked up by the next one.

use std::sync::{Mutex, MutexGuard, PoisonError};

use simlink_protocol::WeatherQuery;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Single-slot, latest-wins weather request mailbox
#[derive(Debug, Default)]
pub struct WeatherChannel {
    slot: Mutex<Option<WeatherQuery>>,
    wake: Notify,
}

impl WeatherChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<WeatherQuery>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a query, replacing any query not yet serviced
    ///
    /// Returns whether the query is valid. An invalid query (blank ident,
    /// out-of-range coordinates) still takes the slot: the adapter never sees
    /// it, but it displaces the earlier request.
    pub fn submit(&self, query: WeatherQuery) -> bool {
        let valid = query.is_valid();
        if !valid {
            warn!("Invalid weather query {:?} will not reach the simulator", query);
        }

        let replaced = self.lock().replace(query);
        if let Some(old) = replaced {
            debug!("Weather query {:?} superseded before it was serviced", old);
        }
        self.wake.notify_one();
        valid
    }

    /// Whether a query is waiting to be serviced
    pub fn has_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Enter the loop's critical section for one cycle
    pub fn lock_cycle(&self) -> CycleGuard<'_> {
        CycleGuard { slot: self.lock() }
    }

    /// Resolves after the next submission
    pub(crate) async fn submitted(&self) {
        self.wake.notified().await;
    }
}

/// Exclusive access to the pending query for one loop cycle
pub struct CycleGuard<'a> {
    slot: MutexGuard<'a, Option<WeatherQuery>>,
}

impl CycleGuard<'_> {
    /// Take the pending query, leaving the slot empty
    pub fn take_pending(&mut self) -> Option<WeatherQuery> {
        self.slot.take()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_latest_submission_wins() {
        let channel = WeatherChannel::new();
        assert!(channel.submit(WeatherQuery::station("KSEA")));
        assert!(channel.submit(WeatherQuery::station("KPDX")));

        let mut guard = channel.lock_cycle();
        assert_eq!(guard.take_pending(), Some(WeatherQuery::station("KPDX")));
        assert_eq!(guard.take_pending(), None);
    }

    #[test]
    fn test_invalid_query_displaces_pending() {
        let channel = WeatherChannel::new();
        assert!(channel.submit(WeatherQuery::station("KSEA")));
        assert!(!channel.submit(WeatherQuery::station("  ")));
        assert!(!channel.submit(WeatherQuery::nearest(91.0, 0.0)));

        // The valid query is gone; only the latest submission is pending
        assert_eq!(
            channel.lock_cycle().take_pending(),
            Some(WeatherQuery::nearest(91.0, 0.0))
        );
        assert!(!channel.has_pending());
    }

    #[tokio::test]
    async fn test_submit_before_wait_is_not_lost() {
        let channel = WeatherChannel::new();
        channel.submit(WeatherQuery::nearest(47.5, -122.3));

        // The permit stored by the submission completes the wait immediately
        tokio::time::timeout(Duration::from_millis(100), channel.submitted())
            .await
            .expect("wake was lost");
    }

    #[tokio::test]
    async fn test_submit_from_another_thread_wakes_waiter() {
        let channel = Arc::new(WeatherChannel::new());

        let submitter = {
            let channel = channel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                channel.submit(WeatherQuery::station("KBFI"))
            })
        };

        tokio::time::timeout(Duration::from_secs(2), channel.submitted())
            .await
            .expect("waiter was not woken");
        assert!(submitter.join().unwrap());
        assert!(channel.has_pending());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn query() -> impl Strategy<Value = WeatherQuery> {
            prop_oneof![
                "[A-Z]{4}".prop_map(WeatherQuery::station),
                Just(WeatherQuery::station("")),
                (-100.0f64..100.0, -190.0f64..190.0)
                    .prop_map(|(lat, lon)| WeatherQuery::nearest(lat, lon)),
            ]
        }

        proptest! {
            #[test]
            fn slot_holds_latest_submission(queries in prop::collection::vec(query(), 1..16)) {
                let channel = WeatherChannel::new();
                for q in &queries {
                    prop_assert_eq!(channel.submit(q.clone()), q.is_valid());
                }

                let expected = queries.last().cloned();
                let mut guard = channel.lock_cycle();
                prop_assert_eq!(guard.take_pending(), expected);
                prop_assert_eq!(guard.take_pending(), None);
            }
        }
    }
}
