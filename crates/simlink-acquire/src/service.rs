//! Acquisition service
//!
//! Runs an [`AcquisitionLoop`] on its own named thread with a current-thread
//! tokio runtime, so a slow or blocking adapter never stalls the caller's
//! executor. The handle is the control surface for the host application:
//! submit weather queries, watch the link, request a stop and collect the
//! adapter back for the next run.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use simlink_protocol::{SimAdapter, WeatherQuery};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::acquisition::AcquisitionLoop;
use crate::config::AcquisitionConfig;
use crate::connection::LinkState;
use crate::error::AcquireError;
use crate::events::AcquisitionEvent;
use crate::weather::WeatherChannel;

/// Name of the worker thread
pub const WORKER_THREAD_NAME: &str = "sim-acquisition";

/// Handle to a running acquisition worker
///
/// Dropping the handle requests a stop but does not wait for the worker.
#[derive(Debug)]
pub struct AcquisitionService<A> {
    weather: Arc<WeatherChannel>,
    cancel: CancellationToken,
    link_state: watch::Receiver<LinkState>,
    worker: Option<JoinHandle<A>>,
}

impl<A: SimAdapter + 'static> AcquisitionService<A> {
    /// Validate `config` and start a run on a new worker thread
    ///
    /// Events are delivered on `event_tx`; the receiver must be drained for
    /// the loop to make progress.
    pub fn start(
        adapter: A,
        config: AcquisitionConfig,
        event_tx: mpsc::Sender<AcquisitionEvent>,
    ) -> Result<Self, AcquireError> {
        config.validate()?;

        let weather = Arc::new(WeatherChannel::new());
        let cancel = CancellationToken::new();
        let acq = AcquisitionLoop::new(adapter, config, weather.clone(), event_tx, cancel.clone());
        let link_state = acq.link_state();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || runtime.block_on(acq.run()))?;

        info!("Acquisition worker started");
        Ok(Self {
            weather,
            cancel,
            link_state,
            worker: Some(worker),
        })
    }
}

impl<A> AcquisitionService<A> {
    /// Queue a weather query; see [`WeatherChannel::submit`]
    pub fn submit_weather(&self, query: WeatherQuery) -> bool {
        self.weather.submit(query)
    }

    /// Shared weather channel, for callers that outlive this handle's borrow
    pub fn weather(&self) -> Arc<WeatherChannel> {
        self.weather.clone()
    }

    /// Current link state
    pub fn link_state(&self) -> LinkState {
        *self.link_state.borrow()
    }

    /// Receiver notified on every link state change
    pub fn watch_link_state(&self) -> watch::Receiver<LinkState> {
        self.link_state.clone()
    }

    /// Ask the worker to stop; returns immediately
    ///
    /// The loop observes the request within one reconnect tick or at its next
    /// sleep, whichever comes first.
    pub fn request_stop(&self) {
        debug!("Acquisition stop requested");
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Wait for the worker to exit and take the adapter back
    ///
    /// Does not request a stop on its own; see [`AcquisitionService::stop`].
    pub fn join(mut self) -> Result<A, AcquireError> {
        let worker = self.worker.take().ok_or(AcquireError::WorkerPanicked)?;
        let adapter = worker.join().map_err(|_| AcquireError::WorkerPanicked)?;
        info!("Acquisition worker joined");
        Ok(adapter)
    }

    /// Request a stop and wait for the worker
    pub fn stop(self) -> Result<A, AcquireError> {
        self.request_stop();
        self.join()
    }
}

impl<A> Drop for AcquisitionService<A> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use simlink_sim::VirtualHost;

    use super::*;

    fn fast_config() -> AcquisitionConfig {
        AcquisitionConfig {
            update_rate_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let config = AcquisitionConfig {
            update_rate_ms: 0,
            ..Default::default()
        };

        let result = AcquisitionService::start(VirtualHost::new("Test"), config, event_tx);
        assert!(matches!(result, Err(AcquireError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_start_stop_returns_adapter() {
        let (event_tx, mut event_rx) = mpsc::channel(256);
        let service =
            AcquisitionService::start(VirtualHost::new("Worker"), fast_config(), event_tx).unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(packet) = event_rx.recv().await.and_then(|e| e.into_packet()) {
                    return packet;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(first.packet_id(), 1);
        assert_eq!(service.link_state(), LinkState::Connected);

        let host = tokio::task::spawn_blocking(move || service.stop())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(host.id(), "Worker");
    }

    #[test]
    fn test_drop_requests_stop() {
        let (event_tx, _event_rx) = mpsc::channel(1024);
        let service =
            AcquisitionService::start(VirtualHost::new("Test"), fast_config(), event_tx).unwrap();
        let cancel = service.cancel.clone();

        drop(service);
        assert!(cancel.is_cancelled());
    }
}
