//! Event stream for the acquisition engine
//!
//! Every notification the acquisition loop produces (link lifecycle, data
//! packets, log lines) flows through one bounded channel so observers see them
//! in the order they happened.

use simlink_protocol::SimPacket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Notifications delivered to the host application
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    // -------------------------------------------------------------------------
    // Link lifecycle
    // -------------------------------------------------------------------------
    /// The loop is about to wait for the simulator
    WaitingToConnect,

    /// A live link was established, or a replay file was opened
    Connected,

    /// The link was lost or the loop stopped
    Disconnected,

    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------
    /// A telemetry, weather or error packet
    DataReceived(SimPacket),

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------
    /// Human-readable progress or error message
    LogMessage {
        /// Message text
        text: String,
        /// Whether the message reports a failure
        is_error: bool,
    },
}

impl AcquisitionEvent {
    /// Check if this event carries a packet
    pub fn is_data(&self) -> bool {
        matches!(self, AcquisitionEvent::DataReceived(_))
    }

    /// Check if this is a link lifecycle event
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            AcquisitionEvent::WaitingToConnect
                | AcquisitionEvent::Connected
                | AcquisitionEvent::Disconnected
        )
    }

    /// Packet carried by a data event
    pub fn packet(&self) -> Option<&SimPacket> {
        match self {
            AcquisitionEvent::DataReceived(packet) => Some(packet),
            _ => None,
        }
    }

    /// Consume a data event into its packet
    pub fn into_packet(self) -> Option<SimPacket> {
        match self {
            AcquisitionEvent::DataReceived(packet) => Some(packet),
            _ => None,
        }
    }
}

/// Sending half used by the acquisition loop
///
/// A closed receiver is not an error: the loop keeps running and events are
/// dropped until it is stopped. Once the run is cancelled, sends no longer
/// wait for channel capacity.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::Sender<AcquisitionEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::Sender<AcquisitionEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub(crate) async fn emit(&self, event: AcquisitionEvent) {
        if self.cancel.is_cancelled() {
            let _ = self.tx.try_send(event);
            return;
        }
        tokio::select! {
            permit = self.tx.reserve() => {
                if let Ok(permit) = permit {
                    permit.send(event);
                }
            }
            _ = self.cancel.cancelled() => {
                let _ = self.tx.try_send(event);
            }
        }
    }

    /// Trace a message and forward it to the host application
    pub(crate) async fn log(&self, text: impl Into<String>, is_error: bool) {
        let text = text.into();
        if is_error {
            warn!("{}", text);
        } else {
            info!("{}", text);
        }
        self.emit(AcquisitionEvent::LogMessage { text, is_error })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        let data = AcquisitionEvent::DataReceived(SimPacket::telemetry(1, 0, vec![1]));
        assert!(data.is_data());
        assert!(!data.is_lifecycle());
        assert_eq!(data.packet().map(|p| p.packet_id()), Some(1));

        for event in [
            AcquisitionEvent::WaitingToConnect,
            AcquisitionEvent::Connected,
            AcquisitionEvent::Disconnected,
        ] {
            assert!(event.is_lifecycle());
            assert!(event.packet().is_none());
        }

        let log = AcquisitionEvent::LogMessage {
            text: "hello".to_string(),
            is_error: false,
        };
        assert!(!log.is_lifecycle());
        assert!(log.into_packet().is_none());
    }

    #[tokio::test]
    async fn test_sink_forwards_log_messages() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(tx, CancellationToken::new());

        sink.log("Replay ended", true).await;

        match rx.recv().await {
            Some(AcquisitionEvent::LogMessage { text, is_error }) => {
                assert_eq!(text, "Replay ended");
                assert!(is_error);
            }
            other => panic!("Expected LogMessage, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sink_ignores_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = EventSink::new(tx, CancellationToken::new());
        sink.emit(AcquisitionEvent::Connected).await;
    }

    #[tokio::test]
    async fn test_full_channel_does_not_block_after_cancel() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let sink = EventSink::new(tx, cancel.clone());

        sink.emit(AcquisitionEvent::WaitingToConnect).await;
        let blocked = {
            let sink = sink.clone();
            tokio::spawn(async move { sink.emit(AcquisitionEvent::Connected).await })
        };
        tokio::task::yield_now().await;
        assert!(!blocked.is_finished());

        cancel.cancel();
        blocked.await.unwrap();
        sink.emit(AcquisitionEvent::Disconnected).await;

        // Only the event that fit is delivered
        assert!(matches!(rx.recv().await, Some(AcquisitionEvent::WaitingToConnect)));
        assert!(rx.try_recv().is_err());
    }
}
