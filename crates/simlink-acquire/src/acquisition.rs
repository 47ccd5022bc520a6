//! Acquisition loop
//!
//! One run of the loop:
//!
//! 1. Picks its source: a replay file to play, a live link to record, or a
//!    plain live link.
//! 2. For live sources, waits for the simulator through the
//!    [`ConnectionManager`].
//! 3. Cycles until cancelled. Each live cycle services the pending weather
//!    query if there is one, otherwise fetches telemetry. Each playback cycle
//!    emits the next recorded packet, wrapping to the first at the end.
//! 4. Closes its files, reports `Disconnected` and hands the adapter back.
//!
//! The loop owns the adapter outright. The only state shared with other
//! threads is the [`WeatherChannel`], whose mutex brackets every adapter call
//! made during a cycle.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use simlink_protocol::{
    AdapterError, MetarMap, RecordRead, SimAdapter, SimPacket, TelemetryFrame, WEATHER_PACKET_ID,
};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{AcquisitionConfig, SessionMode};
use crate::connection::{ConnectOutcome, ConnectionManager, LinkState};
use crate::error::AcquireError;
use crate::events::{AcquisitionEvent, EventSink};
use crate::replay_store::{ReplayReader, ReplayWriter};
use crate::weather::WeatherChannel;

/// Sleep used when there is nothing to play
pub const IDLE_INTERVAL: Duration = Duration::from_millis(500);

/// Seconds since the Unix epoch
pub(crate) fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Where packets come from during a run
enum Source {
    Live,
    Recording(ReplayWriter),
    Playing(ReplayReader),
    /// Playback was requested but there is nothing (left) to play
    Idle,
}

impl Source {
    fn is_live(&self) -> bool {
        matches!(self, Source::Live | Source::Recording(_))
    }
}

/// Result of the adapter calls made inside one live cycle
enum LiveFetch {
    Weather(SimPacket),
    Telemetry(Result<TelemetryFrame, AdapterError>),
}

/// What the main loop does after a cycle
enum CycleOutcome {
    Wait(Duration),
    /// The recording failed; keep polling live
    StopRecording,
    /// Replay is unusable; idle for the rest of the run
    AbandonReplay,
    /// The host went away; wait for it to come back
    Reconnect,
}

/// Single run of the acquisition loop
pub struct AcquisitionLoop<A> {
    adapter: A,
    config: AcquisitionConfig,
    weather: Arc<WeatherChannel>,
    events: EventSink,
    cancel: CancellationToken,
    connection: ConnectionManager,
    next_packet_id: u64,
    /// `Disconnected` already went out for the current outage
    outage_reported: bool,
}

impl<A: SimAdapter> AcquisitionLoop<A> {
    pub fn new(
        adapter: A,
        config: AcquisitionConfig,
        weather: Arc<WeatherChannel>,
        event_tx: mpsc::Sender<AcquisitionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let connection = ConnectionManager::new(config.reconnect_interval_secs);
        Self {
            adapter,
            config,
            weather,
            events: EventSink::new(event_tx, cancel.clone()),
            cancel,
            connection,
            next_packet_id: 1,
            outage_reported: false,
        }
    }

    /// Subscribe to link state changes for this run
    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.connection.subscribe()
    }

    /// Run until cancelled, then return the adapter
    pub async fn run(mut self) -> A {
        info!(
            "Acquisition loop started ({:?})",
            self.config.requested_mode()
        );

        let mut source = self.open_source().await;

        if source.is_live() && !self.wait_for_link().await {
            return self.teardown(source).await;
        }

        while !self.cancel.is_cancelled() {
            let outcome = match &mut source {
                Source::Live => self.live_cycle(None).await,
                Source::Recording(writer) => self.live_cycle(Some(writer)).await,
                Source::Playing(reader) => self.playback_cycle(reader).await,
                Source::Idle => {
                    self.answer_weather_offline().await;
                    CycleOutcome::Wait(IDLE_INTERVAL)
                }
            };

            match outcome {
                CycleOutcome::Wait(interval) => {
                    let offline = !source.is_live();
                    self.pause(interval, offline).await;
                }
                CycleOutcome::StopRecording => {
                    if let Source::Recording(writer) = std::mem::replace(&mut source, Source::Live)
                    {
                        // The write already failed; a flush error adds nothing
                        let _ = writer.close();
                    }
                    self.pause(self.config.live_interval(), false).await;
                }
                CycleOutcome::AbandonReplay => {
                    source = Source::Idle;
                    self.pause(IDLE_INTERVAL, true).await;
                }
                CycleOutcome::Reconnect => {
                    self.connection.mark_disconnected();
                    self.events.emit(AcquisitionEvent::Disconnected).await;
                    self.outage_reported = true;
                    if !self.wait_for_link().await {
                        break;
                    }
                    self.outage_reported = false;
                }
            }
        }

        self.teardown(source).await
    }

    /// Choose the packet source for this run
    async fn open_source(&mut self) -> Source {
        match self.config.requested_mode() {
            SessionMode::Playing => {
                let path = self.config.playback_path().map(|p| p.to_path_buf());
                let Some(path) = path else {
                    return Source::Idle;
                };
                match ReplayReader::open(&path) {
                    Ok(reader) => {
                        self.events
                            .log(format!("Replaying from \"{}\".", path.display()), false)
                            .await;
                        self.connection.mark_replaying();
                        self.events.emit(AcquisitionEvent::Connected).await;
                        Source::Playing(reader)
                    }
                    Err(e) => {
                        self.events.log(e.to_string(), true).await;
                        Source::Idle
                    }
                }
            }
            SessionMode::Recording => {
                let path = self.config.record_path().map(|p| p.to_path_buf());
                let Some(path) = path else {
                    return Source::Live;
                };
                match ReplayWriter::create(&path, self.config.update_rate_ms) {
                    Ok(writer) => {
                        self.events
                            .log(format!("Saving replay to \"{}\".", path.display()), false)
                            .await;
                        Source::Recording(writer)
                    }
                    Err(e) => {
                        self.events.log(e.to_string(), true).await;
                        Source::Live
                    }
                }
            }
            SessionMode::Live => Source::Live,
        }
    }

    /// Returns `false` if the run was cancelled while waiting
    async fn wait_for_link(&mut self) -> bool {
        let outcome = self
            .connection
            .connect(&mut self.adapter, &self.cancel, &self.events)
            .await;
        outcome == ConnectOutcome::Connected
    }

    /// Adapter calls for one live cycle, made under the weather lock
    ///
    /// An invalid pending query is discarded without reaching the adapter.
    fn fetch_live(&mut self) -> LiveFetch {
        let mut cycle = self.weather.lock_cycle();

        match cycle.take_pending() {
            Some(query) if query.is_valid() => {
                let timestamp = now_epoch_secs();
                let packet = match self.adapter.fetch_weather(&query) {
                    Ok(metars) => {
                        if metars.is_empty() {
                            warn!("Weather requested for {:?} but nothing found", query);
                        } else if self.config.verbose {
                            debug!("Weather for {:?}: {} reports", query, metars.len());
                        }
                        SimPacket::weather_reply(timestamp, metars)
                    }
                    Err(e) => {
                        warn!("Weather request {:?} failed: {}", query, e);
                        SimPacket::error(WEATHER_PACKET_ID, timestamp, e.to_string())
                    }
                };
                return LiveFetch::Weather(packet);
            }
            Some(query) => debug!("Dropping invalid weather query {:?}", query),
            None => {}
        }

        LiveFetch::Telemetry(self.adapter.fetch_telemetry(self.config.ai_radius_km))
    }

    async fn live_cycle(&mut self, writer: Option<&mut ReplayWriter>) -> CycleOutcome {
        let frame = match self.fetch_live() {
            LiveFetch::Weather(packet) => {
                self.events
                    .emit(AcquisitionEvent::DataReceived(packet))
                    .await;
                return CycleOutcome::Wait(self.config.live_interval());
            }
            LiveFetch::Telemetry(Ok(frame)) => frame,
            LiveFetch::Telemetry(Err(e)) => return self.telemetry_failed(e),
        };

        let packet_id = self.next_packet_id;
        self.next_packet_id += 1;
        let packet = SimPacket::telemetry(packet_id, now_epoch_secs(), frame.payload)
            .with_metars(frame.metars);

        if self.config.verbose {
            debug!(
                "Packet {}: {} payload bytes, {} reports",
                packet_id,
                packet.payload().len(),
                packet.metars().len()
            );
        }

        let mut outcome = CycleOutcome::Wait(self.config.live_interval());
        if let Some(writer) = writer {
            if let Err(e) = writer.append(&packet) {
                self.events
                    .log(format!("{}. Recording stopped.", e), true)
                    .await;
                outcome = CycleOutcome::StopRecording;
            }
        }

        self.events
            .emit(AcquisitionEvent::DataReceived(packet))
            .await;
        outcome
    }

    fn telemetry_failed(&self, error: AdapterError) -> CycleOutcome {
        let state = self.adapter.internal_state();
        if state.is_ok() {
            if self.config.verbose {
                debug!("No data fetched: {}", error);
            }
            return CycleOutcome::Wait(self.config.live_interval());
        }

        warn!("Error fetching data from the simulator ({:?}): {}", state, error);
        if self.adapter.is_host_running() {
            CycleOutcome::Wait(self.config.live_interval())
        } else {
            CycleOutcome::Reconnect
        }
    }

    async fn playback_cycle(&mut self, reader: &mut ReplayReader) -> CycleOutcome {
        self.answer_weather_offline().await;

        match self.next_recorded(reader) {
            Ok(Some(packet)) => {
                if self.config.verbose {
                    debug!("Replaying packet {}", packet.packet_id());
                }
                self.events
                    .emit(AcquisitionEvent::DataReceived(packet))
                    .await;
                CycleOutcome::Wait(self.config.playback_interval(reader.update_rate_ms()))
            }
            Ok(None) => {
                self.events
                    .log("Replay file holds no packets.", true)
                    .await;
                CycleOutcome::AbandonReplay
            }
            Err(e) => {
                self.events.log(e.to_string(), true).await;
                CycleOutcome::AbandonReplay
            }
        }
    }

    /// Next packet, wrapping to the first record at the end of the file
    fn next_recorded(&self, reader: &mut ReplayReader) -> Result<Option<SimPacket>, AcquireError> {
        if let RecordRead::Packet(packet) = reader.read_next()? {
            return Ok(Some(packet));
        }

        debug!("Replay reached the end, looping");
        reader.rewind()?;
        match reader.read_next()? {
            RecordRead::Packet(packet) => Ok(Some(packet)),
            RecordRead::EndOfData => Ok(None),
        }
    }

    /// Answer a pending query without touching the adapter
    ///
    /// Every submission gets its empty reply here, valid or not.
    async fn answer_weather_offline(&self) {
        let pending = self.weather.lock_cycle().take_pending();
        if let Some(query) = pending {
            debug!("Answering {:?} with an empty reply while offline", query);
            let packet = SimPacket::weather_reply(now_epoch_secs(), MetarMap::new());
            self.events
                .emit(AcquisitionEvent::DataReceived(packet))
                .await;
        }
    }

    /// Sleep between cycles
    ///
    /// Ends early on cancellation or when a weather query arrives. With no
    /// live link the query is answered in place and the sleep resumes, so
    /// playback timing is undisturbed.
    async fn pause(&self, interval: Duration, offline: bool) {
        let deadline = Instant::now() + interval;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(deadline) => return,
                _ = self.weather.submitted() => {
                    if offline {
                        self.answer_weather_offline().await;
                    } else if self.weather.has_pending() {
                        return;
                    }
                }
            }
        }
    }

    async fn teardown(self, source: Source) -> A {
        match source {
            Source::Recording(writer) => {
                let records = writer.records_written();
                match writer.close() {
                    Ok(()) => info!("Recording closed with {} packets", records),
                    Err(e) => self.events.log(e.to_string(), true).await,
                }
            }
            Source::Playing(reader) => drop(reader),
            Source::Live | Source::Idle => {}
        }

        self.connection.mark_disconnected();
        if !self.outage_reported {
            self.events.emit(AcquisitionEvent::Disconnected).await;
        }
        info!("Acquisition loop stopped");
        self.adapter
    }
}

#[cfg(test)]
mod tests {
    use simlink_protocol::WeatherQuery;
    use simlink_sim::{AircraftState, VirtualHost};

    use super::*;

    fn fast_config() -> AcquisitionConfig {
        AcquisitionConfig {
            update_rate_ms: 5,
            ..Default::default()
        }
    }

    async fn next_packet(rx: &mut mpsc::Receiver<AcquisitionEvent>) -> SimPacket {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for a packet")
                .expect("event channel closed");
            if let Some(packet) = event.into_packet() {
                return packet;
            }
        }
    }

    #[tokio::test]
    async fn test_live_packets_are_numbered_from_one() {
        let host = VirtualHost::new("Test");
        let (event_tx, mut event_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let acq = AcquisitionLoop::new(
            host,
            fast_config(),
            Arc::new(WeatherChannel::new()),
            event_tx,
            cancel.clone(),
        );
        let handle = tokio::spawn(acq.run());

        for expected in 1..=5 {
            let packet = next_packet(&mut event_rx).await;
            assert_eq!(packet.packet_id(), expected);
            assert!(packet.is_ok());
            let state = AircraftState::decode(packet.payload()).unwrap();
            assert_eq!(state.sequence, expected);
        }

        cancel.cancel();
        let host = handle.await.unwrap();
        assert!(host.is_connected());
    }

    #[tokio::test]
    async fn test_weather_reply_does_not_consume_an_id() {
        let host = VirtualHost::new("Test");
        let control = host.control();
        let weather = Arc::new(WeatherChannel::new());
        let (event_tx, mut event_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            AcquisitionLoop::new(host, fast_config(), weather.clone(), event_tx, cancel.clone())
                .run(),
        );

        assert_eq!(next_packet(&mut event_rx).await.packet_id(), 1);
        assert!(weather.submit(WeatherQuery::station("KSEA")));

        let mut ids = Vec::new();
        let mut weather_packet = None;
        while ids.len() < 3 {
            let packet = next_packet(&mut event_rx).await;
            if packet.is_weather_reply() {
                weather_packet = Some(packet);
            } else {
                ids.push(packet.packet_id());
            }
        }

        let weather_packet = weather_packet.expect("no weather reply");
        assert_eq!(weather_packet.packet_id(), WEATHER_PACKET_ID);
        assert!(weather_packet.payload().is_empty());
        assert!(weather_packet.metars().contains_key("KSEA"));
        assert_eq!(ids, vec![2, 3, 4]);
        assert_eq!(
            control.journal().weather_queries,
            vec![WeatherQuery::station("KSEA")]
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_link_and_ids() {
        let host = VirtualHost::new("Test");
        let control = host.control();
        let (event_tx, mut event_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            AcquisitionLoop::new(
                host,
                fast_config(),
                Arc::new(WeatherChannel::new()),
                event_tx,
                cancel.clone(),
            )
            .run(),
        );

        assert_eq!(next_packet(&mut event_rx).await.packet_id(), 1);
        control.set_fail_fetches(true);
        tokio::time::sleep(Duration::from_millis(30)).await;
        control.set_fail_fetches(false);

        // Ids stay contiguous across the failed fetches
        let mut last = 1;
        for _ in 0..5 {
            let id = next_packet(&mut event_rx).await.packet_id();
            assert_eq!(id, last + 1);
            last = id;
        }
        assert!(u64::from(control.journal().telemetry_fetches) > last);
        assert_eq!(control.journal().connects, 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_teardown_reports_disconnected() {
        let host = VirtualHost::new("Test");
        let (event_tx, mut event_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();
        let acq = AcquisitionLoop::new(
            host,
            fast_config(),
            Arc::new(WeatherChannel::new()),
            event_tx,
            cancel.clone(),
        );
        let state = acq.link_state();
        let handle = tokio::spawn(acq.run());

        next_packet(&mut event_rx).await;
        assert_eq!(*state.borrow(), LinkState::Connected);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), LinkState::Disconnected);

        let mut last = None;
        while let Ok(event) = event_rx.try_recv() {
            last = Some(event);
        }
        assert!(matches!(last, Some(AcquisitionEvent::Disconnected)));
    }

    #[test]
    fn test_now_is_after_2020() {
        assert!(now_epoch_secs() > 1_577_836_800);
    }
}
