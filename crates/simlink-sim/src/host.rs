//! Virtual simulation host
//!
//! [`VirtualHost`] stands in for a real simulator behind the [`SimAdapter`]
//! seam. Its behaviour can be changed at runtime through a
//! [`VirtualHostControl`], which stays with the test or UI after the host
//! itself has been moved onto the acquisition worker.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use simlink_protocol::{
    AdapterError, AdapterState, GeoPosition, MetarMap, SimAdapter, TelemetryFrame, WeatherQuery,
};
use tracing::{debug, info, warn};

use crate::aircraft::FlightModel;
use crate::stations::StationTable;

/// Configuration for creating a virtual host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualHostConfig {
    /// Display name/identifier
    pub id: String,
    /// Starting latitude of the simulated aircraft
    pub start_lat: f64,
    /// Starting longitude of the simulated aircraft
    pub start_lon: f64,
    pub altitude_ft: f64,
    pub ground_speed_kts: f64,
    /// Whether the host process is running when created
    pub running: bool,
}

impl Default for VirtualHostConfig {
    fn default() -> Self {
        Self {
            id: "Virtual Host".to_string(),
            start_lat: 47.4490, // KSEA
            start_lon: -122.3093,
            altitude_ft: 5000.0,
            ground_speed_kts: 180.0,
            running: true,
        }
    }
}

/// Record of the calls the host has served (for test verification)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostJournal {
    /// Number of connect attempts, successful or not
    pub connect_attempts: u32,
    /// Number of successful connects
    pub connects: u32,
    /// Number of telemetry fetch calls
    pub telemetry_fetches: u32,
    /// Weather queries in the order they reached the host
    pub weather_queries: Vec<WeatherQuery>,
}

#[derive(Debug)]
struct ControlState {
    running: bool,
    refuse_connects: u32,
    fail_fetches: bool,
    garble_weather: bool,
    journal: HostJournal,
}

/// Cloneable remote control for a [`VirtualHost`]
#[derive(Debug, Clone)]
pub struct VirtualHostControl {
    inner: Arc<Mutex<ControlState>>,
}

impl VirtualHostControl {
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start or stop the simulated host process
    ///
    /// Stopping the host breaks any open link; the next fetch fails.
    pub fn set_running(&self, running: bool) {
        info!("Virtual host running set to {}", running);
        self.lock().running = running;
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Refuse the next `count` connect attempts even though the host runs
    pub fn refuse_next_connects(&self, count: u32) {
        self.lock().refuse_connects = count;
    }

    /// Make telemetry fetches fail while the host keeps running
    pub fn set_fail_fetches(&self, fail: bool) {
        self.lock().fail_fetches = fail;
    }

    /// Make weather fetches return a response the adapter cannot use
    pub fn set_garble_weather(&self, garble: bool) {
        self.lock().garble_weather = garble;
    }

    /// Snapshot of the calls served so far
    pub fn journal(&self) -> HostJournal {
        self.lock().journal.clone()
    }

    /// Clear the journal
    pub fn clear_journal(&self) {
        self.lock().journal = HostJournal::default();
    }
}

/// A simulated host implementing [`SimAdapter`]
#[derive(Debug)]
pub struct VirtualHost {
    id: String,
    control: VirtualHostControl,
    model: FlightModel,
    stations: StationTable,
    connected: bool,
    state: AdapterState,
}

impl VirtualHost {
    /// Create a running virtual host with default settings
    pub fn new(id: impl Into<String>) -> Self {
        let config = VirtualHostConfig {
            id: id.into(),
            ..Default::default()
        };
        Self::from_config(config)
    }

    /// Create a virtual host from configuration
    pub fn from_config(config: VirtualHostConfig) -> Self {
        let control = VirtualHostControl {
            inner: Arc::new(Mutex::new(ControlState {
                running: config.running,
                refuse_connects: 0,
                fail_fetches: false,
                garble_weather: false,
                journal: HostJournal::default(),
            })),
        };
        Self {
            id: config.id,
            control,
            model: FlightModel::new(
                GeoPosition::new(config.start_lat, config.start_lon),
                config.altitude_ft,
                config.ground_speed_kts,
            ),
            stations: StationTable::pacific_northwest(),
            connected: false,
            state: AdapterState::Ok,
        }
    }

    /// Replace the station table answering weather queries
    pub fn with_stations(mut self, stations: StationTable) -> Self {
        self.stations = stations;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get a control handle for this host
    pub fn control(&self) -> VirtualHostControl {
        self.control.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Drop the link if the host went away underneath us
    fn check_link(&mut self) -> Result<(), AdapterError> {
        if !self.connected {
            self.state = AdapterState::Disconnected;
            return Err(AdapterError::NotConnected);
        }
        if !self.control.is_running() {
            warn!("Virtual host {} stopped, link lost", self.id);
            self.connected = false;
            self.state = AdapterState::Disconnected;
            return Err(AdapterError::RequestFailed("host process exited".to_string()));
        }
        Ok(())
    }
}

impl SimAdapter for VirtualHost {
    fn connect(&mut self) -> Result<(), AdapterError> {
        let mut control = self.control.lock();
        control.journal.connect_attempts += 1;

        if !control.running {
            debug!("Virtual host {} not running, refusing connect", self.id);
            return Err(AdapterError::ConnectionRefused("host not running".to_string()));
        }
        if control.refuse_connects > 0 {
            control.refuse_connects -= 1;
            debug!(
                "Virtual host {} refusing connect ({} more)",
                self.id, control.refuse_connects
            );
            return Err(AdapterError::ConnectionRefused("host busy".to_string()));
        }

        control.journal.connects += 1;
        drop(control);

        self.connected = true;
        self.state = AdapterState::Ok;
        self.model.reset_sequence();
        info!("Virtual host {} connected", self.id);
        Ok(())
    }

    fn fetch_telemetry(&mut self, ai_radius_km: u32) -> Result<TelemetryFrame, AdapterError> {
        self.control.lock().journal.telemetry_fetches += 1;
        self.check_link()?;

        if self.control.lock().fail_fetches {
            self.state = AdapterState::FetchError;
            return Err(AdapterError::RequestFailed("no data".to_string()));
        }

        let sample = self.model.step(ai_radius_km);
        self.state = AdapterState::Ok;
        Ok(TelemetryFrame::new(sample.encode()))
    }

    fn fetch_weather(&mut self, query: &WeatherQuery) -> Result<MetarMap, AdapterError> {
        self.control
            .lock()
            .journal
            .weather_queries
            .push(query.clone());
        self.check_link()?;

        if self.control.lock().garble_weather {
            return Err(AdapterError::InvalidResponse(
                "unreadable METAR block".to_string(),
            ));
        }

        let metars = self.stations.lookup(query);
        debug!(
            "Virtual host {} answered {:?} with {} reports",
            self.id,
            query,
            metars.len()
        );
        self.state = AdapterState::Ok;
        Ok(metars)
    }

    fn is_host_running(&self) -> bool {
        self.control.is_running()
    }

    fn internal_state(&self) -> AdapterState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::AircraftState;
    use crate::stations::WeatherStation;

    #[test]
    fn test_create_virtual_host() {
        let host = VirtualHost::new("Test Host");
        assert_eq!(host.id(), "Test Host");
        assert!(!host.is_connected());
        assert!(host.is_host_running());
        assert_eq!(host.internal_state(), AdapterState::Ok);
    }

    #[test]
    fn test_fetch_requires_connect() {
        let mut host = VirtualHost::new("Test");
        assert_eq!(host.fetch_telemetry(200), Err(AdapterError::NotConnected));
        assert_eq!(host.internal_state(), AdapterState::Disconnected);

        host.connect().unwrap();
        let frame = host.fetch_telemetry(200).unwrap();
        let state = AircraftState::decode(&frame.payload).unwrap();
        assert_eq!(state.sequence, 1);
    }

    #[test]
    fn test_connect_refused_when_not_running() {
        let config = VirtualHostConfig {
            running: false,
            ..Default::default()
        };
        let mut host = VirtualHost::from_config(config);
        let control = host.control();

        assert!(host.connect().is_err());
        control.set_running(true);
        assert!(host.connect().is_ok());

        let journal = control.journal();
        assert_eq!(journal.connect_attempts, 2);
        assert_eq!(journal.connects, 1);
    }

    #[test]
    fn test_refuse_next_connects() {
        let mut host = VirtualHost::new("Test");
        let control = host.control();
        control.refuse_next_connects(2);

        assert!(host.connect().is_err());
        assert!(host.connect().is_err());
        assert!(host.connect().is_ok());
    }

    #[test]
    fn test_host_stop_breaks_link() {
        let mut host = VirtualHost::new("Test");
        let control = host.control();
        host.connect().unwrap();

        control.set_running(false);
        assert!(host.fetch_telemetry(200).is_err());
        assert_eq!(host.internal_state(), AdapterState::Disconnected);
        assert!(!host.is_host_running());
        assert!(!host.is_connected());
    }

    #[test]
    fn test_transient_fetch_failure_keeps_link() {
        let mut host = VirtualHost::new("Test");
        let control = host.control();
        host.connect().unwrap();

        control.set_fail_fetches(true);
        assert!(host.fetch_telemetry(200).is_err());
        assert_eq!(host.internal_state(), AdapterState::FetchError);
        assert!(host.is_host_running());
        assert!(host.is_connected());

        control.set_fail_fetches(false);
        assert!(host.fetch_telemetry(200).is_ok());
        assert_eq!(host.internal_state(), AdapterState::Ok);
    }

    #[test]
    fn test_weather_queries_are_journaled() {
        let mut host = VirtualHost::new("Test");
        let control = host.control();
        host.connect().unwrap();

        let metars = host.fetch_weather(&WeatherQuery::station("KSEA")).unwrap();
        assert_eq!(metars.len(), 1);
        let metars = host.fetch_weather(&WeatherQuery::station("LFPG")).unwrap();
        assert!(metars.is_empty());

        let journal = control.journal();
        assert_eq!(
            journal.weather_queries,
            vec![WeatherQuery::station("KSEA"), WeatherQuery::station("LFPG")]
        );

        control.clear_journal();
        assert!(control.journal().weather_queries.is_empty());
    }

    #[test]
    fn test_garbled_weather_is_an_invalid_response() {
        let mut host = VirtualHost::new("Test");
        let control = host.control();
        host.connect().unwrap();

        control.set_garble_weather(true);
        assert!(matches!(
            host.fetch_weather(&WeatherQuery::station("KSEA")),
            Err(AdapterError::InvalidResponse(_))
        ));
        // The link survives a bad answer
        assert!(host.is_connected());
        assert!(host.fetch_telemetry(200).is_ok());

        control.set_garble_weather(false);
        assert_eq!(
            host.fetch_weather(&WeatherQuery::station("KSEA"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_custom_station_table() {
        let mut stations = StationTable::new();
        stations.insert(WeatherStation::new(
            "EGLL",
            51.4700,
            -0.4543,
            "EGLL 121250Z 24012KT 9999 BKN025 14/09 Q1012",
        ));
        let mut host = VirtualHost::new("Test").with_stations(stations);
        host.connect().unwrap();

        let metars = host.fetch_weather(&WeatherQuery::station("EGLL")).unwrap();
        assert!(metars["EGLL"].starts_with("EGLL 121250Z"));
        assert!(host
            .fetch_weather(&WeatherQuery::station("KSEA"))
            .unwrap()
            .is_empty());
    }
}
