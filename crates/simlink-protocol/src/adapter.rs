//! Seam to the external simulation host
//!
//! The acquisition engine never talks to the simulator directly. It drives an
//! implementation of [`SimAdapter`], which owns whatever link, handles and
//! decoding the concrete host needs. All calls are made from the single
//! acquisition worker, so implementations only need to be `Send`.

use crate::error::AdapterError;
use crate::packet::MetarMap;
use crate::weather::WeatherQuery;

/// Internal health of the adapter as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterState {
    /// Last request completed normally
    #[default]
    Ok,
    /// A request failed in a way that suggests the link is broken
    FetchError,
    /// The host closed the link
    Disconnected,
}

impl AdapterState {
    pub fn is_ok(&self) -> bool {
        matches!(self, AdapterState::Ok)
    }
}

/// One telemetry sample as returned by the host
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TelemetryFrame {
    /// Opaque, adapter-encoded telemetry
    pub payload: Vec<u8>,
    /// Weather reports the host attached to this sample, if any
    pub metars: MetarMap,
}

impl TelemetryFrame {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            metars: MetarMap::new(),
        }
    }
}

/// Request/response interface to a simulation host
pub trait SimAdapter: Send {
    /// Try to open a link to the host
    fn connect(&mut self) -> Result<(), AdapterError>;

    /// Fetch one telemetry sample, including AI traffic within `ai_radius_km`
    fn fetch_telemetry(&mut self, ai_radius_km: u32) -> Result<TelemetryFrame, AdapterError>;

    /// Look up weather reports for a query
    fn fetch_weather(&mut self, query: &WeatherQuery) -> Result<MetarMap, AdapterError>;

    /// Whether the host process is currently running
    fn is_host_running(&self) -> bool;

    /// Adapter health after the last call
    fn internal_state(&self) -> AdapterState;
}

impl<T: SimAdapter + ?Sized> SimAdapter for Box<T> {
    fn connect(&mut self) -> Result<(), AdapterError> {
        (**self).connect()
    }

    fn fetch_telemetry(&mut self, ai_radius_km: u32) -> Result<TelemetryFrame, AdapterError> {
        (**self).fetch_telemetry(ai_radius_km)
    }

    fn fetch_weather(&mut self, query: &WeatherQuery) -> Result<MetarMap, AdapterError> {
        (**self).fetch_weather(query)
    }

    fn is_host_running(&self) -> bool {
        (**self).is_host_running()
    }

    fn internal_state(&self) -> AdapterState {
        (**self).internal_state()
    }
}
