//! SimLink Simulation Library
//!
//! This crate provides a virtual simulation host for testing and demonstrating
//! the acquisition engine without a running simulator. It includes:
//!
//! - **VirtualHost**: a [`SimAdapter`](simlink_protocol::SimAdapter) backed by
//!   a deterministic flight model and a table of weather stations
//! - **VirtualHostControl**: a cloneable handle to stop/start the host, refuse
//!   connections or fail fetches while the host is owned by the worker
//! - **AircraftState**: the JSON telemetry payload the virtual host produces
//!
//! # Example
//!
//! ```rust
//! use simlink_protocol::{SimAdapter, WeatherQuery};
//! use simlink_sim::{AircraftState, VirtualHost};
//!
//! let mut host = VirtualHost::new("sim-1");
//! host.connect().unwrap();
//!
//! let frame = host.fetch_telemetry(200).unwrap();
//! let state = AircraftState::decode(&frame.payload).unwrap();
//! assert!(state.altitude_ft > 0.0);
//!
//! let metars = host.fetch_weather(&WeatherQuery::station("KSEA")).unwrap();
//! assert!(metars.contains_key("KSEA"));
//! ```

pub mod aircraft;
pub mod host;
pub mod stations;

pub use aircraft::{AircraftState, FlightModel};
pub use host::{HostJournal, VirtualHost, VirtualHostConfig, VirtualHostControl};
pub use stations::{StationTable, WeatherStation};
