//! Simulator telemetry acquisition engine
//!
//! This crate polls a flight simulator through a [`SimAdapter`] on a fixed
//! cadence and delivers each sample as a [`SimPacket`] on an event channel.
//! It survives the simulator going away, serves ad-hoc weather queries
//! submitted from any thread, and can record a session to disk and play it
//! back later without a simulator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐  submit_weather   ┌────────────────────────────┐
//! │  Host application   │──────────────────►│  WeatherChannel (1 slot)   │
//! │  (UI, CLI, tests)   │                   └─────────────┬──────────────┘
//! │                     │  AcquisitionEvent               │ take per cycle
//! │                     │◄──────────┐       ┌─────────────▼──────────────┐
//! └─────────────────────┘           └───────│  AcquisitionLoop           │
//!                                           │  (thread "sim-acquisition")│
//!                                           └──┬──────────────────┬──────┘
//!                                              │                  │
//!                                     ┌────────▼───────┐  ┌───────▼────────┐
//!                                     │  SimAdapter    │  │  Replay file   │
//!                                     └────────────────┘  └────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use simlink_acquire::{AcquisitionConfig, AcquisitionEvent, AcquisitionService};
//! use simlink_sim::VirtualHost;
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), simlink_acquire::AcquireError> {
//! let (event_tx, mut event_rx) = mpsc::channel(256);
//! let service = AcquisitionService::start(
//!     VirtualHost::new("Demo"),
//!     AcquisitionConfig::default(),
//!     event_tx,
//! )?;
//!
//! while let Some(event) = event_rx.recv().await {
//!     if let AcquisitionEvent::DataReceived(packet) = event {
//!         println!("packet {}", packet.packet_id());
//!         break;
//!     }
//! }
//!
//! let _host = service.stop()?;
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod replay_store;
pub mod service;
pub mod weather;

pub use acquisition::{AcquisitionLoop, IDLE_INTERVAL};
pub use config::{AcquisitionConfig, SessionMode};
pub use connection::{ConnectOutcome, ConnectionManager, LinkState, RECONNECT_TICK};
pub use error::AcquireError;
pub use events::AcquisitionEvent;
pub use replay_store::{ReplayReader, ReplayWriter};
pub use service::{AcquisitionService, WORKER_THREAD_NAME};
pub use weather::{CycleGuard, WeatherChannel};

// Re-export the packet vocabulary so most callers need only this crate
pub use simlink_protocol::{
    AdapterError, AdapterState, MetarMap, PacketStatus, SimAdapter, SimPacket, TelemetryFrame,
    WeatherQuery,
};
