//! SimLink Protocol Library
//!
//! This crate holds everything the acquisition engine and its collaborators
//! agree on, without any I/O policy of its own:
//!
//! - **SimPacket**: the telemetry / weather envelope handed to consumers
//! - **WeatherQuery**: descriptor for a weather (METAR) lookup
//! - **SimAdapter**: the seam to the external simulation host
//! - **Replay format**: header and framed record codec for recorded sessions
//!
//! # Replay format
//!
//! A replay file is a 12 byte header (magic, version, capture cadence)
//! followed by a stream of framed packet records. The codec works on any
//! `Read`/`Write`, so the same code serves files and in-memory buffers.
//!
//! # Example
//!
//! ```rust
//! use simlink_protocol::replay::{read_record, write_record, RecordRead};
//! use simlink_protocol::SimPacket;
//!
//! let packet = SimPacket::telemetry(1, 1_700_000_000, b"payload".to_vec());
//!
//! let mut buf = Vec::new();
//! write_record(&mut buf, &packet).unwrap();
//!
//! let mut cursor = std::io::Cursor::new(buf);
//! match read_record(&mut cursor).unwrap() {
//!     RecordRead::Packet(read) => assert_eq!(read, packet),
//!     RecordRead::EndOfData => unreachable!(),
//! }
//! ```

pub mod adapter;
pub mod error;
pub mod packet;
pub mod replay;
pub mod weather;

pub use adapter::{AdapterState, SimAdapter, TelemetryFrame};
pub use error::{AdapterError, ReplayFormatError};
pub use packet::{MetarMap, PacketStatus, SimPacket, WEATHER_PACKET_ID};
pub use replay::{ReplayHeader, RecordRead, REPLAY_DATA_OFFSET, REPLAY_MAGIC, REPLAY_VERSION};
pub use weather::{GeoPosition, WeatherQuery};
