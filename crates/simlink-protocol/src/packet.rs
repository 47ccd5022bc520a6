//! Telemetry packet envelope

use std::collections::BTreeMap;

/// Packet id reserved for weather-only replies
pub const WEATHER_PACKET_ID: u64 = 0;

/// Raw METAR reports keyed by station identifier
pub type MetarMap = BTreeMap<String, String>;

/// Outcome of the acquisition that produced a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketStatus {
    #[default]
    Ok,
    Error,
}

impl PacketStatus {
    /// Wire value used by the replay format
    pub fn as_byte(self) -> u8 {
        match self {
            PacketStatus::Ok => 0,
            PacketStatus::Error => 1,
        }
    }

    /// Parse a wire value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(PacketStatus::Ok),
            1 => Some(PacketStatus::Error),
            _ => None,
        }
    }
}

/// One unit of delivered data: a telemetry sample or a weather reply
///
/// Packets are built once per acquisition cycle and never mutated after
/// delivery. `packet_id` is 0 for weather-only replies and strictly positive
/// for telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimPacket {
    packet_id: u64,
    timestamp_epoch_secs: u64,
    status: PacketStatus,
    status_text: Option<String>,
    metars: MetarMap,
    payload: Vec<u8>,
}

impl SimPacket {
    /// Create a successful telemetry packet
    pub fn telemetry(packet_id: u64, timestamp_epoch_secs: u64, payload: Vec<u8>) -> Self {
        Self {
            packet_id,
            timestamp_epoch_secs,
            status: PacketStatus::Ok,
            status_text: None,
            metars: MetarMap::new(),
            payload,
        }
    }

    /// Create a weather-only reply (always carries the reserved id 0)
    pub fn weather_reply(timestamp_epoch_secs: u64, metars: MetarMap) -> Self {
        Self {
            packet_id: WEATHER_PACKET_ID,
            timestamp_epoch_secs,
            status: PacketStatus::Ok,
            status_text: None,
            metars,
            payload: Vec::new(),
        }
    }

    /// Create a packet reporting a failed acquisition
    pub fn error(packet_id: u64, timestamp_epoch_secs: u64, text: impl Into<String>) -> Self {
        Self {
            packet_id,
            timestamp_epoch_secs,
            status: PacketStatus::Error,
            status_text: Some(text.into()),
            metars: MetarMap::new(),
            payload: Vec::new(),
        }
    }

    /// Assemble a packet from already-validated fields
    ///
    /// `status_text` is dropped unless `status` is `Error`.
    pub fn from_parts(
        packet_id: u64,
        timestamp_epoch_secs: u64,
        status: PacketStatus,
        status_text: Option<String>,
        metars: MetarMap,
        payload: Vec<u8>,
    ) -> Self {
        let status_text = match status {
            PacketStatus::Error => Some(status_text.unwrap_or_default()),
            PacketStatus::Ok => None,
        };
        Self {
            packet_id,
            timestamp_epoch_secs,
            status,
            status_text,
            metars,
            payload,
        }
    }

    /// Attach METAR reports to a packet under construction
    pub fn with_metars(mut self, metars: MetarMap) -> Self {
        self.metars = metars;
        self
    }

    pub fn packet_id(&self) -> u64 {
        self.packet_id
    }

    pub fn timestamp_epoch_secs(&self) -> u64 {
        self.timestamp_epoch_secs
    }

    pub fn status(&self) -> PacketStatus {
        self.status
    }

    /// Error description, only present on `PacketStatus::Error`
    pub fn status_text(&self) -> Option<&str> {
        self.status_text.as_deref()
    }

    pub fn metars(&self) -> &MetarMap {
        &self.metars
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True for weather-only replies
    pub fn is_weather_reply(&self) -> bool {
        self.packet_id == WEATHER_PACKET_ID
    }

    pub fn is_ok(&self) -> bool {
        self.status == PacketStatus::Ok
    }
}
