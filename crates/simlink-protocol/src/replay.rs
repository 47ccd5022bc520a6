//! Replay file format
//!
//! Binary layout for recorded sessions. All integers are big-endian.
//!
//! | offset | field          | type |
//! |--------|----------------|------|
//! | 0      | magic          | u32  |
//! | 4      | version        | u32  |
//! | 8      | update_rate_ms | u32  |
//! | 12     | records...     |      |
//!
//! Each record is one serialized [`SimPacket`]:
//!
//! 1. status (u8, 0 = OK, 1 = ERROR)
//! 2. status text, only when status is ERROR (u32 length + UTF-8)
//! 3. timestamp in epoch seconds (u64)
//! 4. packet id (u64)
//! 5. METAR count (u32), then per entry ident and report (u32 length + UTF-8 each)
//! 6. payload (u32 length + bytes)
//!
//! A clean end of data at a record boundary is reported as
//! [`RecordRead::EndOfData`]; running out of bytes inside a record is a
//! [`ReplayFormatError::Truncated`] error.

use std::io::{self, ErrorKind, Read, Write};

use crate::error::ReplayFormatError;
use crate::packet::{MetarMap, PacketStatus, SimPacket};

/// Magic number identifying a replay file ("SLRP")
pub const REPLAY_MAGIC: u32 = 0x534C_5250;

/// Current format version
pub const REPLAY_VERSION: u32 = 1;

/// Byte offset of the first record
pub const REPLAY_DATA_OFFSET: u64 = 12;

/// Upper bound for any single length-prefixed field
pub const MAX_FIELD_LEN: u32 = 16 * 1024 * 1024;

/// Upper bound for the number of METAR entries in one record
pub const MAX_METAR_COUNT: u32 = 65_536;

/// Replay file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayHeader {
    /// Cadence the session was captured at
    pub update_rate_ms: u32,
}

impl ReplayHeader {
    pub fn new(update_rate_ms: u32) -> Self {
        Self { update_rate_ms }
    }

    /// Write the header (magic, version, rate)
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; REPLAY_DATA_OFFSET as usize];
        buf[0..4].copy_from_slice(&REPLAY_MAGIC.to_be_bytes());
        buf[4..8].copy_from_slice(&REPLAY_VERSION.to_be_bytes());
        buf[8..12].copy_from_slice(&self.update_rate_ms.to_be_bytes());
        writer.write_all(&buf)
    }

    /// Read and validate a header
    ///
    /// Fails if the magic number or version do not match exactly.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self, ReplayFormatError> {
        let mut buf = [0u8; REPLAY_DATA_OFFSET as usize];
        read_field(reader, &mut buf, "header")?;

        let magic = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if magic != REPLAY_MAGIC {
            return Err(ReplayFormatError::BadMagic { found: magic });
        }

        let version = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if version != REPLAY_VERSION {
            return Err(ReplayFormatError::BadVersion {
                found: version,
                expected: REPLAY_VERSION,
            });
        }

        Ok(Self {
            update_rate_ms: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }

    /// Check that a file of `len` bytes can hold at least one record
    pub fn check_file_len(len: u64) -> Result<(), ReplayFormatError> {
        if len <= REPLAY_DATA_OFFSET {
            return Err(ReplayFormatError::TooSmall {
                len,
                header: REPLAY_DATA_OFFSET,
            });
        }
        Ok(())
    }
}

/// Result of reading one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRead {
    /// A complete packet
    Packet(SimPacket),
    /// No more records
    EndOfData,
}

/// Serialize one packet as a record
pub fn write_record<W: Write>(writer: &mut W, packet: &SimPacket) -> Result<(), ReplayFormatError> {
    writer.write_all(&[packet.status().as_byte()])?;
    if packet.status() == PacketStatus::Error {
        write_text(writer, packet.status_text().unwrap_or_default(), "status text")?;
    }
    writer.write_all(&packet.timestamp_epoch_secs().to_be_bytes())?;
    writer.write_all(&packet.packet_id().to_be_bytes())?;

    let count = u32::try_from(packet.metars().len())
        .ok()
        .filter(|c| *c <= MAX_METAR_COUNT)
        .ok_or(ReplayFormatError::FieldTooLarge {
            field: "metar count",
            len: u32::MAX,
            limit: MAX_METAR_COUNT,
        })?;
    writer.write_all(&count.to_be_bytes())?;
    for (ident, report) in packet.metars() {
        write_text(writer, ident, "metar ident")?;
        write_text(writer, report, "metar report")?;
    }

    write_bytes(writer, packet.payload(), "payload")?;
    Ok(())
}

/// Read the next record
pub fn read_record<R: Read>(reader: &mut R) -> Result<RecordRead, ReplayFormatError> {
    let mut status_byte = [0u8; 1];
    loop {
        match reader.read(&mut status_byte) {
            Ok(0) => return Ok(RecordRead::EndOfData),
            Ok(_) => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let status = PacketStatus::from_byte(status_byte[0])
        .ok_or(ReplayFormatError::InvalidStatus(status_byte[0]))?;

    let status_text = match status {
        PacketStatus::Error => Some(read_text(reader, "status text")?),
        PacketStatus::Ok => None,
    };

    let timestamp = read_u64(reader, "timestamp")?;
    let packet_id = read_u64(reader, "packet id")?;

    let count = read_u32(reader, "metar count")?;
    if count > MAX_METAR_COUNT {
        return Err(ReplayFormatError::FieldTooLarge {
            field: "metar count",
            len: count,
            limit: MAX_METAR_COUNT,
        });
    }
    let mut metars = MetarMap::new();
    for _ in 0..count {
        let ident = read_text(reader, "metar ident")?;
        let report = read_text(reader, "metar report")?;
        if let Some(previous) = metars.insert(ident, report) {
            tracing::warn!(
                "Record {} repeats a METAR station, dropping \"{}\"",
                packet_id,
                previous
            );
        }
    }

    let payload = read_bytes(reader, "payload")?;

    Ok(RecordRead::Packet(SimPacket::from_parts(
        packet_id,
        timestamp,
        status,
        status_text,
        metars,
        payload,
    )))
}

fn write_text<W: Write>(
    writer: &mut W,
    text: &str,
    field: &'static str,
) -> Result<(), ReplayFormatError> {
    write_bytes(writer, text.as_bytes(), field)
}

fn write_bytes<W: Write>(
    writer: &mut W,
    data: &[u8],
    field: &'static str,
) -> Result<(), ReplayFormatError> {
    let len = u32::try_from(data.len())
        .ok()
        .filter(|l| *l <= MAX_FIELD_LEN)
        .ok_or(ReplayFormatError::FieldTooLarge {
            field,
            len: u32::try_from(data.len()).unwrap_or(u32::MAX),
            limit: MAX_FIELD_LEN,
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(data)?;
    Ok(())
}

fn read_field<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    field: &'static str,
) -> Result<(), ReplayFormatError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => ReplayFormatError::Truncated { field },
        _ => ReplayFormatError::Io(e),
    })
}

fn read_u32<R: Read>(reader: &mut R, field: &'static str) -> Result<u32, ReplayFormatError> {
    let mut buf = [0u8; 4];
    read_field(reader, &mut buf, field)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R, field: &'static str) -> Result<u64, ReplayFormatError> {
    let mut buf = [0u8; 8];
    read_field(reader, &mut buf, field)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_bytes<R: Read>(reader: &mut R, field: &'static str) -> Result<Vec<u8>, ReplayFormatError> {
    let len = read_u32(reader, field)?;
    if len > MAX_FIELD_LEN {
        return Err(ReplayFormatError::FieldTooLarge {
            field,
            len,
            limit: MAX_FIELD_LEN,
        });
    }
    let mut data = vec![0u8; len as usize];
    read_field(reader, &mut data, field)?;
    Ok(data)
}

fn read_text<R: Read>(reader: &mut R, field: &'static str) -> Result<String, ReplayFormatError> {
    let data = read_bytes(reader, field)?;
    String::from_utf8(data).map_err(|_| ReplayFormatError::InvalidText { field })
}
