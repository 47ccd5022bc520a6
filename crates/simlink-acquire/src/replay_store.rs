//! Replay files on disk
//!
//! [`ReplayWriter`] persists telemetry packets while recording and
//! [`ReplayReader`] plays them back. The byte layout lives in
//! `simlink_protocol::replay`; this module owns the file handles.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use simlink_protocol::replay::{read_record, write_record};
use simlink_protocol::{
    RecordRead, ReplayFormatError, ReplayHeader, SimPacket, REPLAY_DATA_OFFSET,
    WEATHER_PACKET_ID,
};
use tracing::{debug, info};

use crate::error::AcquireError;

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Appends telemetry records to a new replay file
#[derive(Debug)]
pub struct ReplayWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
}

impl ReplayWriter {
    /// Create (or truncate) `path` and write the header
    pub fn create(path: &Path, update_rate_ms: u32) -> Result<Self, AcquireError> {
        let open_err = |source: ReplayFormatError| AcquireError::ReplayOpen {
            path: display(path),
            source,
        };

        let file = File::create(path).map_err(|e| open_err(e.into()))?;
        let mut writer = BufWriter::new(file);
        ReplayHeader::new(update_rate_ms)
            .write(&mut writer)
            .map_err(|e| open_err(e.into()))?;

        info!("Recording to {} at {} ms", path.display(), update_rate_ms);
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            records: 0,
        })
    }

    /// Append one telemetry packet
    ///
    /// Weather replies are not part of a recording and are refused.
    pub fn append(&mut self, packet: &SimPacket) -> Result<(), AcquireError> {
        if packet.packet_id() == WEATHER_PACKET_ID {
            return Err(self.write_err(ReplayFormatError::NotTelemetry(packet.packet_id())));
        }
        write_record(&mut self.writer, packet).map_err(|e| self.write_err(e))?;
        self.records += 1;
        Ok(())
    }

    fn write_err(&self, source: ReplayFormatError) -> AcquireError {
        AcquireError::ReplayWrite {
            path: display(&self.path),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended so far
    pub fn records_written(&self) -> u64 {
        self.records
    }

    /// Flush buffered records and close the file
    pub fn close(mut self) -> Result<(), AcquireError> {
        self.writer
            .flush()
            .map_err(|e| self.write_err(e.into()))?;
        debug!(
            "Closed recording {} after {} records",
            self.path.display(),
            self.records
        );
        Ok(())
    }
}

/// Sequential reader over an existing replay file
#[derive(Debug)]
pub struct ReplayReader {
    path: PathBuf,
    reader: BufReader<File>,
    header: ReplayHeader,
}

impl ReplayReader {
    /// Open and validate a replay file
    ///
    /// Files no larger than the header are rejected before the header is
    /// examined; then the magic and version are checked in that order.
    pub fn open(path: &Path) -> Result<Self, AcquireError> {
        let open_err = |source: ReplayFormatError| AcquireError::ReplayOpen {
            path: display(path),
            source,
        };

        let file = File::open(path).map_err(|e| open_err(e.into()))?;
        let len = file.metadata().map_err(|e| open_err(e.into()))?.len();
        ReplayHeader::check_file_len(len).map_err(open_err)?;

        let mut reader = BufReader::new(file);
        let header = ReplayHeader::read(&mut reader).map_err(open_err)?;

        debug!(
            "Opened replay {} ({} bytes, {} ms)",
            path.display(),
            len,
            header.update_rate_ms
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            header,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rate the file was recorded at
    pub fn update_rate_ms(&self) -> u32 {
        self.header.update_rate_ms
    }

    /// Read the next record
    pub fn read_next(&mut self) -> Result<RecordRead, AcquireError> {
        read_record(&mut self.reader).map_err(|source| AcquireError::ReplayRead {
            path: display(&self.path),
            source,
        })
    }

    /// Position back at the first record
    pub fn rewind(&mut self) -> Result<(), AcquireError> {
        self.reader.seek(SeekFrom::Start(REPLAY_DATA_OFFSET))?;
        Ok(())
    }

    /// Read every remaining record, stopping at the end of data
    pub fn read_to_end(&mut self) -> Result<Vec<SimPacket>, AcquireError> {
        let mut packets = Vec::new();
        while let RecordRead::Packet(packet) = self.read_next()? {
            packets.push(packet);
        }
        Ok(packets)
    }
}
