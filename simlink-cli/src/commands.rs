//! Subcommand implementations

use std::collections::VecDeque;
use std::path::Path;

use anyhow::Context;
use simlink_acquire::{
    AcquisitionConfig, AcquisitionEvent, AcquisitionService, ReplayReader, SimPacket,
    WeatherQuery,
};
use simlink_sim::{AircraftState, VirtualHost, VirtualHostConfig};
use tokio::sync::mpsc;
use tracing::{info, warn};

const EVENT_BUFFER: usize = 256;

/// One line describing a packet
pub fn format_packet(packet: &SimPacket) -> String {
    if !packet.is_ok() {
        return format!(
            "#{} ERROR {}",
            packet.packet_id(),
            packet.status_text().unwrap_or("unknown error")
        );
    }

    if packet.is_weather_reply() {
        if packet.metars().is_empty() {
            return "weather: no reports".to_string();
        }
        let reports: Vec<&str> = packet.metars().values().map(String::as_str).collect();
        return format!("weather: {}", reports.join(" | "));
    }

    match AircraftState::decode(packet.payload()) {
        Ok(state) => format!(
            "#{} t={} lat={:.4} lon={:.4} alt={:.0}ft hdg={:.0} gs={:.0}kt ai={}",
            packet.packet_id(),
            packet.timestamp_epoch_secs(),
            state.lat,
            state.lon,
            state.altitude_ft,
            state.heading_deg,
            state.ground_speed_kts,
            state.ai_traffic
        ),
        Err(_) => format!(
            "#{} t={} {} payload bytes",
            packet.packet_id(),
            packet.timestamp_epoch_secs(),
            packet.payload().len()
        ),
    }
}

/// Summary of a replay file
#[derive(Debug, Default, PartialEq)]
pub struct ReplaySummary {
    pub update_rate_ms: u32,
    pub records: u64,
    pub error_records: u64,
    pub first_id: Option<u64>,
    pub last_id: Option<u64>,
    pub first_timestamp: Option<u64>,
    pub last_timestamp: Option<u64>,
    pub weather_reports: u64,
}

/// Read a replay file end to end
pub fn summarize(path: &Path) -> anyhow::Result<ReplaySummary> {
    let mut reader = ReplayReader::open(path)?;
    let mut summary = ReplaySummary {
        update_rate_ms: reader.update_rate_ms(),
        ..Default::default()
    };

    for packet in reader.read_to_end()? {
        summary.records += 1;
        if !packet.is_ok() {
            summary.error_records += 1;
        }
        summary.first_id.get_or_insert(packet.packet_id());
        summary.last_id = Some(packet.packet_id());
        summary
            .first_timestamp
            .get_or_insert(packet.timestamp_epoch_secs());
        summary.last_timestamp = Some(packet.timestamp_epoch_secs());
        summary.weather_reports += packet.metars().len() as u64;
    }
    Ok(summary)
}

pub fn inspect(path: &Path) -> anyhow::Result<()> {
    let summary =
        summarize(path).with_context(|| format!("Failed to inspect {}", path.display()))?;

    println!("{}", path.display());
    println!("  Recorded at:   {} ms", summary.update_rate_ms);
    println!("  Packets:       {}", summary.records);
    println!("  Error packets: {}", summary.error_records);
    if let (Some(first), Some(last)) = (summary.first_id, summary.last_id) {
        println!("  Packet ids:    {}..={}", first, last);
    }
    if let (Some(first), Some(last)) = (summary.first_timestamp, summary.last_timestamp) {
        println!("  Duration:      {} s", last.saturating_sub(first));
    }
    println!("  METARs:        {}", summary.weather_reports);
    Ok(())
}

/// Play a replay file, printing packets until `count` or Ctrl-C
pub async fn play(config: AcquisitionConfig, count: Option<usize>) -> anyhow::Result<()> {
    // The adapter is never contacted during playback
    let host = VirtualHost::new("Playback");
    run(host, config, count, Vec::new()).await
}

/// Acquire from a virtual host, printing packets until `count` or Ctrl-C
pub async fn simulate(
    host: VirtualHostConfig,
    config: AcquisitionConfig,
    count: Option<usize>,
    weather: Vec<WeatherQuery>,
) -> anyhow::Result<()> {
    run(VirtualHost::from_config(host), config, count, weather).await
}

async fn run(
    host: VirtualHost,
    config: AcquisitionConfig,
    count: Option<usize>,
    weather: Vec<WeatherQuery>,
) -> anyhow::Result<()> {
    let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
    let service = AcquisitionService::start(host, config, event_tx)?;

    // Queries go one at a time; a second submission would replace the first
    let mut pending: VecDeque<WeatherQuery> = weather.into();
    let mut telemetry_seen = 0usize;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    AcquisitionEvent::Connected => {
                        if let Some(query) = pending.pop_front() {
                            service.submit_weather(query);
                        }
                    }
                    AcquisitionEvent::DataReceived(packet) => {
                        println!("{}", format_packet(&packet));
                        if packet.is_weather_reply() {
                            if let Some(query) = pending.pop_front() {
                                service.submit_weather(query);
                            }
                        } else {
                            telemetry_seen += 1;
                            if count.is_some_and(|n| telemetry_seen >= n) {
                                break;
                            }
                        }
                    }
                    AcquisitionEvent::Disconnected => warn!("Simulator link lost"),
                    // Already traced by the worker
                    AcquisitionEvent::WaitingToConnect | AcquisitionEvent::LogMessage { .. } => {}
                }
            }
        }
    }

    let host = tokio::task::spawn_blocking(move || service.stop()).await??;
    info!(
        "Stopped after {} telemetry packets ({} connects)",
        telemetry_seen,
        host.control().journal().connects
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use simlink_acquire::ReplayWriter;
    use simlink_protocol::GeoPosition;
    use simlink_sim::FlightModel;

    use super::*;

    #[test]
    fn test_format_telemetry_packet() {
        let mut model = FlightModel::new(GeoPosition::new(47.4490, -122.3093), 5000.0, 180.0);
        let packet = SimPacket::telemetry(3, 1_700_000_000, model.step(200).encode());

        let line = format_packet(&packet);
        assert!(line.starts_with("#3 t=1700000000 lat=47.4"));
        assert!(line.ends_with("ai=4"));
    }

    #[test]
    fn test_format_weather_and_error_packets() {
        assert_eq!(
            format_packet(&SimPacket::weather_reply(0, BTreeMap::new())),
            "weather: no reports"
        );

        let mut metars = BTreeMap::new();
        metars.insert("KSEA".to_string(), "KSEA 121253Z 17008KT".to_string());
        assert_eq!(
            format_packet(&SimPacket::weather_reply(0, metars)),
            "weather: KSEA 121253Z 17008KT"
        );

        assert_eq!(
            format_packet(&SimPacket::error(0, 0, "station lookup failed")),
            "#0 ERROR station lookup failed"
        );
    }

    #[test]
    fn test_format_opaque_payload() {
        let packet = SimPacket::telemetry(1, 5, vec![0xFF, 0x00]);
        assert_eq!(format_packet(&packet), "#1 t=5 2 payload bytes");
    }

    #[test]
    fn test_summarize_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.slr");

        let mut metars = BTreeMap::new();
        metars.insert("KPDX".to_string(), "KPDX 121253Z 20012G20KT".to_string());

        let mut writer = ReplayWriter::create(&path, 200).unwrap();
        writer
            .append(&SimPacket::telemetry(1, 100, vec![1]).with_metars(metars))
            .unwrap();
        writer.append(&SimPacket::error(2, 101, "no data")).unwrap();
        writer.append(&SimPacket::telemetry(3, 130, vec![3])).unwrap();
        writer.close().unwrap();

        let summary = summarize(&path).unwrap();
        assert_eq!(
            summary,
            ReplaySummary {
                update_rate_ms: 200,
                records: 3,
                error_records: 1,
                first_id: Some(1),
                last_id: Some(3),
                first_timestamp: Some(100),
                last_timestamp: Some(130),
                weather_reports: 1,
            }
        );
    }

    #[test]
    fn test_summarize_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.slr");
        std::fs::write(&path, [0u8; 8]).unwrap();

        assert!(summarize(&path).is_err());
    }
}
