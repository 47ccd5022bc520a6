//! Acquisition configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AcquireError;

/// Which source feeds one run of the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionMode {
    /// Poll the live host
    Live,
    /// Poll the live host and persist telemetry to a replay file
    Recording,
    /// Read packets from a replay file, the host is never contacted
    Playing,
}

/// Configuration consumed by one run of the acquisition loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Live polling cadence in milliseconds
    pub update_rate_ms: u32,
    /// Seconds between connect attempts while the host is unreachable
    pub reconnect_interval_secs: u32,
    /// Record telemetry to this file
    pub record_path: Option<PathBuf>,
    /// Play packets from this file instead of polling the host
    pub playback_path: Option<PathBuf>,
    /// Playback speed multiplier, 2.0 plays twice as fast as recorded
    pub playback_speed: f32,
    /// Emit per-cycle debug traces
    pub verbose: bool,
    /// Radius for AI traffic included in telemetry fetches
    pub ai_radius_km: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            update_rate_ms: 500,
            reconnect_interval_secs: 10,
            record_path: None,
            playback_path: None,
            playback_speed: 1.0,
            verbose: false,
            ai_radius_km: 200,
        }
    }
}

impl AcquisitionConfig {
    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<(), AcquireError> {
        if self.update_rate_ms == 0 {
            return Err(AcquireError::InvalidConfig(
                "update rate must be at least 1 ms".to_string(),
            ));
        }
        if !self.playback_speed.is_finite() || self.playback_speed <= 0.0 {
            return Err(AcquireError::InvalidConfig(format!(
                "playback speed must be positive, got {}",
                self.playback_speed
            )));
        }
        Ok(())
    }

    /// Playback file, ignoring an empty path
    pub fn playback_path(&self) -> Option<&Path> {
        self.playback_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Record file, ignoring an empty path
    pub fn record_path(&self) -> Option<&Path> {
        self.record_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Mode a run will attempt; playback wins over recording
    pub fn requested_mode(&self) -> SessionMode {
        if self.playback_path().is_some() {
            SessionMode::Playing
        } else if self.record_path().is_some() {
            SessionMode::Recording
        } else {
            SessionMode::Live
        }
    }

    /// Sleep between live polls
    pub fn live_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.update_rate_ms.max(1)))
    }

    /// Sleep between played packets for a file captured at `recorded_rate_ms`
    pub fn playback_interval(&self, recorded_rate_ms: u32) -> Duration {
        let speed = if self.playback_speed.is_finite() && self.playback_speed > 0.0 {
            f64::from(self.playback_speed)
        } else {
            1.0
        };
        let ms = f64::from(recorded_rate_ms) / speed;
        Duration::from_secs_f64(ms.max(1.0) / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AcquisitionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.requested_mode(), SessionMode::Live);
        assert_eq!(config.live_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let zero_rate = AcquisitionConfig {
            update_rate_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_rate.validate(),
            Err(AcquireError::InvalidConfig(_))
        ));

        for speed in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let config = AcquisitionConfig {
                playback_speed: speed,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "speed {speed} accepted");
        }
    }

    #[test]
    fn test_playback_takes_precedence() {
        let config = AcquisitionConfig {
            record_path: Some(PathBuf::from("out.slr")),
            playback_path: Some(PathBuf::from("in.slr")),
            ..Default::default()
        };
        assert_eq!(config.requested_mode(), SessionMode::Playing);

        let record_only = AcquisitionConfig {
            record_path: Some(PathBuf::from("out.slr")),
            playback_path: Some(PathBuf::new()),
            ..Default::default()
        };
        assert_eq!(record_only.requested_mode(), SessionMode::Recording);
    }

    #[test]
    fn test_playback_interval_scales_with_speed() {
        let config = AcquisitionConfig {
            playback_speed: 2.0,
            ..Default::default()
        };
        assert_eq!(config.playback_interval(500), Duration::from_millis(250));

        let slow = AcquisitionConfig {
            playback_speed: 0.5,
            ..Default::default()
        };
        assert_eq!(slow.playback_interval(500), Duration::from_millis(1000));

        // Never a zero sleep
        assert_eq!(config.playback_interval(0), Duration::from_millis(1));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: AcquisitionConfig =
            serde_json::from_str(r#"{ "update_rate_ms": 250, "verbose": true }"#).unwrap();
        assert_eq!(config.update_rate_ms, 250);
        assert!(config.verbose);
        assert_eq!(config.reconnect_interval_secs, 10);
        assert_eq!(config.playback_speed, 1.0);
    }
}
