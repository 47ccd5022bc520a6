//! Deterministic flight model for the virtual host
//!
//! The model flies a constant-rate turn at fixed speed, so consecutive samples
//! are easy to tell apart and tests can predict them.

use serde::{Deserialize, Serialize};
use simlink_protocol::GeoPosition;

/// Telemetry payload produced by the virtual host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftState {
    /// Sample number since the host connected
    pub sequence: u64,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    /// True heading in degrees
    pub heading_deg: f64,
    pub ground_speed_kts: f64,
    /// Number of AI aircraft reported within the requested radius
    pub ai_traffic: u32,
}

impl AircraftState {
    /// Encode as the opaque packet payload
    pub fn encode(&self) -> Vec<u8> {
        // Serializing plain numeric fields cannot fail
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Decode a payload produced by [`AircraftState::encode`]
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.lat, self.lon)
    }
}

/// Simple constant-turn flight model
#[derive(Debug, Clone)]
pub struct FlightModel {
    state: AircraftState,
    /// Degrees of heading change per sample
    turn_rate_deg: f64,
    /// Simulated seconds per sample
    step_secs: f64,
}

impl FlightModel {
    /// Start a flight at a position
    pub fn new(start: GeoPosition, altitude_ft: f64, ground_speed_kts: f64) -> Self {
        Self {
            state: AircraftState {
                sequence: 0,
                lat: start.lat,
                lon: start.lon,
                altitude_ft,
                heading_deg: 0.0,
                ground_speed_kts,
                ai_traffic: 0,
            },
            turn_rate_deg: 3.0,
            step_secs: 1.0,
        }
    }

    /// Current state without advancing
    pub fn current(&self) -> &AircraftState {
        &self.state
    }

    /// Advance one sample and return the new state
    ///
    /// `ai_radius_km` scales the reported AI traffic count so that callers can
    /// see the radius they asked for reflected in the payload.
    pub fn step(&mut self, ai_radius_km: u32) -> AircraftState {
        let distance_nm = self.state.ground_speed_kts * self.step_secs / 3600.0;
        let heading = self.state.heading_deg.to_radians();

        self.state.lat += distance_nm * heading.cos() / 60.0;
        let cos_lat = self.state.lat.to_radians().cos().max(1e-6);
        self.state.lon += distance_nm * heading.sin() / (60.0 * cos_lat);

        self.state.heading_deg = (self.state.heading_deg + self.turn_rate_deg) % 360.0;
        self.state.sequence += 1;
        self.state.ai_traffic = ai_radius_km / 50;

        self.state.clone()
    }

    /// Reset the sample counter (used when the host link is re-established)
    pub fn reset_sequence(&mut self) {
        self.state.sequence = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_advances_sequence_and_heading() {
        let mut model = FlightModel::new(GeoPosition::new(47.45, -122.31), 5000.0, 180.0);

        let first = model.step(200);
        let second = model.step(200);

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert_eq!(second.heading_deg, 6.0);
        assert_eq!(first.ai_traffic, 4);
        // Heading 0 on the first step: moving north
        assert!(first.lat > 47.45);
    }

    #[test]
    fn test_payload_round_trip() {
        let mut model = FlightModel::new(GeoPosition::new(51.47, -0.46), 3000.0, 140.0);
        let state = model.step(100);

        let decoded = AircraftState::decode(&state.encode()).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(AircraftState::decode(b"not json").is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn samples_stay_sane(
                lat in -80.0f64..80.0,
                lon in -179.0f64..179.0,
                gs in 0.0f64..600.0,
                steps in 1usize..200,
            ) {
                let mut model = FlightModel::new(GeoPosition::new(lat, lon), 5000.0, gs);
                for expected in 1..=steps as u64 {
                    let state = model.step(200);
                    prop_assert_eq!(state.sequence, expected);
                    prop_assert!((0.0..360.0).contains(&state.heading_deg));
                    prop_assert!(state.lat.is_finite() && state.lon.is_finite());
                }
            }
        }
    }
}
