//! Weather station table for the virtual host

use serde::{Deserialize, Serialize};
use simlink_protocol::{GeoPosition, MetarMap, WeatherQuery};

/// A reporting station with its current METAR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherStation {
    /// ICAO identifier
    pub ident: String,
    pub lat: f64,
    pub lon: f64,
    /// Raw METAR text
    pub metar: String,
}

impl WeatherStation {
    pub fn new(ident: &str, lat: f64, lon: f64, metar: &str) -> Self {
        Self {
            ident: ident.to_string(),
            lat,
            lon,
            metar: metar.to_string(),
        }
    }

    pub fn position(&self) -> GeoPosition {
        GeoPosition::new(self.lat, self.lon)
    }
}

/// Set of stations answering weather queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationTable {
    stations: Vec<WeatherStation>,
}

impl StationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handful of Pacific Northwest stations
    pub fn pacific_northwest() -> Self {
        Self {
            stations: vec![
                WeatherStation::new(
                    "KSEA",
                    47.4490,
                    -122.3093,
                    "KSEA 121253Z 17008KT 10SM FEW045 BKN250 12/06 A3002",
                ),
                WeatherStation::new(
                    "KBFI",
                    47.5300,
                    -122.3019,
                    "KBFI 121253Z 16006KT 10SM SCT040 12/07 A3002",
                ),
                WeatherStation::new(
                    "KPAE",
                    47.9063,
                    -122.2816,
                    "KPAE 121253Z 18010KT 9SM OVC035 11/07 A3001",
                ),
                WeatherStation::new(
                    "KPDX",
                    45.5887,
                    -122.5975,
                    "KPDX 121253Z 20012G20KT 10SM -RA BKN030 OVC060 13/09 A2998",
                ),
            ],
        }
    }

    pub fn insert(&mut self, station: WeatherStation) {
        self.stations.retain(|s| s.ident != station.ident);
        self.stations.push(station);
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Answer a weather query
    ///
    /// Unknown stations and empty areas produce an empty map rather than an
    /// error, as a real host does.
    pub fn lookup(&self, query: &WeatherQuery) -> MetarMap {
        match query {
            WeatherQuery::Station { ident } => self
                .stations
                .iter()
                .filter(|s| s.ident.eq_ignore_ascii_case(ident))
                .map(|s| (s.ident.clone(), s.metar.clone()))
                .collect(),
            WeatherQuery::Nearest { position } => self
                .stations
                .iter()
                .min_by(|a, b| {
                    a.position()
                        .distance_nm(position)
                        .total_cmp(&b.position().distance_nm(position))
                })
                .map(|s| (s.ident.clone(), s.metar.clone()))
                .into_iter()
                .collect(),
            WeatherQuery::Area {
                position,
                radius_nm,
            } => self
                .stations
                .iter()
                .filter(|s| s.position().distance_nm(position) <= *radius_nm)
                .map(|s| (s.ident.clone(), s.metar.clone()))
                .collect(),
        }
    }
}
