//! Weather query descriptors

/// A position on the earth in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPosition {
    /// Latitude, positive north
    pub lat: f64,
    /// Longitude, positive east
    pub lon: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Check that both coordinates are finite and in range
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great circle distance in nautical miles
    pub fn distance_nm(&self, other: &GeoPosition) -> f64 {
        const EARTH_RADIUS_NM: f64 = 3440.065;

        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_NM * a.sqrt().asin()
    }
}

/// What weather the host should look up
///
/// Only one query is ever pending; see the acquisition crate's weather
/// channel for the latest-wins rules.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeatherQuery {
    /// Report for a single station
    Station {
        /// ICAO identifier, e.g. "KSEA"
        ident: String,
    },
    /// Report of the station closest to a position
    Nearest {
        position: GeoPosition,
    },
    /// All reports within a radius around a position
    Area {
        position: GeoPosition,
        radius_nm: f64,
    },
}

impl WeatherQuery {
    /// Query a single station by identifier
    pub fn station(ident: impl Into<String>) -> Self {
        WeatherQuery::Station {
            ident: ident.into(),
        }
    }

    /// Query the station nearest to a position
    pub fn nearest(lat: f64, lon: f64) -> Self {
        WeatherQuery::Nearest {
            position: GeoPosition::new(lat, lon),
        }
    }

    /// Query all stations within a radius
    pub fn area(lat: f64, lon: f64, radius_nm: f64) -> Self {
        WeatherQuery::Area {
            position: GeoPosition::new(lat, lon),
            radius_nm,
        }
    }

    /// Whether this query can be serviced at all
    pub fn is_valid(&self) -> bool {
        match self {
            WeatherQuery::Station { ident } => {
                !ident.trim().is_empty() && ident.chars().all(|c| c.is_ascii_alphanumeric())
            }
            WeatherQuery::Nearest { position } => position.is_valid(),
            WeatherQuery::Area {
                position,
                radius_nm,
            } => position.is_valid() && radius_nm.is_finite() && *radius_nm > 0.0,
        }
    }
}
