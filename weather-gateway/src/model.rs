use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::GatewayError;

/// Unit system for temperature and wind speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitPreference {
    #[default]
    Metric,
    Imperial,
}

impl UnitPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitPreference::Metric => "metric",
            UnitPreference::Imperial => "imperial",
        }
    }

    pub fn temperature_label(&self) -> &'static str {
        match self {
            UnitPreference::Metric => "°C",
            UnitPreference::Imperial => "°F",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            UnitPreference::Metric => "m/s",
            UnitPreference::Imperial => "mph",
        }
    }
}

impl fmt::Display for UnitPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitPreference {
    type Err = GatewayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "metric" => Ok(UnitPreference::Metric),
            "imperial" => Ok(UnitPreference::Imperial),
            _ => Err(GatewayError::InvalidInput(format!(
                "unit must be 'metric' or 'imperial', got '{value}'"
            ))),
        }
    }
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Validates ranges: latitude in [-90, 90], longitude in [-180, 180].
    pub fn new(lat: f64, lon: f64) -> Result<Self, GatewayError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GatewayError::InvalidInput(format!(
                "lat must be a number between -90 and 90, got {lat}"
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(GatewayError::InvalidInput(format!(
                "lon must be a number between -180 and 180, got {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

/// Exactly one way of addressing the weather provider.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    ByName(String),
    ByCoordinates(Coordinates),
}

/// Raw inbound parameters, as they arrive on a `GET /api/weather` query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WeatherParams {
    pub city: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub unit: Option<String>,
}

impl WeatherParams {
    pub fn city(name: impl Into<String>) -> Self {
        Self {
            city: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn position(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat.to_string()),
            lon: Some(lon.to_string()),
            ..Self::default()
        }
    }

    pub fn with_unit(mut self, unit: UnitPreference) -> Self {
        self.unit = Some(unit.as_str().to_string());
        self
    }

    /// Parse a raw `a=b&c=d` query string. Unknown keys are ignored; a repeated key keeps
    /// its last value.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match &*key {
                "city" => &mut params.city,
                "lat" => &mut params.lat,
                "lon" => &mut params.lon,
                "unit" => &mut params.unit,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }

        params
    }

    /// Requested unit system; absent or blank means metric.
    pub fn unit_preference(&self) -> Result<UnitPreference, GatewayError> {
        match self.unit.as_deref().map(str::trim) {
            None | Some("") => Ok(UnitPreference::default()),
            Some(raw) => raw.parse(),
        }
    }
}

/// Normalized weather output returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub city: String,
    pub country: String,
    pub temp: f64,
    pub weather: String,
    pub icon: String,
    pub humidity: u8,
    pub wind_speed: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coord: Option<Coordinates>,
    pub unit: UnitPreference,
}

/// Outcome of reverse geocoding a coordinate pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceResolution {
    Resolved(String),
    Absent,
}

/// Outcome of a position-based timezone lookup.
///
/// `Unrecognized` carries an identifier the provider returned that is not part of the
/// IANA database; callers cannot render a clock for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimezoneResolution {
    Resolved(chrono_tz::Tz),
    Unrecognized(String),
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_defaults_to_metric() {
        let params = WeatherParams::city("Paris");
        assert_eq!(params.unit_preference().unwrap(), UnitPreference::Metric);

        let blank = WeatherParams {
            unit: Some("  ".into()),
            ..WeatherParams::city("Paris")
        };
        assert_eq!(blank.unit_preference().unwrap(), UnitPreference::Metric);
    }

    #[test]
    fn unit_parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("Imperial".parse::<UnitPreference>().unwrap(), UnitPreference::Imperial);
        let err = "kelvin".parse::<UnitPreference>().unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[test]
    fn from_query_decodes_and_ignores_unknown_keys() {
        let params = WeatherParams::from_query("?city=S%C3%A3o+Paulo&unit=imperial&debug=1");
        assert_eq!(params.city.as_deref(), Some("São Paulo"));
        assert_eq!(params.unit.as_deref(), Some("imperial"));
        assert_eq!(params.lat, None);
    }

    #[test]
    fn coordinates_reject_out_of_range_and_non_finite() {
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert!(Coordinates::new(90.5, 0.0).is_err());
        assert!(Coordinates::new(0.0, 180.01).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn snapshot_serializes_with_wire_names() {
        let snapshot = WeatherSnapshot {
            city: "Paris".into(),
            country: "FR".into(),
            temp: 15.2,
            weather: "light rain".into(),
            icon: "10d".into(),
            humidity: 60,
            wind_speed: 3.4,
            coord: None,
            unit: UnitPreference::Metric,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["windSpeed"], 3.4);
        assert_eq!(json["unit"], "metric");
        assert!(json.get("coord").is_none());
    }
}
