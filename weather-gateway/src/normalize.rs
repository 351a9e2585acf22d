//! Maps the weather provider's payload onto [`WeatherSnapshot`].
//!
//! Every group is optional at the deserialization layer so that a missing group
//! surfaces as a precise parse error here instead of a generic serde message.

use serde::Deserialize;

use crate::{
    error::UpstreamFailure,
    model::{Coordinates, UnitPreference, WeatherSnapshot},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWeatherPayload {
    pub name: Option<String>,
    pub sys: Option<RawSys>,
    pub main: Option<RawMain>,
    pub weather: Option<Vec<RawCondition>>,
    pub wind: Option<RawWind>,
    pub coord: Option<Coordinates>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSys {
    pub country: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMain {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCondition {
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawWind {
    pub speed: f64,
}

fn missing(group: &str) -> UpstreamFailure {
    UpstreamFailure::Parse(format!("weather payload is missing '{group}'"))
}

/// Reshape `raw` into a snapshot. Values are carried through unchanged; the unit
/// tag records the system the provider was asked for.
pub fn normalize(
    raw: RawWeatherPayload,
    unit: UnitPreference,
) -> Result<WeatherSnapshot, UpstreamFailure> {
    let city = raw.name.ok_or_else(|| missing("name"))?;
    let country = raw
        .sys
        .and_then(|sys| sys.country)
        .ok_or_else(|| missing("sys.country"))?;
    let main = raw.main.ok_or_else(|| missing("main"))?;
    let condition = raw
        .weather
        .ok_or_else(|| missing("weather"))?
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamFailure::Parse("weather payload has no condition entries".into()))?;
    let wind = raw.wind.ok_or_else(|| missing("wind"))?;

    if !(0.0..=100.0).contains(&main.humidity) || main.humidity.fract() != 0.0 {
        return Err(UpstreamFailure::Parse(format!(
            "humidity must be a whole percentage: {}",
            main.humidity
        )));
    }
    if !wind.speed.is_finite() || wind.speed < 0.0 {
        return Err(UpstreamFailure::Parse(format!(
            "wind speed must be non-negative: {}",
            wind.speed
        )));
    }

    Ok(WeatherSnapshot {
        city,
        country,
        temp: main.temp,
        weather: condition.description,
        icon: condition.icon,
        humidity: main.humidity as u8,
        wind_speed: wind.speed,
        coord: raw.coord,
        unit,
    })
}
