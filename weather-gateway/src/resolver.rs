//! Turns raw inbound parameters into exactly one [`LocationQuery`].

use crate::{
    error::GatewayError,
    model::{Coordinates, LocationQuery, WeatherParams},
};

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_coordinate(field: &str, raw: &str) -> Result<f64, GatewayError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GatewayError::InvalidInput(format!("{field} must be numeric, got '{raw}'")))
}

/// Coordinates supplied in `params`, if any. Supplying only one of `lat`/`lon`, a
/// non-numeric value, or an out-of-range value is an error.
fn coordinates(params: &WeatherParams) -> Result<Option<Coordinates>, GatewayError> {
    match (present(params.lat.as_deref()), present(params.lon.as_deref())) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(GatewayError::InvalidInput(
            "lon is required when lat is given".into(),
        )),
        (None, Some(_)) => Err(GatewayError::InvalidInput(
            "lat is required when lon is given".into(),
        )),
        (Some(lat), Some(lon)) => {
            let lat = parse_coordinate("lat", lat)?;
            let lon = parse_coordinate("lon", lon)?;
            Coordinates::new(lat, lon).map(Some)
        }
    }
}

/// A non-blank `city` wins over coordinates; supplied coordinates are validated either way.
pub fn resolve(params: &WeatherParams) -> Result<LocationQuery, GatewayError> {
    let coord = coordinates(params)?;

    if let Some(name) = present(params.city.as_deref()) {
        return Ok(LocationQuery::ByName(name.to_string()));
    }

    coord
        .map(LocationQuery::ByCoordinates)
        .ok_or_else(|| GatewayError::InvalidInput("Missing city or coordinates".into()))
}
