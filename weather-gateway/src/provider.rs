use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};
use tokio_util::sync::CancellationToken;

use crate::{
    error::UpstreamFailure,
    model::{LocationQuery, UnitPreference},
    normalize::RawWeatherPayload,
};

pub mod openweather;

/// Upstream services the gateway holds credentials for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    OpenCage,
    TimezoneDb,
    GeoDb,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::OpenCage => "opencage",
            ProviderId::TimezoneDb => "timezonedb",
            ProviderId::GeoDb => "geodb",
        }
    }

    /// Environment variable that overrides the configured credential.
    pub fn env_var(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
            ProviderId::OpenCage => "OPENCAGE_API_KEY",
            ProviderId::TimezoneDb => "TIMEZONEDB_API_KEY",
            ProviderId::GeoDb => "GEODB_API_KEY",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenWeather,
            ProviderId::OpenCage,
            ProviderId::TimezoneDb,
            ProviderId::GeoDb,
        ]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "opencage" => Ok(ProviderId::OpenCage),
            "timezonedb" => Ok(ProviderId::TimezoneDb),
            "geodb" => Ok(ProviderId::GeoDb),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, opencage, timezonedb, geodb."
            )),
        }
    }
}

/// Source of current-weather payloads. One attempt per call; no retries.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(
        &self,
        query: &LocationQuery,
        unit: UnitPreference,
        cancel: &CancellationToken,
    ) -> Result<RawWeatherPayload, UpstreamFailure>;
}
