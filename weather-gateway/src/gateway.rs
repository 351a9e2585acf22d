//! Request orchestration: admission, resolution, upstream fetch, normalization.
//!
//! Each request walks `Received -> Admitted -> Resolved -> Fetched -> Normalized`
//! and stops at the first failure. Failures are surfaced once, without retries.

use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    config::Config,
    error::GatewayError,
    geocode::ReverseGeocodeClient,
    model::{
        Coordinates, LocationQuery, PlaceResolution, TimezoneResolution, UnitPreference,
        WeatherParams, WeatherSnapshot,
    },
    normalize::normalize,
    provider::{ProviderId, WeatherProvider, openweather::OpenWeatherProvider},
    rate_limit::{Admission, RateLimiter},
    resolver,
    timezone::{LocalClock, TimezoneClient},
};

/// Transport-neutral response: HTTP status plus JSON body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GatewayResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub body: serde_json::Value,
}

impl GatewayResponse {
    fn ok(snapshot: &WeatherSnapshot) -> Self {
        match serde_json::to_value(snapshot) {
            Ok(body) => Self {
                status: 200,
                retry_after_secs: None,
                body,
            },
            Err(e) => Self::from_error(&GatewayError::UpstreamParse(e.to_string())),
        }
    }

    pub fn from_error(err: &GatewayError) -> Self {
        Self {
            status: err.status_code(),
            retry_after_secs: err.retry_after().map(ceil_secs),
            body: err.body(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

#[derive(Debug)]
pub struct Gateway {
    limiter: RateLimiter,
    weather: Arc<dyn WeatherProvider>,
    geocoder: Option<ReverseGeocodeClient>,
    timezone: Option<TimezoneClient>,
}

impl Gateway {
    pub fn new(weather: Arc<dyn WeatherProvider>, limiter: RateLimiter) -> Self {
        Self {
            limiter,
            weather,
            geocoder: None,
            timezone: None,
        }
    }

    pub fn with_geocoder(mut self, geocoder: ReverseGeocodeClient) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_timezone(mut self, timezone: TimezoneClient) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// Build from configuration. The weather credential is required; geocoding and
    /// timezone lookups are enabled only when their credentials are present.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = &config.gateway;
        settings.validate()?;
        let timeout = settings.request_timeout();

        let weather = OpenWeatherProvider::new(
            config.require_api_key(ProviderId::OpenWeather)?.to_owned(),
            &settings.endpoints.weather_url,
            timeout,
        )?;
        let mut gateway = Gateway::new(Arc::new(weather), RateLimiter::new(&settings.rate_limit));

        if let Some(key) = config.provider_api_key(ProviderId::OpenCage) {
            gateway = gateway.with_geocoder(ReverseGeocodeClient::new(
                key.to_owned(),
                &settings.endpoints.geocode_url,
                timeout,
            )?);
        }
        if let Some(key) = config.provider_api_key(ProviderId::TimezoneDb) {
            gateway = gateway.with_timezone(TimezoneClient::new(
                key.to_owned(),
                &settings.endpoints.timezone_url,
                timeout,
            )?);
        }

        Ok(gateway)
    }

    fn admit(&self, identity: &str) -> Result<(), GatewayError> {
        match self.limiter.admit(identity) {
            Admission::Allowed => {
                tracing::debug!(stage = "admitted");
                Ok(())
            }
            Admission::Rejected { retry_after } => {
                tracing::debug!(stage = "rate_limited", retry_after_secs = retry_after.as_secs());
                Err(GatewayError::RateLimited { retry_after })
            }
        }
    }

    /// `GET /api/weather` semantics: status and JSON body for the given parameters.
    pub async fn handle(
        &self,
        identity: &str,
        params: &WeatherParams,
        cancel: &CancellationToken,
    ) -> GatewayResponse {
        match self.weather(identity, params, cancel).await {
            Ok(snapshot) => GatewayResponse::ok(&snapshot),
            Err(err) => GatewayResponse::from_error(&err),
        }
    }

    #[instrument(skip(self, params, cancel), fields(city = ?params.city, lat = ?params.lat, lon = ?params.lon))]
    pub async fn weather(
        &self,
        identity: &str,
        params: &WeatherParams,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, GatewayError> {
        tracing::debug!(stage = "received");
        let result = async {
            self.admit(identity)?;
            let unit = params.unit_preference()?;
            let query = resolver::resolve(params)?;
            tracing::debug!(stage = "resolved", ?query, %unit);
            self.fetch_snapshot(&query, unit, cancel).await
        }
        .await;
        log_outcome(&result);
        result
    }

    async fn fetch_snapshot(
        &self,
        query: &LocationQuery,
        unit: UnitPreference,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, GatewayError> {
        let raw = self.weather.fetch(query, unit, cancel).await?;
        tracing::debug!(stage = "fetched");
        let snapshot = normalize(raw, unit)?;
        tracing::debug!(stage = "normalized");
        Ok(snapshot)
    }

    /// Reverse geocode a position; `Absent` is returned as a value, not an error.
    #[instrument(skip(self, cancel))]
    pub async fn place_for_position(
        &self,
        identity: &str,
        lat: f64,
        lon: f64,
        cancel: &CancellationToken,
    ) -> Result<PlaceResolution, GatewayError> {
        self.admit(identity)?;
        let coord = Coordinates::new(lat, lon)?;
        self.resolve_place(coord, cancel).await
    }

    async fn resolve_place(
        &self,
        coord: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<PlaceResolution, GatewayError> {
        let geocoder = self
            .geocoder
            .as_ref()
            .ok_or(GatewayError::NotConfigured("Reverse geocoding"))?;
        Ok(geocoder.resolve_coordinates(coord, cancel).await?)
    }

    /// Coordinates -> place name -> weather by name. One admission covers the chain,
    /// and `cancel` aborts whichever upstream call is in flight.
    #[instrument(skip(self, cancel))]
    pub async fn weather_for_position(
        &self,
        identity: &str,
        lat: f64,
        lon: f64,
        unit: UnitPreference,
        cancel: &CancellationToken,
    ) -> Result<WeatherSnapshot, GatewayError> {
        let result = async {
            self.admit(identity)?;
            let coord = Coordinates::new(lat, lon)?;
            let name = match self.resolve_place(coord, cancel).await? {
                PlaceResolution::Resolved(name) => name,
                PlaceResolution::Absent => return Err(GatewayError::LocationNotDetected),
            };
            tracing::debug!(stage = "resolved", place = %name);
            self.fetch_snapshot(&LocationQuery::ByName(name), unit, cancel)
                .await
        }
        .await;
        log_outcome(&result);
        result
    }

    #[instrument(skip(self, cancel))]
    pub async fn timezone_for_position(
        &self,
        identity: &str,
        lat: f64,
        lon: f64,
        cancel: &CancellationToken,
    ) -> Result<TimezoneResolution, GatewayError> {
        self.admit(identity)?;
        let coord = Coordinates::new(lat, lon)?;
        self.resolve_timezone(coord, cancel).await
    }

    async fn resolve_timezone(
        &self,
        coord: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<TimezoneResolution, GatewayError> {
        let client = self
            .timezone
            .as_ref()
            .ok_or(GatewayError::NotConfigured("Timezone lookup"))?;
        Ok(client.resolve_timezone(coord, cancel).await?)
    }

    /// Coordinates -> timezone -> current local time.
    #[instrument(skip(self, cancel))]
    pub async fn local_clock(
        &self,
        identity: &str,
        lat: f64,
        lon: f64,
        cancel: &CancellationToken,
    ) -> Result<LocalClock, GatewayError> {
        match self.timezone_for_position(identity, lat, lon, cancel).await? {
            TimezoneResolution::Resolved(tz) => Ok(LocalClock::now(tz)),
            TimezoneResolution::Unrecognized(zone) => {
                tracing::warn!(%zone, "timezone provider returned an unknown zone");
                Err(GatewayError::TimezoneNotFound)
            }
            TimezoneResolution::Absent => Err(GatewayError::TimezoneNotFound),
        }
    }
}

fn log_outcome(result: &Result<WeatherSnapshot, GatewayError>) {
    match result {
        Ok(snapshot) => tracing::info!(
            city = %snapshot.city,
            country = %snapshot.country,
            "weather request completed"
        ),
        Err(err) => tracing::warn!(
            status = err.status_code(),
            error = %err,
            "weather request failed"
        ),
    }
}
