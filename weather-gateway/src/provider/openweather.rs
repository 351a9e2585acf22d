use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    error::UpstreamFailure,
    model::{LocationQuery, UnitPreference},
    normalize::RawWeatherPayload,
    upstream,
};

use super::WeatherProvider;

/// Current-weather client for the OpenWeather `/data/2.5/weather` endpoint.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            url: url.into(),
            http: upstream::http_client(timeout)?,
        })
    }

    /// Query parameters: the location pair for the query variant, `units`, and `appid`.
    fn query_params(&self, query: &LocationQuery, unit: UnitPreference) -> Vec<(&'static str, String)> {
        let mut params = match query {
            LocationQuery::ByName(name) => vec![("q", name.clone())],
            LocationQuery::ByCoordinates(coord) => {
                vec![("lat", coord.lat.to_string()), ("lon", coord.lon.to_string())]
            }
        };
        params.push(("units", unit.as_str().to_string()));
        params.push(("appid", self.api_key.clone()));
        params
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self, cancel), level = "debug")]
    async fn fetch(
        &self,
        query: &LocationQuery,
        unit: UnitPreference,
        cancel: &CancellationToken,
    ) -> Result<RawWeatherPayload, UpstreamFailure> {
        let request = self.http.get(&self.url).query(&self.query_params(query, unit));
        upstream::get_json("openweather", request, cancel).await
    }
}
