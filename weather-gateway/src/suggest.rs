//! City-name suggestions for search-as-you-type (GeoDB Cities via RapidAPI).
//!
//! [`SuggestDebouncer`] holds back a lookup until input has been quiet for a
//! short period; newer input cancels whatever lookup is still pending.

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{config::Config, error::UpstreamFailure, provider::ProviderId, upstream};

/// Suggestions returned per lookup.
pub const SUGGESTION_LIMIT: usize = 8;

#[derive(Debug, Default, Deserialize)]
struct CitiesResponse {
    #[serde(default)]
    data: Vec<CityEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CityEntry {
    city: Option<String>,
    country_code: Option<String>,
}

impl CityEntry {
    /// `"Paris, FR"`; entries without a name or country code are skipped.
    fn label(&self) -> Option<String> {
        let city = self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())?;
        let country = self
            .country_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())?;
        Some(format!("{city}, {country}"))
    }
}

#[derive(Debug, Clone)]
pub struct CitySuggestClient {
    api_key: String,
    url: String,
    host: String,
    http: Client,
}

impl CitySuggestClient {
    pub fn new(api_key: String, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let url = url.into();
        let host = url::Url::parse(&url)
            .with_context(|| format!("Invalid suggestion endpoint: {url}"))?
            .host_str()
            .ok_or_else(|| anyhow!("Suggestion endpoint has no host: {url}"))?
            .to_string();

        Ok(Self {
            api_key,
            url,
            host,
            http: upstream::http_client(timeout)?,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = &config.gateway;
        settings.validate()?;
        Self::new(
            config.require_api_key(ProviderId::GeoDb)?.to_owned(),
            &settings.endpoints.suggest_url,
            settings.request_timeout(),
        )
    }

    /// Most populous cities whose name starts with `prefix`. A blank prefix makes no
    /// request.
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn suggest_cities(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, UpstreamFailure> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let limit = SUGGESTION_LIMIT.to_string();
        let request = self
            .http
            .get(&self.url)
            .query(&[
                ("namePrefix", prefix),
                ("limit", limit.as_str()),
                ("sort", "-population"),
            ])
            .header("X-RapidAPI-Key", self.api_key.as_str())
            .header("X-RapidAPI-Host", self.host.as_str());

        let body: CitiesResponse = upstream::get_json("geodb", request, cancel).await?;

        let cities: Vec<String> = body
            .data
            .iter()
            .filter_map(CityEntry::label)
            .take(SUGGESTION_LIMIT)
            .collect();
        tracing::debug!(count = cities.len(), "city suggestions");
        Ok(cities)
    }
}

/// Debounces suggestion lookups for one input field.
#[derive(Debug)]
pub struct SuggestDebouncer {
    client: CitySuggestClient,
    delay: Duration,
    pending: Mutex<Option<CancellationToken>>,
}

impl SuggestDebouncer {
    pub fn new(client: CitySuggestClient, delay: Duration) -> Self {
        Self {
            client,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Feed the current input text.
    ///
    /// Returns `None` when this input was superseded by a later call (or `cancel`
    /// fired) before its lookup finished. Upstream failures yield an empty list.
    pub async fn input(&self, text: &str, cancel: &CancellationToken) -> Option<Vec<String>> {
        let token = cancel.child_token();
        let previous = self.pending.lock().replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let prefix = text.trim();
        if prefix.is_empty() {
            return Some(Vec::new());
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(prefix, "suggestion input superseded");
                return None;
            }
            _ = tokio::time::sleep(self.delay) => {}
        }

        match self.client.suggest_cities(prefix, &token).await {
            Ok(cities) => Some(cities),
            Err(UpstreamFailure::Cancelled) => None,
            Err(err) => {
                tracing::warn!(error = %err, "city suggestion lookup failed");
                Some(Vec::new())
            }
        }
    }
}
