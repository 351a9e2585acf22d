//! Reverse geocoding: convert coordinates to a human-readable place name.
//! Uses the OpenCage geocoding API.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    error::UpstreamFailure,
    model::{Coordinates, PlaceResolution},
    upstream,
};

/// Address components consulted for a place name, most specific first.
const PLACE_PRIORITY: [PlaceComponent; 4] = [
    PlaceComponent::City,
    PlaceComponent::Town,
    PlaceComponent::Village,
    PlaceComponent::State,
];

#[derive(Debug, Clone, Copy)]
enum PlaceComponent {
    City,
    Town,
    Village,
    State,
}

impl PlaceComponent {
    fn pick(self, components: &Components) -> Option<&str> {
        let value = match self {
            PlaceComponent::City => components.city.as_deref(),
            PlaceComponent::Town => components.town.as_deref(),
            PlaceComponent::Village => components.village.as_deref(),
            PlaceComponent::State => components.state.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    components: Components,
}

#[derive(Debug, Default, Deserialize)]
struct Components {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
}

fn best_place_name(components: &Components) -> Option<String> {
    PLACE_PRIORITY
        .iter()
        .find_map(|component| component.pick(components))
        .map(str::to_string)
}

#[derive(Debug, Clone)]
pub struct ReverseGeocodeClient {
    api_key: String,
    url: String,
    http: Client,
}

impl ReverseGeocodeClient {
    pub fn new(api_key: String, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            url: url.into(),
            http: upstream::http_client(timeout)?,
        })
    }

    /// Place name for `coord`, or [`PlaceResolution::Absent`] when the provider has
    /// no result with a usable component.
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn resolve_coordinates(
        &self,
        coord: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<PlaceResolution, UpstreamFailure> {
        let request = self.http.get(&self.url).query(&[
            ("q", format!("{},{}", coord.lat, coord.lon)),
            ("key", self.api_key.clone()),
            ("no_annotations", "1".to_string()),
        ]);

        let body: GeocodeResponse = upstream::get_json("opencage", request, cancel).await?;

        let place = body
            .results
            .first()
            .and_then(|result| best_place_name(&result.components));

        match place {
            Some(name) => {
                tracing::debug!(%name, "reverse geocoded");
                Ok(PlaceResolution::Resolved(name))
            }
            None => {
                tracing::debug!("reverse geocode returned no usable place");
                Ok(PlaceResolution::Absent)
            }
        }
    }
}
