//! Position-based timezone lookup (TimezoneDB) and local clock rendering.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::{
    error::UpstreamFailure,
    model::{Coordinates, TimezoneResolution},
    upstream,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimezoneResponse {
    status: String,
    message: Option<String>,
    zone_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TimezoneClient {
    api_key: String,
    url: String,
    http: Client,
}

impl TimezoneClient {
    pub fn new(api_key: String, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            api_key,
            url: url.into(),
            http: upstream::http_client(timeout)?,
        })
    }

    /// A payload whose `status` is not `OK` resolves to [`TimezoneResolution::Absent`].
    #[instrument(skip(self, cancel), level = "debug")]
    pub async fn resolve_timezone(
        &self,
        coord: Coordinates,
        cancel: &CancellationToken,
    ) -> Result<TimezoneResolution, UpstreamFailure> {
        let request = self.http.get(&self.url).query(&[
            ("key", self.api_key.clone()),
            ("format", "json".to_string()),
            ("by", "position".to_string()),
            ("lat", coord.lat.to_string()),
            ("lng", coord.lon.to_string()),
        ]);

        let body: TimezoneResponse = upstream::get_json("timezonedb", request, cancel).await?;

        if body.status != "OK" {
            tracing::warn!(
                status = %body.status,
                detail = body.message.as_deref().unwrap_or_default(),
                "timezone lookup unsuccessful"
            );
            return Ok(TimezoneResolution::Absent);
        }

        Ok(match body.zone_name.filter(|z| !z.trim().is_empty()) {
            None => TimezoneResolution::Absent,
            Some(zone) => match zone.parse::<Tz>() {
                Ok(tz) => TimezoneResolution::Resolved(tz),
                Err(_) => TimezoneResolution::Unrecognized(zone),
            },
        })
    }
}

/// Wall-clock time in a resolved timezone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalClock {
    local: DateTime<Tz>,
}

impl LocalClock {
    pub fn now(tz: Tz) -> Self {
        Self::at(tz, Utc::now())
    }

    pub fn at(tz: Tz, instant: DateTime<Utc>) -> Self {
        Self {
            local: instant.with_timezone(&tz),
        }
    }

    pub fn zone(&self) -> Tz {
        self.local.timezone()
    }

    /// `3:04:05 PM`, or `15:04:05` when `hour24`.
    pub fn format_time(&self, hour24: bool) -> String {
        if hour24 {
            self.local.format("%H:%M:%S").to_string()
        } else {
            self.local.format("%-I:%M:%S %p").to_string()
        }
    }

    /// `Monday, January 1, 2024`
    pub fn format_date(&self) -> String {
        self.local.format("%A, %B %-d, %Y").to_string()
    }
}
