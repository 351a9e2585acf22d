//! Error taxonomy for upstream calls and for the gateway boundary.

use std::time::Duration;
use thiserror::Error;

/// Classified failure of a single upstream call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// Transport-level failure: connection refused, DNS, timeout.
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream responded with HTTP {status}")]
    Http { status: u16 },

    #[error("unexpected upstream payload: {0}")]
    Parse(String),

    #[error("request cancelled")]
    Cancelled,
}

impl UpstreamFailure {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            UpstreamFailure::Network(format!("request timed out: {err}"))
        } else {
            UpstreamFailure::Network(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("rate limited, retry after {} seconds", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("location not found upstream")]
    UpstreamNotFound,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("upstream payload rejected: {0}")]
    UpstreamParse(String),

    #[error("could not detect a place name for the given coordinates")]
    LocationNotDetected,

    #[error("timezone not found for the given coordinates")]
    TimezoneNotFound,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("request cancelled")]
    Cancelled,
}

impl From<UpstreamFailure> for GatewayError {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Http { status: 404 } => GatewayError::UpstreamNotFound,
            UpstreamFailure::Http { status } => {
                GatewayError::UpstreamUnavailable(format!("HTTP {status}"))
            }
            UpstreamFailure::Network(msg) => GatewayError::UpstreamUnavailable(msg),
            UpstreamFailure::Parse(msg) => GatewayError::UpstreamParse(msg),
            UpstreamFailure::Cancelled => GatewayError::Cancelled,
        }
    }
}

impl GatewayError {
    /// HTTP status this error is surfaced with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::RateLimited { .. } => 429,
            Self::UpstreamNotFound | Self::LocationNotDetected | Self::TimezoneNotFound => 404,
            Self::UpstreamUnavailable(_) | Self::UpstreamParse(_) => 502,
            Self::NotConfigured(_) => 503,
            // nginx convention for "client closed request"
            Self::Cancelled => 499,
        }
    }

    /// Message safe to hand back to a client. Upstream detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => msg.clone(),
            Self::RateLimited { .. } => "Too many requests, try again later.".to_string(),
            Self::UpstreamNotFound => "Location not found".to_string(),
            Self::UpstreamUnavailable(_) => "Failed to fetch weather data".to_string(),
            Self::UpstreamParse(_) => "Weather provider returned an unexpected response".to_string(),
            Self::LocationNotDetected => "Could not detect your location".to_string(),
            Self::TimezoneNotFound => "Timezone not found".to_string(),
            Self::NotConfigured(feature) => format!("{feature} is not available"),
            Self::Cancelled => "Request cancelled".to_string(),
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// JSON failure body: `{ "error": "..." }`.
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.user_message() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_404_maps_to_not_found() {
        let err = GatewayError::from(UpstreamFailure::Http { status: 404 });
        assert_eq!(err, GatewayError::UpstreamNotFound);
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn other_upstream_statuses_map_to_unavailable() {
        for status in [401, 500, 503] {
            let err = GatewayError::from(UpstreamFailure::Http { status });
            assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
            assert_eq!(err.status_code(), 502);
        }
    }

    #[test]
    fn status_codes_per_kind() {
        assert_eq!(GatewayError::InvalidInput("x".into()).status_code(), 400);
        let limited = GatewayError::RateLimited {
            retry_after: Duration::from_secs(30),
        };
        assert_eq!(limited.status_code(), 429);
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(GatewayError::UpstreamParse("x".into()).status_code(), 502);
        assert_eq!(GatewayError::LocationNotDetected.status_code(), 404);
    }

    #[test]
    fn user_message_hides_upstream_detail() {
        let err = GatewayError::UpstreamUnavailable("connect to 10.0.0.1 refused, appid=SECRET".into());
        let body = err.body().to_string();
        assert!(!body.contains("SECRET"));
        assert_eq!(body, r#"{"error":"Failed to fetch weather data"}"#);
    }
}
