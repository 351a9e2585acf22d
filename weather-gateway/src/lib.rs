//! Core library for the weather gateway.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Per-client rate limiting
//! - Location query resolution and upstream weather fetching
//! - Normalization of provider payloads into a stable snapshot
//! - Reverse geocoding and timezone lookup for coordinate-only callers
//! - Debounced city-name suggestions for search-as-you-type
//!
//! It is used by `weather-cli`, but can also sit behind any HTTP front end:
//! [`Gateway::handle`] returns a status code and JSON body.

pub mod config;
pub mod error;
pub mod gateway;
pub mod geocode;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod rate_limit;
pub mod resolver;
pub mod suggest;
pub mod timezone;
mod upstream;

pub use config::{Config, GatewaySettings, ProviderConfig, RateLimitSettings};
pub use error::{GatewayError, UpstreamFailure};
pub use gateway::{Gateway, GatewayResponse};
pub use model::{
    Coordinates, LocationQuery, PlaceResolution, TimezoneResolution, UnitPreference,
    WeatherParams, WeatherSnapshot,
};
pub use provider::{ProviderId, WeatherProvider};
pub use rate_limit::{Admission, RateLimiter};
pub use suggest::{CitySuggestClient, SuggestDebouncer};
pub use timezone::LocalClock;
