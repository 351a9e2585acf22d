use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use weather_gateway::{
    CitySuggestClient, Config, Gateway, GatewayError, ProviderId, SuggestDebouncer,
    UnitPreference, WeatherParams, WeatherSnapshot,
};

/// Rate-limit identity for requests made from this process.
const LOCAL_IDENTITY: &str = "local";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather gateway CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct Position {
    /// Latitude in degrees, -90..=90.
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude in degrees, -180..=180.
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key for an upstream provider.
    Configure {
        /// Provider short name: "openweather", "opencage", "timezonedb" or "geodb".
        provider: String,
    },

    /// Show current weather for a city or a coordinate pair.
    Show {
        /// City name, e.g. "Paris" or "Paris, FR".
        city: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        lon: Option<String>,

        /// "metric" or "imperial".
        #[arg(long, default_value = "metric")]
        unit: String,

        /// Print the gateway's JSON response instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// Detect the place name for a position, then show its weather.
    Locate {
        #[command(flatten)]
        position: Position,

        #[arg(long, default_value = "metric")]
        unit: UnitPreference,
    },

    /// Show the local time at a position.
    Clock {
        #[command(flatten)]
        position: Position,

        /// Use a 24-hour clock.
        #[arg(long)]
        hour24: bool,
    },

    /// Suggest city names. Without a prefix, reads input lines from stdin and
    /// looks up whichever line is followed by a pause.
    Suggest {
        prefix: Option<String>,
    },
}

impl Cli {
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show {
                city,
                lat,
                lon,
                unit,
                json,
            } => {
                let gateway = gateway()?;
                let params = WeatherParams {
                    city,
                    lat,
                    lon,
                    unit: Some(unit),
                };

                if json {
                    let res = gateway.handle(LOCAL_IDENTITY, &params, &cancel).await;
                    println!("{}", serde_json::to_string_pretty(&res.body)?);
                    if !res.is_success() {
                        bail!("request failed with HTTP {}", res.status);
                    }
                    return Ok(());
                }

                let snapshot = gateway
                    .weather(LOCAL_IDENTITY, &params, &cancel)
                    .await
                    .map_err(describe)?;
                print_snapshot(&snapshot);
                Ok(())
            }
            Command::Locate { position, unit } => {
                let gateway = gateway()?;
                let snapshot = gateway
                    .weather_for_position(LOCAL_IDENTITY, position.lat, position.lon, unit, &cancel)
                    .await
                    .map_err(describe)?;
                print_snapshot(&snapshot);
                Ok(())
            }
            Command::Clock { position, hour24 } => {
                let gateway = gateway()?;
                let clock = gateway
                    .local_clock(LOCAL_IDENTITY, position.lat, position.lon, &cancel)
                    .await
                    .map_err(describe)?;
                println!("{}", clock.format_time(hour24));
                println!("{}", clock.format_date());
                println!("{}", clock.zone());
                Ok(())
            }
            Command::Suggest { prefix } => suggest(prefix, cancel).await,
        }
    }
}

fn gateway() -> anyhow::Result<Gateway> {
    let config = Config::load()?;
    Gateway::from_config(&config)
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_file()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }

    config.upsert_provider_api_key(id, api_key.to_string());
    config.save()?;

    println!(
        "Saved {id} credentials to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn suggest(prefix: Option<String>, cancel: CancellationToken) -> anyhow::Result<()> {
    let config = Config::load()?;
    let client = CitySuggestClient::from_config(&config)?;

    if let Some(prefix) = prefix {
        let cities = client
            .suggest_cities(&prefix, &cancel)
            .await
            .context("City suggestion lookup failed")?;
        print_suggestions(&cities);
        return Ok(());
    }

    let debouncer = Arc::new(SuggestDebouncer::new(
        client,
        config.gateway.suggest_debounce(),
    ));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut lookups = JoinSet::new();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("Failed to read input")?,
        };
        let Some(line) = line else { break };

        let debouncer = Arc::clone(&debouncer);
        let cancel = cancel.clone();
        lookups.spawn(async move {
            if let Some(cities) = debouncer.input(&line, &cancel).await {
                print_suggestions(&cities);
            }
        });
    }

    while lookups.join_next().await.is_some() {}
    Ok(())
}

fn print_suggestions(cities: &[String]) {
    if cities.is_empty() {
        println!("No matching cities.");
    }
    for city in cities {
        println!("{city}");
    }
}

fn describe(err: GatewayError) -> anyhow::Error {
    tracing::debug!(error = %err, "gateway error");
    match err.retry_after() {
        Some(after) => anyhow::anyhow!(
            "{} (HTTP {}, retry in {}s)",
            err.user_message(),
            err.status_code(),
            after.as_secs()
        ),
        None => anyhow::anyhow!("{} (HTTP {})", err.user_message(), err.status_code()),
    }
}

fn print_snapshot(snapshot: &WeatherSnapshot) {
    let unit = snapshot.unit;
    println!("{}, {}", snapshot.city, snapshot.country);
    println!("  {} ({})", snapshot.weather, snapshot.icon);
    println!("  Temperature: {:.1}{}", snapshot.temp, unit.temperature_label());
    println!("  Humidity:    {}%", snapshot.humidity);
    println!("  Wind:        {:.1} {}", snapshot.wind_speed, unit.speed_label());
    if let Some(coord) = snapshot.coord {
        println!("  Position:    {:.4}, {:.4}", coord.lat, coord.lon);
    }
}
