use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use weather_gateway::{
    Config, Gateway, GatewayError, PlaceResolution, ProviderId, UnitPreference, WeatherParams,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut cfg = Config::default();
    cfg.upsert_provider_api_key(ProviderId::OpenWeather, "OW_KEY".into());
    cfg.upsert_provider_api_key(ProviderId::OpenCage, "GEO_KEY".into());
    cfg.upsert_provider_api_key(ProviderId::TimezoneDb, "TZ_KEY".into());
    cfg.gateway.endpoints.weather_url = format!("{}/data/2.5/weather", server.uri());
    cfg.gateway.endpoints.geocode_url = format!("{}/geocode/v1/json", server.uri());
    cfg.gateway.endpoints.timezone_url = format!("{}/v2.1/get-time-zone", server.uri());
    cfg
}

fn paris_payload() -> serde_json::Value {
    json!({
        "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }],
        "main": { "temp": 15.2, "humidity": 60, "pressure": 1012 },
        "wind": { "speed": 3.4 },
        "sys": { "country": "FR" },
        "name": "Paris"
    })
}

async fn mount_paris(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Paris"))
        .and(query_param("units", "metric"))
        .and(query_param("appid", "OW_KEY"))
        .respond_with(ResponseTemplate::new(200).set_body_json(paris_payload()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn paris_metric_snapshot() {
    let server = MockServer::start().await;
    mount_paris(&server).await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let res = gateway
        .handle(
            "203.0.113.7",
            &WeatherParams::from_query("city=Paris&unit=metric"),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(
        res.body,
        json!({
            "city": "Paris",
            "country": "FR",
            "temp": 15.2,
            "weather": "light rain",
            "icon": "10d",
            "humidity": 60,
            "windSpeed": 3.4,
            "unit": "metric"
        })
    );
}

#[tokio::test]
async fn coordinates_query_in_imperial_units() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", "40.7128"))
        .and(query_param("lon", "-74.006"))
        .and(query_param("units", "imperial"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "coord": { "lon": -74.006, "lat": 40.7128 },
            "weather": [{ "description": "few clouds", "icon": "02d" }],
            "main": { "temp": 68.4, "humidity": 55 },
            "wind": { "speed": 9.2 },
            "sys": { "country": "US" },
            "name": "New York"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let params = WeatherParams::position(40.7128, -74.006).with_unit(UnitPreference::Imperial);
    let snapshot = gateway
        .weather("ip", &params, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.city, "New York");
    assert_eq!(snapshot.unit, UnitPreference::Imperial);
    assert_eq!(snapshot.wind_speed, 9.2);
    assert_eq!(snapshot.coord.map(|c| c.lat), Some(40.7128));
}

#[tokio::test]
async fn missing_location_is_400() {
    let server = MockServer::start().await;
    let gateway = Gateway::from_config(&config_for(&server)).unwrap();

    let res = gateway
        .handle("ip", &WeatherParams::from_query("unit=metric"), &CancellationToken::new())
        .await;

    assert_eq!(res.status, 400);
    assert!(res.body["error"].is_string());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn upstream_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "cod": "404", "message": "city not found" })),
        )
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let res = gateway
        .handle("ip", &WeatherParams::city("Atlantis"), &CancellationToken::new())
        .await;

    assert_eq!(res.status, 404);
    assert_eq!(res.body, json!({ "error": "Location not found" }));
}

#[tokio::test]
async fn bad_credential_is_bad_gateway_without_leaking_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid API key" })))
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let res = gateway
        .handle("ip", &WeatherParams::city("Paris"), &CancellationToken::new())
        .await;

    assert_eq!(res.status, 502);
    assert!(!res.body.to_string().contains("OW_KEY"));
    assert!(!res.body.to_string().contains("Invalid API key"));
}

#[tokio::test]
async fn hundred_and_first_request_is_rate_limited() {
    let server = MockServer::start().await;
    mount_paris(&server).await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let cancel = CancellationToken::new();
    let params = WeatherParams::city("Paris");

    for _ in 0..100 {
        assert_eq!(gateway.handle("198.51.100.1", &params, &cancel).await.status, 200);
    }
    let limited = gateway.handle("198.51.100.1", &params, &cancel).await;
    assert_eq!(limited.status, 429);
    assert!(limited.retry_after_secs.is_some());

    // Another client is unaffected.
    assert_eq!(gateway.handle("198.51.100.2", &params, &cancel).await.status, 200);
}

#[tokio::test]
async fn concurrent_burst_admits_at_most_quota() {
    let server = MockServer::start().await;
    mount_paris(&server).await;

    let mut cfg = config_for(&server);
    cfg.gateway.rate_limit.max_requests = 5;
    let gateway = Arc::new(Gateway::from_config(&cfg).unwrap());

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move {
                gateway
                    .handle("burst", &WeatherParams::city("Paris"), &CancellationToken::new())
                    .await
                    .status
            })
        })
        .collect();

    let mut ok = 0;
    for task in tasks {
        if task.await.unwrap() == 200 {
            ok += 1;
        }
    }
    assert_eq!(ok, 5);
}

#[tokio::test]
async fn position_chain_geocodes_then_fetches_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode/v1/json"))
        .and(query_param("q", "48.8566,2.3522"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "components": { "city": "Paris", "state": "Île-de-France" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_paris(&server).await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let snapshot = gateway
        .weather_for_position("ip", 48.8566, 2.3522, UnitPreference::Metric, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(snapshot.city, "Paris");
    assert_eq!(snapshot.temp, 15.2);
}

#[tokio::test]
async fn position_chain_reports_undetected_location() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode/v1/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "components": { "body_of_water": "Pacific Ocean" } }]
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let cancel = CancellationToken::new();

    let place = gateway.place_for_position("ip", 0.0, -150.0, &cancel).await.unwrap();
    assert_eq!(place, PlaceResolution::Absent);

    let err = gateway
        .weather_for_position("ip", 0.0, -150.0, UnitPreference::Metric, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::LocationNotDetected);
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn position_chain_geocode_outage_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode/v1/json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let err = gateway
        .weather_for_position("ip", 10.0, 10.0, UnitPreference::Metric, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UpstreamUnavailable(_)));
}

#[tokio::test]
async fn local_clock_for_position() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.1/get-time-zone"))
        .and(query_param("by", "position"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "OK",
            "zoneName": "Europe/Paris"
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let clock = gateway
        .local_clock("ip", 48.8566, 2.3522, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(clock.zone(), chrono_tz::Europe::Paris);
}

#[tokio::test]
async fn local_clock_without_zone_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2.1/get-time-zone"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "FAILED",
            "message": "Invalid position"
        })))
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let err = gateway
        .local_clock("ip", 0.0, 0.0, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::TimezoneNotFound);
}

#[tokio::test]
async fn cancelling_the_request_aborts_the_upstream_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(paris_payload())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let gateway = Gateway::from_config(&config_for(&server)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = gateway
        .weather("ip", &WeatherParams::city("Paris"), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Cancelled);
}

#[test]
fn gateway_requires_weather_credential() {
    let err = Gateway::from_config(&Config::default()).unwrap_err();
    assert!(err.to_string().contains("openweather"));
}
