//! End-to-end collection against a mock provider server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skywatch_core::{RetryPolicy, WeatherClient};
use skywatch_service::{
    Collector, CollectorSettings, Config, FetchQueue, get_weather_stats, seed_locations,
};
use skywatch_store::Store;
use skywatch_types::{RequestStatus, Units};

const KNOXVILLE: &str = r#"{
    "weather": [{"id": 801, "main": "Clouds", "description": "few clouds"}],
    "main": {"temp": 48.2, "feels_like": 45.1, "temp_min": 44.0, "temp_max": 52.0,
             "pressure": 1018, "humidity": 67},
    "wind": {"speed": 6.9, "deg": 200},
    "clouds": {"all": 20},
    "visibility": 10000,
    "dt": 1700000000,
    "sys": {"country": "US", "sunrise": 1699963200, "sunset": 1700000400},
    "timezone": -18000,
    "name": "Knoxville"
}"#;

struct Harness {
    _dir: TempDir,
    store: Store,
    collector: Collector,
    client: Arc<WeatherClient>,
}

fn harness(server: &MockServer, tracked: &str) -> Harness {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("weather.db");
    let vars: HashMap<&str, String> = HashMap::from([
        ("WEATHER_API_KEY", "integration-key".to_string()),
        ("DB_PATH", db_path.display().to_string()),
        ("BASE_URL", server.uri()),
        ("TRACKED_LOCATIONS", tracked.to_string()),
    ]);
    let config = Config::from_lookup(|name| vars.get(name).cloned()).unwrap();

    let store = Store::open(&config.db_path).unwrap();
    seed_locations(&store, &config.tracked_locations).unwrap();

    let client_config = config
        .client_config()
        .retry(RetryPolicy::immediate(config.max_retries))
        .min_request_interval(Duration::ZERO);
    let client = Arc::new(WeatherClient::new(client_config).unwrap());

    let settings = CollectorSettings {
        location_delay: Duration::ZERO,
        ..CollectorSettings::from_config(&config)
    };
    let collector = Collector::new(client.clone(), store.clone(), settings);

    Harness {
        _dir: dir,
        store,
        collector,
        client,
    }
}

#[tokio::test]
async fn test_successful_cycle_stores_reading_and_logs_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Knoxville,US"))
        .and(query_param("units", "imperial"))
        .and(query_param("appid", "integration-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KNOXVILLE))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "Knoxville:US");
    let summary = h
        .collector
        .collect_all_locations(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 1);

    let stored = h.store.latest_reading("Knoxville", "US").unwrap().unwrap();
    assert_eq!(stored.reading.temperature, 48.2);
    assert_eq!(stored.reading.units, Units::Imperial);
    assert_eq!(stored.reading.humidity, Some(67));
    assert_eq!(stored.reading.weather_detail.as_deref(), Some("few clouds"));
    assert_eq!(stored.reading.sunrise.as_deref(), Some("07:00 AM"));
    assert_eq!(h.store.count_readings(None).unwrap(), 1);

    let log = h.store.request_log(10).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, RequestStatus::Success);
    assert_eq!(log[0].url, format!("{}/weather", server.uri()));
    assert!(!log[0].url.contains("integration-key"));
    assert!(log[0].location_id.is_some());
}

#[tokio::test]
async fn test_exhausted_retries_log_one_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let h = harness(&server, "Knoxville:US");
    let summary = h
        .collector
        .collect_all_locations(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.failed, 1);

    assert_eq!(h.store.count_readings(None).unwrap(), 0);
    let log = h.store.request_log(10).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, RequestStatus::ApiError);
    let errors = h.store.get_error_log(10).unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].city.as_deref(), Some("Knoxville"));
    assert_eq!(h.client.failures().failure_count("Knoxville"), 1);
}

#[tokio::test]
async fn test_one_bad_location_does_not_block_others() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Atlantis,GR"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Knoxville,US"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KNOXVILLE))
        .mount(&server)
        .await;

    let h = harness(&server, "Atlantis:GR,Knoxville:US");
    let summary = h
        .collector
        .collect_all_locations(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(h.store.count_readings(Some(("Knoxville", "US"))).unwrap(), 1);

    let stats = h.store.request_summary(None).unwrap();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.successful, 1);
}

#[tokio::test]
async fn test_stats_fall_back_to_fresh_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KNOXVILLE))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "Knoxville:US");
    let stats = get_weather_stats(&h.store, h.client.as_ref(), "Knoxville", "US", 7).await;

    assert_eq!(stats.total_readings, 1);
    assert_eq!(stats.avg_temp, Some(48.2));
    assert_eq!(stats.units, Units::Imperial);
    assert_eq!(h.store.count_readings(None).unwrap(), 1);
}

#[tokio::test]
async fn test_manual_lookup_is_stored_and_logged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Knoxville,US"))
        .respond_with(ResponseTemplate::new(200).set_body_string(KNOXVILLE))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "Knoxville:US");
    let (queue, worker) =
        FetchQueue::spawn_recording(h.client.clone(), h.store.clone(), 4, CancellationToken::new());

    let reading = queue
        .current_weather("knoxville", Some("us"), Units::Imperial)
        .await
        .unwrap();
    queue.shutdown();
    worker.await.unwrap();

    assert_eq!(reading.city, "Knoxville");
    assert_eq!(h.store.count_readings(Some(("Knoxville", "US"))).unwrap(), 1);
    let log = h.store.request_log(10).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, RequestStatus::Success);
    let location_id = h.store.get_location_id("Knoxville", "US").unwrap();
    assert_eq!(log[0].location_id, location_id);
}
