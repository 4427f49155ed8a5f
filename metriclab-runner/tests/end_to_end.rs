//! Full pipeline over the standard catalog with recorded responses:
//! registry → orchestrator → document, report, and CSV.

use serde_json::{json, Value};

use metriclab_core::domain::{MetricStatus, MetricValue, Timeframe};
use metriclab_core::provider::{FetchError, FixtureProvider};
use metriclab_core::registry::{standard_metrics, MetricRegistry};
use metriclab_runner::output::{export_csv, render, write_file};
use metriclab_runner::{
    run_metrics, ApiKey, DataMode, ResultSet, RunConfig, RunOptions, REQUIRES_FULL_MODE,
    SCHEMA_VERSION,
};

const T0: i64 = 1_704_067_200_000;
const OI_PATH: &str = "/api/futures/open-interest/aggregated-history";
const FUNDING_PATH: &str = "/api/futures/funding-rate/oi-weight-history";

fn ok(data: Value) -> Value {
    json!({"code": "0", "msg": "success", "data": data})
}

fn registry_of(ids: &[&str]) -> MetricRegistry {
    MetricRegistry::new(
        standard_metrics()
            .into_iter()
            .filter(|d| ids.contains(&d.id.as_str()))
            .collect(),
    )
    .unwrap()
}

fn three_metric_run() -> ResultSet {
    let registry = registry_of(&[
        "daily_01_total_open_interest",
        "daily_04_weighted_funding_rate",
        "daily_17_liquidation_orders",
    ]);
    let client = FixtureProvider::new()
        .with(
            OI_PATH,
            ok(json!([{"time": T0, "open": "61604995533", "close": "62342795495.89"}])),
        )
        .with(FUNDING_PATH, ok(json!([{"time": T0, "close": 0.0123}])));
    run_metrics(&registry, &client, &RunOptions::default(), None, None).unwrap()
}

#[test]
fn values_and_statuses() {
    let set = three_metric_run();
    assert_eq!(set.len(), 3);

    let oi = set.get("daily_01_total_open_interest").unwrap();
    assert_eq!(oi.status, MetricStatus::Ok);
    assert_eq!(oi.value(), Some(&MetricValue::Scalar(62.34)));

    let funding = set.get("daily_04_weighted_funding_rate").unwrap();
    assert_eq!(funding.value(), Some(&MetricValue::Scalar(0.0123)));

    let orders = set.get("daily_17_liquidation_orders").unwrap();
    assert_eq!(orders.status, MetricStatus::Locked);
    assert!(orders.note.as_deref().unwrap().contains("standard"));
}

#[test]
fn report_lists_labels_and_summary() {
    let rendered = render(&three_metric_run()).unwrap();
    let report = rendered.report;

    assert!(report.contains(&"=".repeat(70)));
    assert!(report.contains("DAILY METRICS"));
    assert!(report.contains("[OK] daily_01_total_open_interest  Total Open Interest: $62.34B"));
    assert!(report.contains("[OK] daily_04_weighted_funding_rate"));
    assert!(report.contains("+0.0123%"));
    assert!(report.contains("[LOCKED] daily_17_liquidation_orders"));
    assert!(report.contains("SUMMARY: 2/3 metrics OK"));
    assert!(!report.contains("partial run"));
}

#[test]
fn document_contract() {
    let rendered = render(&three_metric_run()).unwrap();
    let doc: Value = serde_json::from_str(&rendered.document).unwrap();

    assert_eq!(doc["schema_version"], json!(SCHEMA_VERSION));
    assert_eq!(doc["metadata"]["complete"], json!(true));
    assert_eq!(doc["metadata"]["data_mode"], json!("full"));
    assert_eq!(doc["metadata"]["fingerprint"].as_str().unwrap().len(), 64);

    let daily = &doc["groups"]["daily"];
    let oi = &daily["daily_01_total_open_interest"];
    assert_eq!(oi["status"], json!("OK"));
    assert_eq!(oi["value"], json!(62.34));
    assert_eq!(oi["unit"], json!("billion_usd"));
    assert_eq!(oi["category"], json!("open_interest"));
    assert_eq!(daily["daily_04_weighted_funding_rate"]["category"], json!("funding"));

    let orders = &daily["daily_17_liquidation_orders"];
    assert_eq!(orders["status"], json!("LOCKED"));
    assert_eq!(orders["category"], json!("liquidations"));
    assert!(orders.get("value").is_none());
    assert!(orders.get("raw_error").is_none());
}

#[test]
fn document_keeps_registry_order() {
    let registry = MetricRegistry::standard().unwrap();
    let set = run_metrics(&registry, &FixtureProvider::new(), &RunOptions::default(), None, None)
        .unwrap();
    let document = render(&set).unwrap().document;

    let daily = document.find("\"daily\"").unwrap();
    let weekly = document.find("\"weekly\"").unwrap();
    let monthly = document.find("\"monthly\"").unwrap();
    assert!(daily < weekly && weekly < monthly);

    let first = document.find("daily_01_total_open_interest").unwrap();
    let tenth = document.find("daily_10_coinbase_premium_index").unwrap();
    assert!(first < tenth);

    // Fetch failures carry raw errors, which must stay out of the document.
    assert!(!document.contains("HTTP 404"));

    let doc: Value = serde_json::from_str(&document).unwrap();
    let mut entries = 0;
    for timeframe in Timeframe::ALL {
        for (id, entry) in doc["groups"][timeframe.as_str()].as_object().unwrap() {
            let expected = registry.get(id).unwrap().group.category.as_str();
            assert_eq!(entry["category"], json!(expected), "{id}");
            entries += 1;
        }
    }
    assert_eq!(entries, registry.len());
}

#[test]
fn missing_and_error_are_distinct_in_report() {
    let registry = registry_of(&[
        "daily_01_total_open_interest",
        "daily_04_weighted_funding_rate",
        "daily_07_long_short_hyperliquid",
    ]);
    let client = FixtureProvider::new()
        .with(OI_PATH, ok(json!([])))
        .with_error(FUNDING_PATH, FetchError::Timeout);
    let set = run_metrics(&registry, &client, &RunOptions::default(), None, None).unwrap();
    let report = render(&set).unwrap().report;

    assert!(report.contains("[MISSING] daily_01_total_open_interest"));
    assert!(report.contains("[ERROR] daily_04_weighted_funding_rate"));
    assert!(report.contains("[EXTERNAL] daily_07_long_short_hyperliquid"));
}

#[test]
fn free_mode_gates_unsupported_endpoints() {
    /// Serves only the open-interest path, like the public fallback.
    struct OiOnly(FixtureProvider);

    impl metriclab_core::provider::ProviderClient for OiOnly {
        fn name(&self) -> &str {
            "oi_only"
        }
        fn fetch(
            &self,
            request: &metriclab_core::provider::FetchRequest,
        ) -> Result<metriclab_core::provider::Envelope, FetchError> {
            self.0.fetch(request)
        }
        fn supports(&self, path: &str) -> bool {
            path == OI_PATH
        }
    }

    let registry = registry_of(&["daily_01_total_open_interest", "daily_10_coinbase_premium_index"]);
    let client = OiOnly(FixtureProvider::new().with(
        OI_PATH,
        ok(json!([{"time": T0, "close": "62342795495.89"}])),
    ));
    let options = RunOptions {
        data_mode: DataMode::Free,
        ..RunOptions::default()
    };
    let set = run_metrics(&registry, &client, &options, None, None).unwrap();

    assert_eq!(set.get("daily_01_total_open_interest").unwrap().status, MetricStatus::Ok);
    let premium = set.get("daily_10_coinbase_premium_index").unwrap();
    assert_eq!(premium.status, MetricStatus::Locked);
    assert_eq!(premium.note.as_deref(), Some(REQUIRES_FULL_MODE));
    assert_eq!(client.0.calls(), 1);
}

#[test]
fn csv_export_rows() {
    let csv = export_csv(&three_metric_run()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "group,id,status,unit,value");
    assert_eq!(lines[1], "daily,daily_01_total_open_interest,OK,billion_usd,62.34");
    assert_eq!(lines[3], "daily,daily_17_liquidation_orders,LOCKED,events,");
}

#[test]
fn writers_create_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/out/report.txt");
    let rendered = render(&three_metric_run()).unwrap();

    write_file(&path, &rendered.report).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), rendered.report);
}

#[test]
fn replay_config_drives_a_run() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("fixture.json");
    let mut recorded = serde_json::Map::new();
    recorded.insert(
        OI_PATH.to_string(),
        ok(json!([{"time": T0, "close": "62342795495.89"}])),
    );
    recorded.insert(
        FUNDING_PATH.to_string(),
        ok(json!([{"time": T0, "close": "0.0001"}])),
    );
    std::fs::write(&fixture, Value::Object(recorded).to_string()).unwrap();

    let config = RunConfig::from_toml(&format!(
        "data_mode = \"replay\"\nfixture_path = {:?}\ngroups = [\"daily\"]\n",
        fixture.display().to_string()
    ))
    .unwrap();
    config.validate().unwrap();

    let client = config.build_provider(config.rate_limiter()).unwrap();
    let registry = MetricRegistry::standard().unwrap();
    let set = run_metrics(&registry, client.as_ref(), &config.run_options(), None, None).unwrap();

    assert_eq!(set.len(), registry.by_timeframe(Timeframe::Daily).count());
    assert_eq!(
        set.get("daily_04_weighted_funding_rate").unwrap().value(),
        Some(&MetricValue::Scalar(0.01))
    );
}

#[test]
fn full_mode_without_key_fails_before_any_fetch() {
    let config = RunConfig::default();
    assert!(config.validate().is_err());

    let with_key = RunConfig {
        api_key: Some(ApiKey::new("test-key")),
        ..RunConfig::default()
    };
    assert!(with_key.validate().is_ok());
    let client = with_key.build_provider(with_key.rate_limiter()).unwrap();
    assert_eq!(client.name(), "coinglass+binance_public");
    assert!(client.supports("/api/v3/klines"));
}
