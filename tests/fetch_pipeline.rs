use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use moneyflow::error::FetchFailure;
use moneyflow::feed::cache::ManualClock;
use moneyflow::feed::transport::{Request, Transport};
use moneyflow::feed::Fetcher;
use moneyflow::phase::Phase;
use moneyflow::pipeline::{run_pass, RefreshContext};
use moneyflow::state::{Config, SessionState, ZoneSource};

/// Canned payloads keyed by endpoint name (plus `id` for category lookups).
#[derive(Default)]
struct FakeTransport {
    payloads: Mutex<HashMap<String, Result<Value, FetchFailure>>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    fn with(self, key: &str, payload: Result<Value, FetchFailure>) -> Self {
        if let Ok(mut p) = self.payloads.lock() {
            p.insert(key.to_string(), payload);
        }
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn route(request: &Request) -> String {
    if request.endpoint == "cryptocurrency/category" {
        let id = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        format!("{}:{}", request.endpoint, id)
    } else {
        request.endpoint.to_string()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_json(&self, request: &Request) -> Result<Value, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = route(request);
        self.payloads
            .lock()
            .ok()
            .and_then(|p| p.get(&key).cloned())
            .unwrap_or(Err(FetchFailure::Status {
                endpoint: request.endpoint.to_string(),
                status: 404,
            }))
    }
}

fn markets(largecap: f64, alt: f64) -> Value {
    let rows: Vec<Value> = (0..50)
        .map(|i| {
            let change = match i {
                0..=9 => 0.0,
                10..=29 => largecap,
                _ => alt,
            };
            json!({
                "id": format!("coin-{}", i),
                "symbol": format!("c{}", i),
                "name": format!("Coin {}", i),
                "current_price": 1.0,
                "price_change_percentage_24h": change,
                "total_volume": 1.0e6
            })
        })
        .collect();
    Value::Array(rows)
}

fn market_transport(dominance: f64, eth: f64) -> FakeTransport {
    FakeTransport::default()
        .with(
            "global",
            Ok(json!({"data": {"market_cap_percentage": {"btc": dominance}}})),
        )
        .with(
            "simple/price",
            Ok(json!({"ethereum": {"usd": eth}, "bitcoin": {"usd": 60000.0}})),
        )
        .with("coins/markets", Ok(markets(6.0, 0.0)))
}

fn cmc_config() -> Config {
    Config {
        cmc_api_key: Some("test-key".to_string()),
        ..Config::default()
    }
}

fn fetcher(cfg: Config, transport: Arc<FakeTransport>, clock: Arc<ManualClock>) -> Fetcher {
    Fetcher::with_parts(cfg, transport, clock)
}

#[tokio::test]
async fn identical_fetches_within_ttl_hit_upstream_once() {
    let transport = Arc::new(market_transport(55.0, 3000.0));
    let clock = Arc::new(ManualClock::new());
    let f = fetcher(Config::default(), transport.clone(), clock.clone());

    assert_eq!(f.btc_dominance().await, Ok(55.0));
    assert_eq!(f.btc_dominance().await, Ok(55.0));
    assert_eq!(transport.calls(), 1);
    assert_eq!(f.cache_stats().hits, 1);

    clock.advance(Duration::from_secs(181));
    assert_eq!(f.btc_dominance().await, Ok(55.0));
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn concurrent_identical_fetches_share_one_request() {
    let transport = Arc::new(market_transport(55.0, 3000.0));
    let f = fetcher(Config::default(), transport.clone(), Arc::new(ManualClock::new()));

    let (a, b) = tokio::join!(f.eth_btc_ratio(), f.eth_btc_ratio());
    assert_eq!(a, b);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn failures_are_cached_briefly() {
    let transport = Arc::new(FakeTransport::default());
    let clock = Arc::new(ManualClock::new());
    let f = fetcher(Config::default(), transport.clone(), clock.clone());

    assert!(matches!(f.btc_dominance().await, Err(FetchFailure::Status { status: 404, .. })));
    assert!(f.btc_dominance().await.is_err());
    assert_eq!(transport.calls(), 1);

    clock.advance(Duration::from_secs(31));
    assert!(f.btc_dominance().await.is_err());
    assert_eq!(transport.calls(), 2);
}

/// Serves queued payloads in order, repeating the last one.
struct ScriptedTransport {
    script: Mutex<VecDeque<Value>>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(payloads: Vec<Value>) -> Self {
        Self {
            script: Mutex::new(payloads.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, _request: &Request) -> Result<Value, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().map_err(|_| FetchFailure::Transport {
            endpoint: "scripted".to_string(),
            message: "poisoned".to_string(),
        })?;
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        Ok(next.unwrap_or(Value::Null))
    }
}

#[tokio::test]
async fn rejected_ok_payload_expires_with_failure_ttl() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        json!({"status": {"error_code": 429}}),
        json!({"data": {"market_cap_percentage": {"btc": 55.0}}}),
    ]));
    let clock = Arc::new(ManualClock::new());
    let f = Fetcher::with_parts(Config::default(), transport.clone(), clock.clone());

    assert!(matches!(f.btc_dominance().await, Err(FetchFailure::MissingField { .. })));
    assert!(f.btc_dominance().await.is_err());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

    clock.advance(Duration::from_secs(31));
    assert_eq!(f.btc_dominance().await, Ok(55.0));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);

    // A good payload is then held for the full price TTL.
    clock.advance(Duration::from_secs(120));
    assert_eq!(f.btc_dominance().await, Ok(55.0));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rejected_category_payload_is_not_held_for_a_day() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        json!({"status": {"error_code": 500, "error_message": "Internal error"}, "data": null}),
        json!({"data": {"coins": [{"id": 1, "symbol": "BTC"}]}}),
    ]));
    let clock = Arc::new(ManualClock::new());
    let f = Fetcher::with_parts(cmc_config(), transport.clone(), clock.clone());

    assert!(matches!(
        f.category_members("c1").await,
        Err(FetchFailure::Malformed { .. })
    ));
    clock.advance(Duration::from_secs(31));
    let members = f.category_members("c1").await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn pass_with_cmc_zones() {
    let transport = market_transport(40.0, 1800.0)
        .with(
            "cryptocurrency/categories",
            Ok(json!({"data": [
                {"id": "c1", "name": "DeFi"},
                {"id": "c2", "name": "AI"},
                {"id": "c3", "name": "Broken"}
            ]})),
        )
        .with(
            "cryptocurrency/category:c1",
            Ok(json!({"data": {"coins": [{"id": 7083, "symbol": "UNI"}, {"id": 7278, "symbol": "AAVE"}]}})),
        )
        .with(
            "cryptocurrency/category:c2",
            Ok(json!({"data": {"top_3_coins": [3773, 7278]}})),
        )
        .with(
            "cryptocurrency/quotes/latest",
            Ok(json!({"data": {
                "7083": {"id": 7083, "quote": {"USD": {"price": 10.0, "percent_change_24h": 4.0, "volume_change_24h": 10.0}}},
                "7278": {"id": 7278, "quote": {"USD": {"price": 90.0, "percent_change_24h": 2.0}}},
                "3773": {"id": 3773, "quote": {"USD": {"price": 1.5, "percent_change_24h": 8.0, "volume_change_24h": -2.0}}}
            }})),
        );
    let transport = Arc::new(transport);
    let cfg = Config {
        selected_zone: Some("AI".to_string()),
        ..cmc_config()
    };
    let ctx = RefreshContext::with_fetcher(fetcher(cfg, transport, Arc::new(ManualClock::new())));
    let mut session = SessionState::new(Some("AI".to_string()));

    let view = run_pass(&ctx, &mut session).await;

    // dominance 40, ratio 0.03, largecap mean 6.0
    assert_eq!(view.phase, Phase::LargeCaps);
    assert_eq!(view.zone_source, ZoneSource::CoinMarketCap);
    // AAVE is listed under DeFi first, then AI; the later listing wins.
    assert_eq!(view.zones.len(), 2);
    assert_eq!(view.zones[0].zone, "AI");
    assert_eq!(view.zones[0].token_count, 2);
    assert_eq!(view.zones[0].avg_price_change_pct, 5.0);
    assert_eq!(view.zones[0].avg_volume_change_pct, Some(-2.0));
    assert_eq!(view.zones[1].zone, "DeFi");
    assert_eq!(view.zones[1].token_count, 1);
    assert_eq!(view.selected_members.len(), 2);
    // The category with no payload is reported, not fatal.
    assert_eq!(view.failures.len(), 1);
    assert_eq!(view.failures[0].source, "zone_members:Broken");
}

#[tokio::test]
async fn pass_without_api_key_still_classifies() {
    let transport = Arc::new(market_transport(55.0, 3000.0));
    let ctx = RefreshContext::with_fetcher(fetcher(
        Config::default(),
        transport.clone(),
        Arc::new(ManualClock::new()),
    ));
    let mut session = SessionState::default();

    let view = run_pass(&ctx, &mut session).await;

    assert_eq!(view.phase, Phase::Bitcoin);
    assert!(view.market_data_available());
    assert!(!view.zone_data_available());
    assert!(matches!(
        view.failures[0].failure,
        FetchFailure::MissingApiKey { .. }
    ));
    // Only the three market endpoints went upstream.
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn pass_with_exchange_zones() {
    let transport = market_transport(40.0, 1800.0).with(
        "exchange/products",
        Ok(json!({"data": [
            {"s": "FETUSDT", "b": "FET", "q": "USDT", "st": "TRADING", "tags": ["AI"], "o": "1.0", "c": "1.2"},
            {"s": "UNIUSDT", "b": "UNI", "q": "USDT", "st": "TRADING", "tags": ["DeFi"], "o": "10.0", "c": "10.5"}
        ]})),
    );
    let cfg = Config {
        zone_source: ZoneSource::Exchange,
        ..Config::default()
    };
    let ctx = RefreshContext::with_fetcher(fetcher(
        cfg,
        Arc::new(transport),
        Arc::new(ManualClock::new()),
    ));
    let mut session = SessionState::default();

    let view = run_pass(&ctx, &mut session).await;

    assert!(view.failures.is_empty());
    assert_eq!(view.zone_source, ZoneSource::Exchange);
    assert_eq!(view.zones[0].zone, "AI");
    assert!((view.zones[0].avg_price_change_pct - 20.0).abs() < 1e-9);
    assert_eq!(view.zones[1].zone, "DeFi");
}

#[tokio::test]
async fn second_pass_is_served_from_cache() {
    let transport = Arc::new(market_transport(55.0, 3000.0));
    let ctx = RefreshContext::with_fetcher(fetcher(
        Config::default(),
        transport.clone(),
        Arc::new(ManualClock::new()),
    ));
    let mut session = SessionState::default();

    run_pass(&ctx, &mut session).await;
    let calls = transport.calls();
    let view = run_pass(&ctx, &mut session).await;

    assert_eq!(transport.calls(), calls);
    assert_eq!(view.phase, Phase::Bitcoin);
    assert_eq!(session.passes, 2);
}
