//! CoinGecko dominance, ETH/BTC ratio and the ranked asset list.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use super::endpoints::Endpoint;
use super::{Fetcher, SourceFailure};
use crate::error::FetchFailure;
use crate::model::{AssetRecord, MarketSnapshot};

// CoinGecko response types. Every field is optional here; the mapping
// below decides what is required.

#[derive(Deserialize, Debug)]
struct GlobalResponse {
    data: Option<GlobalData>,
}

#[derive(Deserialize, Debug)]
struct GlobalData {
    market_cap_percentage: Option<HashMap<String, Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct UsdQuote {
    usd: Option<f64>,
}

#[derive(Deserialize, Debug)]
struct MarketRow {
    id: Option<String>,
    symbol: Option<String>,
    name: Option<String>,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    total_volume: Option<f64>,
}

fn decode<T: serde::de::DeserializeOwned>(endpoint: Endpoint, payload: &Value) -> Result<T, FetchFailure> {
    T::deserialize(payload).map_err(|e| FetchFailure::malformed(endpoint.name(), e.to_string()))
}

pub fn parse_btc_dominance(payload: &Value) -> Result<f64, FetchFailure> {
    let endpoint = Endpoint::Global;
    let resp: GlobalResponse = decode(endpoint, payload)?;
    resp.data
        .and_then(|d| d.market_cap_percentage)
        .and_then(|m| m.get("btc").copied().flatten())
        .ok_or_else(|| FetchFailure::missing(endpoint.name(), "data.market_cap_percentage.btc"))
}

pub fn parse_eth_btc_ratio(payload: &Value) -> Result<f64, FetchFailure> {
    let endpoint = Endpoint::SimplePrice;
    let prices: HashMap<String, Option<UsdQuote>> = decode(endpoint, payload)?;
    let usd = |asset: &str| {
        prices
            .get(asset)
            .and_then(|q| q.as_ref())
            .and_then(|q| q.usd)
            .ok_or_else(|| FetchFailure::missing(endpoint.name(), &format!("{}.usd", asset)))
    };
    let eth = usd("ethereum")?;
    let btc = usd("bitcoin")?;
    if btc <= 0.0 {
        return Err(FetchFailure::malformed(endpoint.name(), "non-positive bitcoin price"));
    }
    Ok(eth / btc)
}

pub fn parse_ranked_assets(payload: &Value) -> Result<Vec<AssetRecord>, FetchFailure> {
    let endpoint = Endpoint::Markets;
    if !payload.is_array() {
        return Err(FetchFailure::malformed(endpoint.name(), "expected an array of markets"));
    }
    let rows: Vec<MarketRow> = decode(endpoint, payload)?;
    rows.into_iter()
        .enumerate()
        .map(|(rank, row)| {
            let required = |v: Option<String>, field: &str| {
                v.ok_or_else(|| FetchFailure::missing(endpoint.name(), &format!("[{}].{}", rank, field)))
            };
            Ok(AssetRecord {
                id: required(row.id, "id")?,
                symbol: required(row.symbol, "symbol")?.to_uppercase(),
                name: required(row.name, "name")?,
                current_price: row.current_price,
                price_change_pct_24h: row.price_change_percentage_24h,
                total_volume: row.total_volume,
            })
        })
        .collect()
}

/// Snapshot plus the sources that failed while building it.
#[derive(Debug, Clone, Default)]
pub struct SnapshotFetch {
    pub snapshot: MarketSnapshot,
    pub failures: Vec<SourceFailure>,
}

impl Fetcher {
    pub async fn btc_dominance(&self) -> Result<f64, FetchFailure> {
        self.fetch(Endpoint::Global, &[], parse_btc_dominance).await
    }

    pub async fn eth_btc_ratio(&self) -> Result<f64, FetchFailure> {
        let params = [
            ("ids", "ethereum,bitcoin".to_string()),
            ("vs_currencies", "usd".to_string()),
        ];
        self.fetch(Endpoint::SimplePrice, &params, parse_eth_btc_ratio).await
    }

    pub async fn ranked_assets(&self) -> Result<Vec<AssetRecord>, FetchFailure> {
        let params = [
            ("vs_currency", "usd".to_string()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", self.config().markets_per_page.to_string()),
            ("page", "1".to_string()),
            ("price_change_percentage", "24h".to_string()),
        ];
        self.fetch(Endpoint::Markets, &params, parse_ranked_assets).await
    }

    /// Fetch each source in turn; a failed source leaves its field absent.
    pub async fn snapshot(&self) -> SnapshotFetch {
        let mut failures = Vec::new();

        let btc_dominance_pct = self
            .btc_dominance()
            .await
            .map_err(|e| failures.push(SourceFailure::new("btc_dominance", e)))
            .ok();
        let eth_btc_ratio = self
            .eth_btc_ratio()
            .await
            .map_err(|e| failures.push(SourceFailure::new("eth_btc_ratio", e)))
            .ok();
        let ranked_assets = self
            .ranked_assets()
            .await
            .map_err(|e| failures.push(SourceFailure::new("ranked_assets", e)))
            .unwrap_or_default();

        SnapshotFetch {
            snapshot: MarketSnapshot {
                btc_dominance_pct,
                eth_btc_ratio,
                ranked_assets,
            },
            failures,
        }
    }
}
