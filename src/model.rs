//! Typed records shared by the fetcher, the classifier and the aggregator.

use serde::{Deserialize, Serialize};

/// One entry of the capitalization-ranked asset list.
///
/// Numeric fields are optional: providers send `null` for freshly listed
/// assets, and dropping the row would shift every rank band below it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    /// Always uppercased.
    pub symbol: String,
    pub name: String,
    pub current_price: Option<f64>,
    pub price_change_pct_24h: Option<f64>,
    pub total_volume: Option<f64>,
}

/// Everything the phase classifier looks at.
///
/// `ranked_assets` is ordered by descending market cap; index = rank.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub btc_dominance_pct: Option<f64>,
    pub eth_btc_ratio: Option<f64>,
    pub ranked_assets: Vec<AssetRecord>,
}

/// A token joined to the zone it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneTokenRecord {
    pub zone: String,
    pub token_id: String,
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub price_change_pct_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub volume_change_pct_24h: Option<f64>,
}

impl ZoneTokenRecord {
    /// Record with only a zone and a price change; handy for tests and fixtures.
    pub fn with_change(zone: &str, token_id: &str, change: f64) -> Self {
        Self {
            zone: zone.to_string(),
            token_id: token_id.to_string(),
            symbol: None,
            price: None,
            price_change_pct_24h: Some(change),
            volume_24h: None,
            volume_change_pct_24h: None,
        }
    }
}

/// Per-zone summary row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStats {
    pub zone: String,
    pub avg_price_change_pct: f64,
    /// Mean over the members that report a volume change; absent if none do.
    pub avg_volume_change_pct: Option<f64>,
    pub token_count: usize,
}

/// Provider-side summary of one category, as listed by CoinMarketCap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub id: String,
    pub name: String,
    pub num_tokens: Option<u64>,
    pub avg_price_change: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_change: Option<f64>,
    pub volume: Option<f64>,
    pub volume_change: Option<f64>,
    pub last_updated: Option<chrono::DateTime<chrono::Utc>>,
}
