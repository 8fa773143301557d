//! Zone membership and the join against price/volume quotes.
//!
//! A deployment uses exactly one membership source (see `ZoneSource`):
//! CoinMarketCap categories joined with CoinMarketCap quotes, or the
//! exchange product listing whose tags double as zones. A token belongs to
//! a single zone; when a provider lists it more than once the last
//! assignment wins.

use serde_json::Value;
use std::collections::HashMap;

use super::endpoints::Endpoint;
use super::{as_id, num_field, str_field, Fetcher, SourceFailure};
use crate::error::FetchFailure;
use crate::model::{CategorySummary, ZoneTokenRecord};
use crate::state::ZoneSource;

/// CoinMarketCap accepts at most this many ids per quotes call.
const QUOTE_BATCH: usize = 100;

/// A category constituent before it is joined with quotes.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberToken {
    pub id: String,
    pub symbol: Option<String>,
}

/// Latest price/volume figures for one token.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quote {
    pub price: Option<f64>,
    pub price_change_pct_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub volume_change_pct_24h: Option<f64>,
}

/// Token → zone mapping with last-write-wins semantics.
#[derive(Debug, Clone, Default)]
pub struct ZoneMembership {
    zone_of: HashMap<String, String>,
    symbol_of: HashMap<String, String>,
    /// First-seen order of tokens, for deterministic output.
    order: Vec<String>,
}

impl ZoneMembership {
    pub fn assign(&mut self, token: &MemberToken, zone: &str) {
        if self
            .zone_of
            .insert(token.id.clone(), zone.to_string())
            .is_none()
        {
            self.order.push(token.id.clone());
        }
        if let Some(sym) = &token.symbol {
            self.symbol_of.insert(token.id.clone(), sym.to_uppercase());
        }
    }

    pub fn zone_of(&self, token_id: &str) -> Option<&str> {
        self.zone_of.get(token_id).map(String::as_str)
    }

    pub fn token_ids(&self) -> &[String] {
        &self.order
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Join against quotes. Tokens without any quote are left out.
    pub fn join(&self, quotes: &HashMap<String, Quote>) -> Vec<ZoneTokenRecord> {
        self.order
            .iter()
            .filter_map(|id| {
                let zone = self.zone_of.get(id)?;
                let quote = quotes.get(id)?;
                Some(ZoneTokenRecord {
                    zone: zone.clone(),
                    token_id: id.clone(),
                    symbol: self.symbol_of.get(id).cloned(),
                    price: quote.price,
                    price_change_pct_24h: quote.price_change_pct_24h,
                    volume_24h: quote.volume_24h,
                    volume_change_pct_24h: quote.volume_change_pct_24h,
                })
            })
            .collect()
    }
}

// =============================================================================
// CoinMarketCap parsing
// =============================================================================

fn cmc_data<'a>(endpoint: Endpoint, payload: &'a Value) -> Result<&'a Value, FetchFailure> {
    payload
        .get("data")
        .filter(|d| !d.is_null())
        .ok_or_else(|| {
            // Error payloads carry the reason under status.error_message.
            match payload
                .get("status")
                .and_then(|s| s.get("error_message"))
                .and_then(Value::as_str)
            {
                Some(msg) => FetchFailure::malformed(endpoint.name(), msg),
                None => FetchFailure::missing(endpoint.name(), "data"),
            }
        })
}

fn parse_timestamp(v: Option<&Value>) -> Option<chrono::DateTime<chrono::Utc>> {
    v.and_then(Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

pub fn parse_categories(payload: &Value) -> Result<Vec<CategorySummary>, FetchFailure> {
    let endpoint = Endpoint::CmcCategories;
    let rows = cmc_data(endpoint, payload)?
        .as_array()
        .ok_or_else(|| FetchFailure::malformed(endpoint.name(), "data is not an array"))?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let id = row
                .get("id")
                .and_then(as_id)
                .ok_or_else(|| FetchFailure::missing(endpoint.name(), &format!("data[{}].id", i)))?;
            let name = str_field(row, "name")
                .ok_or_else(|| FetchFailure::missing(endpoint.name(), &format!("data[{}].name", i)))?;
            Ok(CategorySummary {
                id,
                name,
                num_tokens: num_field(row, "num_tokens").filter(|n| *n >= 0.0).map(|n| n as u64),
                avg_price_change: num_field(row, "avg_price_change"),
                market_cap: num_field(row, "market_cap"),
                market_cap_change: num_field(row, "market_cap_change"),
                volume: num_field(row, "volume"),
                volume_change: num_field(row, "volume_change"),
                last_updated: parse_timestamp(row.get("last_updated")),
            })
        })
        .collect()
}

fn member_from(v: &Value) -> Option<MemberToken> {
    match v {
        Value::Object(_) => Some(MemberToken {
            id: v.get("id").and_then(as_id)?,
            symbol: str_field(v, "symbol"),
        }),
        other => as_id(other).map(|id| MemberToken { id, symbol: None }),
    }
}

/// Constituents of one category. `coins` is preferred; lower plan tiers
/// only return `top_3_coins`, either as ids or as objects.
pub fn parse_category_members(payload: &Value) -> Result<Vec<MemberToken>, FetchFailure> {
    let endpoint = Endpoint::CmcCategory;
    let data = cmc_data(endpoint, payload)?;
    let list = ["coins", "top_3_coins"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_array))
        .ok_or_else(|| FetchFailure::missing(endpoint.name(), "data.coins"))?;
    Ok(list.iter().filter_map(member_from).collect())
}

fn quote_from(entry: &Value) -> Option<(String, Quote)> {
    let id = entry.get("id").and_then(as_id)?;
    let usd = entry.get("quote").and_then(|q| q.get("USD"))?;
    Some((
        id,
        Quote {
            price: num_field(usd, "price"),
            price_change_pct_24h: num_field(usd, "percent_change_24h"),
            volume_24h: num_field(usd, "volume_24h"),
            volume_change_pct_24h: num_field(usd, "volume_change_24h"),
        },
    ))
}

/// Quotes keyed by token id. Entries may be objects or one-element arrays.
pub fn parse_quotes(payload: &Value) -> Result<HashMap<String, Quote>, FetchFailure> {
    let endpoint = Endpoint::CmcQuotes;
    let data = cmc_data(endpoint, payload)?
        .as_object()
        .ok_or_else(|| FetchFailure::malformed(endpoint.name(), "data is not an object"))?;

    let mut quotes = HashMap::new();
    for entry in data.values() {
        let entries: Vec<&Value> = match entry {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        quotes.extend(entries.into_iter().filter_map(quote_from));
    }
    Ok(quotes)
}

// =============================================================================
// Exchange product listing
// =============================================================================

/// Tokens from the exchange listing. Only USDT-quoted pairs that are
/// trading are admitted; the last tag of a pair is its zone.
pub fn parse_exchange_products(payload: &Value) -> Result<Vec<ZoneTokenRecord>, FetchFailure> {
    let endpoint = Endpoint::ExchangeProducts;
    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchFailure::missing(endpoint.name(), "data"))?;

    let mut membership = ZoneMembership::default();
    let mut quotes = HashMap::new();
    for row in rows {
        if str_field(row, "q").as_deref() != Some("USDT")
            || str_field(row, "st").as_deref() != Some("TRADING")
        {
            continue;
        }
        let Some(base) = str_field(row, "b") else {
            continue;
        };
        let tags: Vec<&str> = row
            .get("tags")
            .and_then(Value::as_array)
            .map(|t| t.iter().filter_map(Value::as_str).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        if tags.is_empty() {
            continue;
        }

        let token = MemberToken {
            id: base.to_lowercase(),
            symbol: Some(base.to_uppercase()),
        };
        for tag in &tags {
            membership.assign(&token, tag);
        }

        let close = num_field(row, "c");
        let open = num_field(row, "o").filter(|o| *o > 0.0);
        quotes.insert(
            token.id.clone(),
            Quote {
                price: close,
                price_change_pct_24h: close.zip(open).map(|(c, o)| (c - o) / o * 100.0),
                volume_24h: num_field(row, "qv").or_else(|| num_field(row, "v")),
                volume_change_pct_24h: None,
            },
        );
    }
    Ok(membership.join(&quotes))
}

// =============================================================================
// Fetching
// =============================================================================

/// Zone records for one pass plus the sources that failed.
#[derive(Debug, Clone)]
pub struct ZoneFetch {
    pub source: ZoneSource,
    pub records: Vec<ZoneTokenRecord>,
    pub failures: Vec<SourceFailure>,
}

impl Fetcher {
    pub async fn categories(&self, limit: usize) -> Result<Vec<CategorySummary>, FetchFailure> {
        let params = [("start", "1".to_string()), ("limit", limit.to_string())];
        self.fetch(Endpoint::CmcCategories, &params, parse_categories).await
    }

    pub async fn category_members(&self, category_id: &str) -> Result<Vec<MemberToken>, FetchFailure> {
        let params = [
            ("id", category_id.to_string()),
            ("limit", self.config().zone_tokens_per_zone.to_string()),
        ];
        self.fetch(Endpoint::CmcCategory, &params, parse_category_members).await
    }

    pub async fn quotes(&self, ids: &[String]) -> Result<HashMap<String, Quote>, FetchFailure> {
        let mut all = HashMap::new();
        for batch in ids.chunks(QUOTE_BATCH) {
            let params = [("id", batch.join(","))];
            all.extend(self.fetch(Endpoint::CmcQuotes, &params, parse_quotes).await?);
        }
        Ok(all)
    }

    pub async fn exchange_zone_records(&self) -> Result<Vec<ZoneTokenRecord>, FetchFailure> {
        self.fetch(Endpoint::ExchangeProducts, &[], parse_exchange_products).await
    }

    /// Categories → membership → quotes → join.
    ///
    /// A category whose constituents cannot be fetched is skipped; a failed
    /// listing or quotes call leaves the zone table empty.
    pub async fn cmc_zone_records(&self) -> (Vec<ZoneTokenRecord>, Vec<SourceFailure>) {
        let mut failures = Vec::new();

        let categories = match self.categories(self.config().zone_limit).await {
            Ok(c) => c,
            Err(e) => {
                failures.push(SourceFailure::new("zone_categories", e));
                return (Vec::new(), failures);
            }
        };

        let mut membership = ZoneMembership::default();
        for category in &categories {
            match self.category_members(&category.id).await {
                Ok(members) => {
                    for m in &members {
                        membership.assign(m, &category.name);
                    }
                }
                Err(e) => {
                    failures.push(SourceFailure::new(&format!("zone_members:{}", category.name), e));
                }
            }
        }
        if membership.is_empty() {
            return (Vec::new(), failures);
        }

        match self.quotes(membership.token_ids()).await {
            Ok(quotes) => (membership.join(&quotes), failures),
            Err(e) => {
                failures.push(SourceFailure::new("zone_quotes", e));
                (Vec::new(), failures)
            }
        }
    }

    pub async fn zone_records(&self) -> ZoneFetch {
        let source = self.config().zone_source;
        let (records, failures) = match source {
            ZoneSource::CoinMarketCap => self.cmc_zone_records().await,
            ZoneSource::Exchange => match self.exchange_zone_records().await {
                Ok(records) => (records, Vec::new()),
                Err(e) => (Vec::new(), vec![SourceFailure::new("exchange_products", e)]),
            },
        };
        ZoneFetch {
            source,
            records,
            failures,
        }
    }
}
