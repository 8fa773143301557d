use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::FetchFailure;
use crate::state::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    CoinGecko,
    CoinMarketCap,
    Exchange,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::CoinGecko => "coingecko",
            Provider::CoinMarketCap => "coinmarketcap",
            Provider::Exchange => "exchange",
        }
    }
}

/// Every upstream call the fetcher knows how to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Global market figures, including BTC dominance.
    Global,
    /// Spot prices for a list of asset ids.
    SimplePrice,
    /// Market-cap ranked asset list.
    Markets,
    /// Category listing with provider-side summaries.
    CmcCategories,
    /// Constituents of a single category.
    CmcCategory,
    /// Latest price/volume quotes for a list of ids.
    CmcQuotes,
    /// Spot product listing with tags.
    ExchangeProducts,
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Global => "global",
            Endpoint::SimplePrice => "simple/price",
            Endpoint::Markets => "coins/markets",
            Endpoint::CmcCategories => "cryptocurrency/categories",
            Endpoint::CmcCategory => "cryptocurrency/category",
            Endpoint::CmcQuotes => "cryptocurrency/quotes/latest",
            Endpoint::ExchangeProducts => "exchange/products",
        }
    }

    pub fn provider(&self) -> Provider {
        match self {
            Endpoint::Global | Endpoint::SimplePrice | Endpoint::Markets => Provider::CoinGecko,
            Endpoint::CmcCategories | Endpoint::CmcCategory | Endpoint::CmcQuotes => {
                Provider::CoinMarketCap
            }
            Endpoint::ExchangeProducts => Provider::Exchange,
        }
    }

    /// Membership changes slowly; prices do not.
    pub fn ttl(&self, cfg: &Config) -> Duration {
        let secs = match self {
            Endpoint::Global | Endpoint::SimplePrice | Endpoint::Markets => cfg.ttl_price_secs,
            Endpoint::CmcQuotes | Endpoint::CmcCategories | Endpoint::ExchangeProducts => {
                cfg.ttl_zone_quotes_secs
            }
            Endpoint::CmcCategory => cfg.ttl_zone_membership_secs,
        };
        Duration::from_secs(secs)
    }

    fn base_url(&self, cfg: &Config) -> String {
        let trim = |s: &str| s.trim_end_matches('/').to_string();
        match self {
            Endpoint::Global => format!("{}/global", trim(&cfg.coingecko_base)),
            Endpoint::SimplePrice => format!("{}/simple/price", trim(&cfg.coingecko_base)),
            Endpoint::Markets => format!("{}/coins/markets", trim(&cfg.coingecko_base)),
            Endpoint::CmcCategories => format!("{}/v1/cryptocurrency/categories", trim(&cfg.cmc_base)),
            Endpoint::CmcCategory => format!("{}/v1/cryptocurrency/category", trim(&cfg.cmc_base)),
            Endpoint::CmcQuotes => format!("{}/v2/cryptocurrency/quotes/latest", trim(&cfg.cmc_base)),
            Endpoint::ExchangeProducts => cfg.exchange_products_url.clone(),
        }
    }

    pub fn url(&self, cfg: &Config, params: &[(String, String)]) -> Result<Url, FetchFailure> {
        let base = self.base_url(cfg);
        let parsed = if params.is_empty() {
            Url::parse(&base)
        } else {
            Url::parse_with_params(&base, params)
        };
        parsed.map_err(|e| FetchFailure::Transport {
            endpoint: self.name().to_string(),
            message: format!("invalid url {}: {}", base, e),
        })
    }
}

/// Cache key: operation identity plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub endpoint: Endpoint,
    pub params: Vec<(String, String)>,
}

impl RequestKey {
    pub fn new(endpoint: Endpoint, params: &[(&str, String)]) -> Self {
        Self {
            endpoint,
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint.name())?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            write!(f, "{}{}={}", if i == 0 { '?' } else { '&' }, k, v)?;
        }
        Ok(())
    }
}
