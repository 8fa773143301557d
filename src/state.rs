use crate::phase::{Phase, PhaseThresholds};

/// Which provider decides zone membership for this deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneSource {
    /// CoinMarketCap categories joined with CoinMarketCap quotes.
    CoinMarketCap,
    /// Exchange product listing; the pair's tag is the zone.
    Exchange,
}

impl ZoneSource {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "exchange" | "binance" => ZoneSource::Exchange,
            _ => ZoneSource::CoinMarketCap,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneSource::CoinMarketCap => "cmc",
            ZoneSource::Exchange => "exchange",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub coingecko_base: String,
    pub cmc_base: String,
    pub cmc_api_key: Option<String>,
    pub exchange_products_url: String,
    pub zone_source: ZoneSource,
    /// Number of categories pulled from the listing.
    pub zone_limit: usize,
    /// Constituents requested per category.
    pub zone_tokens_per_zone: usize,
    pub markets_per_page: usize,
    pub http_timeout_secs: u64,
    pub ttl_price_secs: u64,
    pub ttl_zone_quotes_secs: u64,
    pub ttl_zone_membership_secs: u64,
    pub failure_ttl_secs: u64,
    /// 0 runs a single pass.
    pub refresh_secs: u64,
    pub selected_zone: Option<String>,
    pub export_dir: String,
    pub thresholds: PhaseThresholds,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let th = PhaseThresholds::default();
        Self {
            coingecko_base: std::env::var("COINGECKO_BASE").unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
            cmc_base: std::env::var("CMC_BASE").unwrap_or_else(|_| "https://pro-api.coinmarketcap.com".to_string()),
            cmc_api_key: env_opt("CMC_API_KEY"),
            exchange_products_url: std::env::var("EXCHANGE_PRODUCTS_URL").unwrap_or_else(|_| {
                "https://www.binance.com/bapi/asset/v2/public/asset-service/product/get-products".to_string()
            }),
            zone_source: ZoneSource::parse(&std::env::var("ZONE_SOURCE").unwrap_or_default()),
            zone_limit: env_or("ZONE_LIMIT", 20),
            zone_tokens_per_zone: env_or("ZONE_TOKENS_PER_ZONE", 50),
            markets_per_page: env_or("MARKETS_PER_PAGE", 100),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 10),
            ttl_price_secs: env_or("TTL_PRICE_SECS", 180),
            ttl_zone_quotes_secs: env_or("TTL_ZONE_QUOTES_SECS", 600),
            ttl_zone_membership_secs: env_or("TTL_ZONE_MEMBERSHIP_SECS", 86_400),
            failure_ttl_secs: env_or("FAILURE_TTL_SECS", 30),
            refresh_secs: env_or("REFRESH_SECS", 0),
            selected_zone: env_opt("SELECTED_ZONE"),
            export_dir: std::env::var("EXPORT_DIR").unwrap_or_else(|_| ".".to_string()),
            thresholds: PhaseThresholds {
                btc_dominance_pct: env_or("BTC_DOM_TH", th.btc_dominance_pct),
                eth_btc_ratio: env_or("ETH_BTC_TH", th.eth_btc_ratio),
                largecap_change_pct: env_or("LARGECAP_TH", th.largecap_change_pct),
                altcoin_change_pct: env_or("ALT_TH", th.altcoin_change_pct),
                altcoin_drop_pct: env_or("ALT_DROP_TH", th.altcoin_drop_pct),
                altcoin_drop_rate: env_or("ALT_DROP_RATE_TH", th.altcoin_drop_rate),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coingecko_base: "https://api.coingecko.com/api/v3".to_string(),
            cmc_base: "https://pro-api.coinmarketcap.com".to_string(),
            cmc_api_key: None,
            exchange_products_url: "https://www.binance.com/bapi/asset/v2/public/asset-service/product/get-products".to_string(),
            zone_source: ZoneSource::CoinMarketCap,
            zone_limit: 20,
            zone_tokens_per_zone: 50,
            markets_per_page: 100,
            http_timeout_secs: 10,
            ttl_price_secs: 180,
            ttl_zone_quotes_secs: 600,
            ttl_zone_membership_secs: 86_400,
            failure_ttl_secs: 30,
            refresh_secs: 0,
            selected_zone: None,
            export_dir: ".".to_string(),
            thresholds: PhaseThresholds::default(),
        }
    }
}

/// Per-session view state carried between render passes.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub current_phase: Option<Phase>,
    pub selected_zone: Option<String>,
    pub passes: u64,
}

impl SessionState {
    pub fn new(selected_zone: Option<String>) -> Self {
        Self {
            selected_zone,
            ..Default::default()
        }
    }

    /// Record the outcome of a pass; returns the previous phase when it changed.
    pub fn record_phase(&mut self, phase: Phase) -> Option<Phase> {
        self.passes += 1;
        let previous = self.current_phase.replace(phase);
        previous.filter(|p| *p != phase)
    }
}
