//! Upstream market data: transport, cache and per-endpoint parsing.

pub mod cache;
pub mod endpoints;
pub mod market;
pub mod transport;
pub mod zones;

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchFailure;
use crate::state::Config;
use cache::{CacheStats, Clock, SystemClock, TtlCache};
use endpoints::{Endpoint, Provider, RequestKey};
use transport::{HttpTransport, Request, Transport};

/// A source that failed during a pass, kept for the display collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub source: String,
    pub failure: FetchFailure,
}

impl SourceFailure {
    pub fn new(source: &str, failure: FetchFailure) -> Self {
        Self {
            source: source.to_string(),
            failure,
        }
    }
}

/// Cached access to every upstream endpoint.
pub struct Fetcher {
    cfg: Config,
    transport: Arc<dyn Transport>,
    cache: TtlCache<RequestKey, Value>,
}

impl Fetcher {
    pub fn new(cfg: Config) -> Self {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(cfg.http_timeout_secs)));
        Self::with_parts(cfg, transport, Arc::new(SystemClock))
    }

    pub fn with_parts(cfg: Config, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let failure_ttl = Duration::from_secs(cfg.failure_ttl_secs);
        Self {
            cfg,
            transport,
            cache: TtlCache::new(clock, failure_ttl),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Raw payload for `endpoint`, memoized per (endpoint, params).
    pub async fn fetch_json(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
    ) -> Result<Value, FetchFailure> {
        self.fetch_checked(endpoint, params, |_| Ok(())).await
    }

    /// Fetch and map into a typed value; parse errors surface as `FetchFailure`.
    ///
    /// `parse` also runs before the payload is cached, so a 200 response it
    /// rejects is remembered only for the failure TTL.
    pub async fn fetch<T, P>(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        parse: P,
    ) -> Result<T, FetchFailure>
    where
        P: Fn(&Value) -> Result<T, FetchFailure>,
    {
        let payload = self
            .fetch_checked(endpoint, params, |v: &Value| parse(v).map(drop))
            .await?;
        parse(&payload)
    }

    async fn fetch_checked<C>(
        &self,
        endpoint: Endpoint,
        params: &[(&str, String)],
        check: C,
    ) -> Result<Value, FetchFailure>
    where
        C: FnOnce(&Value) -> Result<(), FetchFailure>,
    {
        let key = RequestKey::new(endpoint, params);
        let request = self.request(&key)?;
        let transport = self.transport.clone();
        self.cache
            .get_or_fetch(key, endpoint.ttl(&self.cfg), move || async move {
                let payload = transport.get_json(&request).await?;
                check(&payload)?;
                Ok(payload)
            })
            .await
    }

    fn request(&self, key: &RequestKey) -> Result<Request, FetchFailure> {
        let url = key.endpoint.url(&self.cfg, &key.params)?;
        let mut headers = Vec::new();
        if key.endpoint.provider() == Provider::CoinMarketCap {
            let api_key = self
                .cfg
                .cmc_api_key
                .clone()
                .ok_or_else(|| FetchFailure::MissingApiKey {
                    provider: Provider::CoinMarketCap.as_str().to_string(),
                })?;
            headers.push(("X-CMC_PRO_API_KEY", api_key));
        }
        Ok(Request {
            endpoint: key.endpoint.name(),
            url,
            headers,
        })
    }
}

// Lenient JSON accessors for providers whose field types drift between plans.

/// Number or numeric string.
pub(crate) fn as_num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn num_field(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key).and_then(as_num).filter(|v| v.is_finite())
}

pub(crate) fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.is_empty())
}

/// Identifiers come back as numbers or strings depending on the endpoint.
pub(crate) fn as_id(v: &Value) -> Option<String> {
    match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
