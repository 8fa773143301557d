use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::error::FetchFailure;

/// A single GET against an upstream provider.
#[derive(Debug, Clone)]
pub struct Request {
    /// Endpoint name, used in errors and logs.
    pub endpoint: &'static str,
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
}

/// Source of raw JSON payloads. Swapped for an in-memory fake in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, request: &Request) -> Result<Value, FetchFailure>;
}

/// reqwest-backed transport with a hard per-request timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .user_agent(concat!("moneyflow/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }
}

fn map_reqwest_error(endpoint: &str, err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else if err.is_decode() {
        FetchFailure::malformed(endpoint, err.to_string())
    } else {
        FetchFailure::Transport {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

fn check_status(endpoint: &str, status: reqwest::StatusCode) -> Result<(), FetchFailure> {
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchFailure::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, request: &Request) -> Result<Value, FetchFailure> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .header("Accept", "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(request.endpoint, e))?;

        check_status(request.endpoint, resp.status())?;

        resp.json::<Value>()
            .await
            .map_err(|e| map_reqwest_error(request.endpoint, e))
    }
}
