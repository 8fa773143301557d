use thiserror::Error;

/// All errors produced while talking to an upstream market-data provider.
///
/// Callers never treat these as fatal: a failed source becomes an absent
/// value and the affected rule or table degrades on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("malformed payload from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },

    #[error("missing field `{field}` in {endpoint} payload")]
    MissingField { endpoint: String, field: String },

    #[error("{provider} requires an API key but none is configured")]
    MissingApiKey { provider: String },
}

impl FetchFailure {
    pub fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn missing(endpoint: &str, field: &str) -> Self {
        Self::MissingField {
            endpoint: endpoint.to_string(),
            field: field.to_string(),
        }
    }

    /// Short machine-friendly tag used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchFailure::Transport { .. } => "transport",
            FetchFailure::Timeout { .. } => "timeout",
            FetchFailure::Status { .. } => "status",
            FetchFailure::Malformed { .. } => "malformed",
            FetchFailure::MissingField { .. } => "missing_field",
            FetchFailure::MissingApiKey { .. } => "missing_api_key",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = FetchFailure::missing("global", "data.market_cap_percentage.btc");
        assert_eq!(
            err.to_string(),
            "missing field `data.market_cap_percentage.btc` in global payload"
        );
        assert_eq!(err.kind(), "missing_field");
    }

    #[test]
    fn test_status_display() {
        let err = FetchFailure::Status {
            endpoint: "coins/markets".into(),
            status: 429,
        };
        assert_eq!(err.to_string(), "coins/markets responded with HTTP 429");
    }
}
