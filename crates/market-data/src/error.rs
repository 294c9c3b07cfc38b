use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarketDataError {
    /// The provider answered but had nothing usable for the ticker.
    #[error("{0}")]
    DataUnavailable(String),

    #[error("{0}")]
    InvalidRange(String),

    /// Network failure, timeout, or non-success status talking to the provider.
    #[error("provider request failed: {0}")]
    Transient(#[from] reqwest::Error),

    #[error("unexpected provider payload: {0}")]
    Decode(String),

    #[error("invalid provider URL: {0}")]
    InvalidProviderUrl(String),
}

impl MarketDataError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::DataUnavailable(message.into())
    }
}

impl From<serde_json::Error> for MarketDataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
