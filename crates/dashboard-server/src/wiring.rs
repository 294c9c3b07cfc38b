use std::{error::Error, sync::Arc};

use api::AppState;
use axum::{routing::get, Router};
use market_data::YahooClient;
use streaming::{MarketClock, StreamingEngine};

use crate::config::Config;

/// Builds the shared state: one provider client serves both quotes and
/// fundamentals.
pub fn build_state(config: &Config) -> Result<AppState, Box<dyn Error>> {
    let provider = Arc::new(YahooClient::new(
        config.provider_url.as_str(),
        config.http_timeout,
    )?);
    let engine = StreamingEngine::new(
        provider.clone(),
        Arc::new(MarketClock::default()),
        config.engine_settings(),
    )?;

    Ok(AppState::new(engine, provider))
}

pub fn build_app(state: AppState) -> Router {
    api::app(state).route("/health", get(healthcheck))
}

async fn healthcheck() -> &'static str {
    "ok"
}
