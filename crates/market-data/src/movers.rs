use futures_util::future::join_all;
use serde::Serialize;

use crate::{CompanyProfile, FundamentalsSource};

pub const TOP_MOVER_TICKERS: [&str; 10] = [
    "AAPL", "GOOGL", "MSFT", "AMZN", "FB", "TSLA", "NVDA", "JPM", "JNJ", "V",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mover {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
}

impl Mover {
    /// `None` unless both the price and the previous close are known and non-zero.
    pub fn from_profile(symbol: &str, profile: &CompanyProfile) -> Option<Self> {
        let price = profile.current_price.filter(|px| *px != 0.0 && px.is_finite())?;
        let previous_close = profile
            .previous_close
            .filter(|px| *px != 0.0 && px.is_finite())?;
        let change = price - previous_close;

        Some(Self {
            symbol: symbol.to_string(),
            price,
            change,
            percent_change: change / previous_close * 100.0,
        })
    }
}

/// Movers across [`TOP_MOVER_TICKERS`], largest absolute move first.
///
/// A ticker whose profile cannot be fetched is skipped.
pub async fn top_movers(source: &dyn FundamentalsSource) -> Vec<Mover> {
    let profiles = join_all(
        TOP_MOVER_TICKERS
            .iter()
            .map(|ticker| source.company_profile(ticker)),
    )
    .await;

    let mut movers: Vec<Mover> = TOP_MOVER_TICKERS
        .iter()
        .zip(profiles)
        .filter_map(|(ticker, profile)| match profile {
            Ok(profile) => Mover::from_profile(ticker, &profile),
            Err(err) => {
                tracing::warn!(ticker = *ticker, error = %err, "skipping mover");
                None
            }
        })
        .collect();

    movers.sort_by(|a, b| b.percent_change.abs().total_cmp(&a.percent_change.abs()));
    movers
}
