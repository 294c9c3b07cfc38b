use async_trait::async_trait;

use crate::{
    fundamentals::{CompanyProfile, QuarterlyStatements},
    history::{HistoryQuery, PriceBar},
    MarketDataError, Quote,
};

/// Latest-price lookup used by the streaming loop.
///
/// A missing or non-positive price is reported as
/// [`MarketDataError::DataUnavailable`], never as a zero quote.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn latest_quote(&self, ticker: &str) -> Result<Quote, MarketDataError>;
}

#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, MarketDataError>;

    async fn quarterly_statements(
        &self,
        ticker: &str,
    ) -> Result<QuarterlyStatements, MarketDataError>;

    async fn price_history(
        &self,
        ticker: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<PriceBar>, MarketDataError>;
}
