use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use crate::{
    CompanyProfile, FundamentalsSource, HistoryQuery, HistorySpan, MarketDataError, PriceBar,
    QuarterlyStatements,
};

#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    pub profiles: HashMap<String, CompanyProfile>,
    pub fallback_profile: CompanyProfile,
    pub statements: QuarterlyStatements,
    pub window_bars: Vec<PriceBar>,
    pub last_session_bars: Vec<PriceBar>,
    pub failing: HashSet<String>,
    history_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_profile(profile: CompanyProfile) -> Self {
        Self {
            fallback_profile: profile,
            ..Self::default()
        }
    }

    pub fn sample_profile() -> CompanyProfile {
        CompanyProfile {
            long_name: Some("Apple Inc.".to_string()),
            current_price: Some(191.25),
            regular_market_price: Some(191.0),
            previous_close: Some(189.0),
            trailing_pe: Some(29.5),
            industry: Some("Consumer Electronics".to_string()),
            summary: Some("Designs phones.".to_string()),
        }
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::Relaxed)
    }

    fn check(&self, ticker: &str) -> Result<(), MarketDataError> {
        if self.failing.contains(ticker) {
            return Err(MarketDataError::unavailable(format!("{ticker} is failing")));
        }
        Ok(())
    }
}

#[async_trait]
impl FundamentalsSource for FakeSource {
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, MarketDataError> {
        self.check(ticker)?;
        Ok(self
            .profiles
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| self.fallback_profile.clone()))
    }

    async fn quarterly_statements(
        &self,
        ticker: &str,
    ) -> Result<QuarterlyStatements, MarketDataError> {
        self.check(ticker)?;
        Ok(self.statements.clone())
    }

    async fn price_history(
        &self,
        ticker: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        self.check(ticker)?;
        self.history_calls.fetch_add(1, Ordering::Relaxed);
        Ok(match query.span {
            HistorySpan::Between { .. } => self.window_bars.clone(),
            HistorySpan::LastDay => self.last_session_bars.clone(),
        })
    }
}
