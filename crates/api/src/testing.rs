use std::sync::Arc;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use market_data::{
    CompanyProfile, FundamentalsSource, HistoryQuery, HistorySpan, MarketDataError, PriceBar,
    QuarterlyStatements, Quote, QuoteSource, Statement,
};
use streaming::{EngineSettings, StreamingEngine, TradingSession};

use crate::state::AppState;

pub(crate) fn test_state() -> AppState {
    state_with(StubFundamentals::default())
}

pub(crate) fn state_with(fundamentals: StubFundamentals) -> AppState {
    let engine = StreamingEngine::new(
        Arc::new(UnreachableQuotes),
        Arc::new(ClosedMarket),
        EngineSettings::default(),
    )
    .unwrap();
    AppState::new(engine, Arc::new(fundamentals))
}

/// Serves one canned company for any ticker except `"MISSING"`.
#[derive(Debug, Default)]
pub(crate) struct StubFundamentals {
    pub window_bars: Vec<PriceBar>,
}

impl StubFundamentals {
    pub fn with_window_bars(closes: &[f64]) -> Self {
        let offset = FixedOffset::west_opt(4 * 3600).unwrap();
        let window_bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| PriceBar {
                at: offset
                    .with_ymd_and_hms(2024, 6, 3 + i as u32, 16, 0, 0)
                    .unwrap(),
                close: Some(*close),
            })
            .collect();
        Self { window_bars }
    }
}

#[async_trait]
impl FundamentalsSource for StubFundamentals {
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, MarketDataError> {
        if ticker == "MISSING" {
            return Ok(CompanyProfile::default());
        }
        Ok(CompanyProfile {
            long_name: Some(format!("{ticker} Corp")),
            current_price: Some(110.0),
            regular_market_price: Some(109.5),
            previous_close: Some(100.0),
            trailing_pe: Some(f64::NAN),
            industry: None,
            summary: Some("Makes things.".to_string()),
        })
    }

    async fn quarterly_statements(
        &self,
        _ticker: &str,
    ) -> Result<QuarterlyStatements, MarketDataError> {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        Ok(QuarterlyStatements {
            income: vec![Statement::new(date)
                .with_item("totalRevenue", 1000.0)
                .with_item("grossProfit", 400.0)
                .with_item("operatingIncome", 200.0)
                .with_item("netIncome", 100.0)],
            balance_sheet: vec![Statement::new(date)
                .with_item("cash", 50.0)
                .with_item("totalCurrentAssets", 300.0)
                .with_item("totalAssets", 900.0)
                .with_item("totalCurrentLiabilities", 150.0)
                .with_item("totalLiab", 600.0)],
            cash_flow: vec![Statement::new(date)
                .with_item("totalCashFromOperatingActivities", 180.0)
                .with_item("capitalExpenditures", -30.0)],
        })
    }

    async fn price_history(
        &self,
        _ticker: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        match query.span {
            HistorySpan::Between { .. } => Ok(self.window_bars.clone()),
            HistorySpan::LastDay => Ok(Vec::new()),
        }
    }
}

struct UnreachableQuotes;

#[async_trait]
impl QuoteSource for UnreachableQuotes {
    async fn latest_quote(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        Err(MarketDataError::unavailable(format!("no quotes in tests for {ticker}")))
    }
}

struct ClosedMarket;

impl TradingSession for ClosedMarket {
    fn is_open(&self, _at: chrono::DateTime<chrono::Utc>) -> bool {
        false
    }
}
