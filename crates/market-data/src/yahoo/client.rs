use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, instrument};

use super::payload::{parse_chart_bars, parse_chart_quote, parse_profile, parse_statements};
use crate::{
    CompanyProfile, FundamentalsSource, HistoryQuery, HistorySpan, MarketDataError, PriceBar,
    QuarterlyStatements, Quote, QuoteSource,
};

const PROFILE_MODULES: &str = "price,summaryDetail,summaryProfile,financialData";
const STATEMENT_MODULES: &str = concat!(
    "incomeStatementHistoryQuarterly,",
    "balanceSheetHistoryQuarterly,",
    "cashflowStatementHistoryQuarterly",
);
const USER_AGENT: &str = "Mozilla/5.0 (compatible; market-dashboard/0.1)";
const CHART_PATH: [&str; 3] = ["v8", "finance", "chart"];
const SUMMARY_PATH: [&str; 3] = ["v10", "finance", "quoteSummary"];

/// HTTP client for the Yahoo Finance chart and quote-summary endpoints.
#[derive(Debug, Clone)]
pub struct YahooClient {
    http: Client,
    base_url: Url,
}

impl YahooClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| MarketDataError::InvalidProviderUrl(base_url.to_string()))?;

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_text(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<String, MarketDataError> {
        let resp = self.http.get(url).query(query).send().await?;
        // 4xx bodies still carry the provider's error description.
        let resp = if resp.status().is_server_error() {
            resp.error_for_status()?
        } else {
            resp
        };
        Ok(resp.text().await?)
    }

    fn chart_url(&self, ticker: &str) -> Result<Url, MarketDataError> {
        self.endpoint(&CHART_PATH, ticker)
    }

    fn summary_url(&self, ticker: &str) -> Result<Url, MarketDataError> {
        self.endpoint(&SUMMARY_PATH, ticker)
    }

    /// Appends `prefix` and the ticker as encoded path segments, so a symbol
    /// can never alter the path or query sent upstream.
    fn endpoint(&self, prefix: &[&str], ticker: &str) -> Result<Url, MarketDataError> {
        if !is_valid_ticker(ticker) {
            return Err(MarketDataError::unavailable(format!(
                "invalid ticker symbol: {ticker}"
            )));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| MarketDataError::InvalidProviderUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(prefix)
            .push(ticker);
        Ok(url)
    }
}

/// Letters, digits and the `.^=-` punctuation Yahoo uses for share classes,
/// indices, currencies and futures. At least one alphanumeric is required.
fn is_valid_ticker(ticker: &str) -> bool {
    ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'))
        && ticker.chars().any(|c| c.is_ascii_alphanumeric())
}

#[async_trait]
impl QuoteSource for YahooClient {
    #[instrument(skip(self), level = "debug")]
    async fn latest_quote(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        let query = [("range", "1d".to_string()), ("interval", "1m".to_string())];
        let body = self.get_text(self.chart_url(ticker)?, &query).await?;
        let quote = parse_chart_quote(&body, ticker)?;

        debug!(price = quote.price, observed_at = %quote.observed_at, "quote fetched");
        Ok(quote)
    }
}

#[async_trait]
impl FundamentalsSource for YahooClient {
    #[instrument(skip(self), level = "debug")]
    async fn company_profile(&self, ticker: &str) -> Result<CompanyProfile, MarketDataError> {
        let query = [("modules", PROFILE_MODULES.to_string())];
        let body = self.get_text(self.summary_url(ticker)?, &query).await?;
        parse_profile(&body, ticker)
    }

    #[instrument(skip(self), level = "debug")]
    async fn quarterly_statements(
        &self,
        ticker: &str,
    ) -> Result<QuarterlyStatements, MarketDataError> {
        let query = [("modules", STATEMENT_MODULES.to_string())];
        let body = self.get_text(self.summary_url(ticker)?, &query).await?;
        parse_statements(&body, ticker)
    }

    #[instrument(skip(self, query), fields(interval = query.interval), level = "debug")]
    async fn price_history(
        &self,
        ticker: &str,
        query: &HistoryQuery,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        let mut params = vec![("interval", query.interval.to_string())];
        match query.span {
            HistorySpan::Between { start, end } => {
                params.push(("period1", start.timestamp().to_string()));
                params.push(("period2", end.timestamp().to_string()));
            }
            HistorySpan::LastDay => params.push(("range", "1d".to_string())),
        }

        let body = self.get_text(self.chart_url(ticker)?, &params).await?;
        let bars = parse_chart_bars(&body, ticker)?;

        debug!(bars = bars.len(), "price history fetched");
        Ok(bars)
    }
}
