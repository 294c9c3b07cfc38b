use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{CompanyProfile, MarketDataError, PriceBar, QuarterlyStatements, Quote, Statement};

#[derive(Debug, Deserialize)]
struct ProviderFault {
    code: Option<String>,
    description: Option<String>,
}

impl ProviderFault {
    fn into_error(self, ticker: &str) -> MarketDataError {
        let detail = self
            .description
            .or(self.code)
            .unwrap_or_else(|| "unknown provider error".to_string());
        MarketDataError::unavailable(format!("{ticker}: {detail}"))
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ProviderFault>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<CloseSeries>,
}

#[derive(Debug, Deserialize)]
struct CloseSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryBody,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    result: Option<Vec<Value>>,
    error: Option<ProviderFault>,
}

fn chart_result(raw: &str, ticker: &str) -> Result<Option<ChartResult>, MarketDataError> {
    let envelope: ChartEnvelope = serde_json::from_str(raw)?;
    if let Some(fault) = envelope.chart.error {
        return Err(fault.into_error(ticker));
    }
    Ok(envelope.chart.result.and_then(|results| results.into_iter().next()))
}

/// Extracts the live price from a chart response.
///
/// A missing, non-finite, or non-positive price is `DataUnavailable`.
pub fn parse_chart_quote(raw: &str, ticker: &str) -> Result<Quote, MarketDataError> {
    let result = chart_result(raw, ticker)?
        .ok_or_else(|| MarketDataError::unavailable(format!("no quote returned for {ticker}")))?;

    let price = result
        .meta
        .regular_market_price
        .filter(|px| px.is_finite() && *px > 0.0)
        .ok_or_else(|| MarketDataError::unavailable(format!("no current price for {ticker}")))?;

    let observed_at = result
        .meta
        .regular_market_time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now);

    Ok(Quote::new(price, observed_at))
}

pub fn parse_chart_bars(raw: &str, ticker: &str) -> Result<Vec<PriceBar>, MarketDataError> {
    let Some(result) = chart_result(raw, ticker)? else {
        return Ok(Vec::new());
    };

    let offset = FixedOffset::east_opt(result.meta.gmtoffset).unwrap_or_else(|| Utc.fix());
    let closes = result
        .indicators
        .and_then(|indicators| indicators.quote.into_iter().next())
        .map(|series| series.close)
        .unwrap_or_default();

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(idx, secs)| {
            let at = DateTime::from_timestamp(*secs, 0)?.with_timezone(&offset);
            Some(PriceBar {
                at,
                close: closes.get(idx).copied().flatten(),
            })
        })
        .collect();

    Ok(bars)
}

fn summary_result(raw: &str, ticker: &str) -> Result<Option<Value>, MarketDataError> {
    let envelope: SummaryEnvelope = serde_json::from_str(raw)?;
    if let Some(fault) = envelope.quote_summary.error {
        return Err(fault.into_error(ticker));
    }
    Ok(envelope
        .quote_summary
        .result
        .and_then(|results| results.into_iter().next()))
}

/// An empty result yields an empty profile rather than an error; callers
/// decide whether that is fatal.
pub fn parse_profile(raw: &str, ticker: &str) -> Result<CompanyProfile, MarketDataError> {
    let Some(modules) = summary_result(raw, ticker)? else {
        return Ok(CompanyProfile::default());
    };

    Ok(CompanyProfile {
        long_name: text(&modules, "price", "longName"),
        current_price: number(&modules, "financialData", "currentPrice"),
        regular_market_price: number(&modules, "price", "regularMarketPrice"),
        previous_close: number(&modules, "summaryDetail", "previousClose"),
        trailing_pe: number(&modules, "summaryDetail", "trailingPE"),
        industry: text(&modules, "summaryProfile", "industry"),
        summary: text(&modules, "summaryProfile", "longBusinessSummary"),
    })
}

pub fn parse_statements(raw: &str, ticker: &str) -> Result<QuarterlyStatements, MarketDataError> {
    let Some(modules) = summary_result(raw, ticker)? else {
        return Ok(QuarterlyStatements::default());
    };

    Ok(QuarterlyStatements {
        income: statements(
            &modules,
            "incomeStatementHistoryQuarterly",
            "incomeStatementHistory",
        ),
        balance_sheet: statements(
            &modules,
            "balanceSheetHistoryQuarterly",
            "balanceSheetStatements",
        ),
        cash_flow: statements(
            &modules,
            "cashflowStatementHistoryQuarterly",
            "cashflowStatements",
        ),
    })
}

fn statements(modules: &Value, module: &str, list: &str) -> Vec<Statement> {
    modules
        .get(module)
        .and_then(|module| module.get(list))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(statement).collect())
        .unwrap_or_default()
}

fn statement(entry: &Value) -> Option<Statement> {
    let entry = entry.as_object()?;
    let end_secs = entry.get("endDate").and_then(raw_number)? as i64;
    let date: NaiveDate = DateTime::from_timestamp(end_secs, 0)?.date_naive();

    let items = entry
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "endDate" | "maxAge"))
        .filter_map(|(key, value)| Some((key.clone(), raw_number(value)?)))
        .collect();

    Some(Statement { date, items })
}

/// Provider numbers arrive either bare or as `{"raw": .., "fmt": ..}`.
fn raw_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Object(object) => object.get("raw").and_then(Value::as_f64),
        _ => None,
    }
}

fn number(modules: &Value, module: &str, field: &str) -> Option<f64> {
    modules.get(module)?.get(field).and_then(raw_number)
}

fn text(modules: &Value, module: &str, field: &str) -> Option<String> {
    modules
        .get(module)?
        .get(field)?
        .as_str()
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}
