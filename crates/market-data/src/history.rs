use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};
use serde::Serialize;

use crate::{
    serde_util::{finite, or_na},
    FundamentalsSource, MarketDataError,
};

pub const NO_RECENT_DATA: &str = "No recent data available. The market might be closed.";
const POINT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    Day,
    Month,
    Year,
    Ytd,
}

impl FromStr for TimeRange {
    type Err = MarketDataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "ytd" => Ok(Self::Ytd),
            _ => Err(MarketDataError::InvalidRange("Invalid time range".to_string())),
        }
    }
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Ytd => "ytd",
        }
    }

    /// Lookback window and sampling interval ending at `now`.
    pub fn query(self, now: DateTime<Utc>) -> HistoryQuery {
        let (start, interval) = match self {
            Self::Day => (now - Duration::days(1), "5m"),
            Self::Month => (now - Duration::days(30), "1d"),
            Self::Year => (now - Duration::days(365), "1d"),
            Self::Ytd => (start_of_year(now), "1d"),
        };

        HistoryQuery {
            span: HistorySpan::Between { start, end: now },
            interval,
        }
    }
}

fn start_of_year(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySpan {
    Between {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// The provider's most recent one-day period, whatever its date.
    LastDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    pub span: HistorySpan,
    pub interval: &'static str,
}

impl HistoryQuery {
    pub fn last_session() -> Self {
        Self {
            span: HistorySpan::LastDay,
            interval: "1d",
        }
    }
}

/// A provider bar, stamped in the exchange's UTC offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBar {
    pub at: DateTime<FixedOffset>,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub price_data: Vec<PricePoint>,
    #[serde(serialize_with = "or_na")]
    pub company_name: Option<String>,
    #[serde(serialize_with = "or_na")]
    pub current_price: Option<f64>,
}

/// Builds the `/stock/{ticker}/price/{range}` payload.
///
/// An empty window falls back to the last one-day period. If that is empty
/// too, the result still succeeds but carries [`NO_RECENT_DATA`] in `error`.
pub async fn price_history(
    source: &dyn FundamentalsSource,
    ticker: &str,
    range: &str,
    now: DateTime<Utc>,
) -> Result<PriceHistory, MarketDataError> {
    let range: TimeRange = range.parse()?;
    let price_data = to_points(&source.price_history(ticker, &range.query(now)).await?);

    if !price_data.is_empty() {
        let profile = source.company_profile(ticker).await?;
        return Ok(PriceHistory {
            error: None,
            price_data,
            company_name: profile.long_name,
            current_price: profile.current_price.and_then(finite),
        });
    }

    tracing::debug!(ticker, range = range.as_str(), "empty price window, using last session");
    let last_session = to_points(
        &source
            .price_history(ticker, &HistoryQuery::last_session())
            .await?,
    );
    let profile = source.company_profile(ticker).await?;

    let history = match last_session.last() {
        Some(point) => PriceHistory {
            error: None,
            price_data: vec![point.clone()],
            company_name: profile.long_name,
            current_price: Some(point.price),
        },
        None => PriceHistory {
            error: Some(NO_RECENT_DATA.to_string()),
            price_data: Vec::new(),
            company_name: profile.long_name,
            current_price: profile.regular_market_price.and_then(finite),
        },
    };
    Ok(history)
}

fn to_points(bars: &[PriceBar]) -> Vec<PricePoint> {
    bars.iter()
        .filter_map(|bar| {
            let price = bar.close.and_then(finite)?;
            Some(PricePoint {
                date: bar.at.format(POINT_DATE_FORMAT).to_string(),
                price,
            })
        })
        .collect()
}
