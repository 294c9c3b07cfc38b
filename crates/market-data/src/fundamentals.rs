use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    serde_util::{finite, or_na},
    FundamentalsSource, MarketDataError,
};

const QUARTERS_REPORTED: usize = 4;
const DATE_FORMAT: &str = "%Y-%m-%d";

const TOTAL_REVENUE: &[&str] = &["totalRevenue"];
const GROSS_PROFIT: &[&str] = &["grossProfit"];
const OPERATING_INCOME: &[&str] = &["operatingIncome"];
const NET_INCOME: &[&str] = &["netIncome", "netIncomeApplicableToCommonShares"];
const CASH: &[&str] = &["cash", "cashAndCashEquivalents"];
const OPERATING_CASH_FLOW: &[&str] = &["totalCashFromOperatingActivities", "operatingCashFlow"];
const CAPITAL_EXPENDITURE: &[&str] = &["capitalExpenditures", "capitalExpenditure"];
const CURRENT_ASSETS: &[&str] = &["totalCurrentAssets", "currentAssets"];
const CURRENT_LIABILITIES: &[&str] = &["totalCurrentLiabilities", "currentLiabilities"];
const TOTAL_ASSETS: &[&str] = &["totalAssets"];
const TOTAL_LIABILITIES: &[&str] = &[
    "totalLiabilitiesNetMinorityInterest",
    "totalLiab",
    "totalLiabilities",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub long_name: Option<String>,
    pub current_price: Option<f64>,
    pub regular_market_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub industry: Option<String>,
    pub summary: Option<String>,
}

impl CompanyProfile {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One reporting period of a financial statement, keyed by line item.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub date: NaiveDate,
    pub items: HashMap<String, f64>,
}

impl Statement {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            items: HashMap::new(),
        }
    }

    pub fn with_item(mut self, key: &str, value: f64) -> Self {
        self.items.insert(key.to_string(), value);
        self
    }

    /// First line item present under any of `keys`, else 0.
    fn item(&self, keys: &[&str]) -> f64 {
        keys.iter()
            .find_map(|key| self.items.get(*key).copied())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarterlyStatements {
    pub income: Vec<Statement>,
    pub balance_sheet: Vec<Statement>,
    pub cash_flow: Vec<Statement>,
}

impl QuarterlyStatements {
    pub fn is_incomplete(&self) -> bool {
        self.income.is_empty() || self.balance_sheet.is_empty() || self.cash_flow.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyRow {
    pub date: String,
    pub revenue: Option<f64>,
    pub operating_income: Option<f64>,
    pub net_income: Option<f64>,
    pub cash_balance: Option<f64>,
    pub operating_cash_flow: Option<f64>,
    pub free_cash_flow: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginRow {
    pub date: String,
    pub gross_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub net_income_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheetRow {
    pub date: String,
    pub current_assets: Option<f64>,
    pub current_liabilities: Option<f64>,
    pub long_term_assets: Option<f64>,
    pub long_term_liabilities: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOverview {
    #[serde(serialize_with = "or_na")]
    pub company_name: Option<String>,
    #[serde(serialize_with = "or_na")]
    pub stock_price: Option<f64>,
    #[serde(serialize_with = "or_na")]
    pub pe_ratio: Option<f64>,
    #[serde(serialize_with = "or_na")]
    pub industry: Option<String>,
    #[serde(serialize_with = "or_na")]
    pub description: Option<String>,
    pub quarterly_data: Vec<QuarterlyRow>,
    pub margin_data: Vec<MarginRow>,
    pub balance_sheet_data: Vec<BalanceSheetRow>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartSeries {
    pub quarterly: Vec<QuarterlyRow>,
    pub margins: Vec<MarginRow>,
    pub balance_sheet: Vec<BalanceSheetRow>,
}

/// Builds the `/stock/{ticker}` payload: profile fields plus the three
/// chart series for the most recent quarters.
pub async fn stock_overview(
    source: &dyn FundamentalsSource,
    ticker: &str,
) -> Result<StockOverview, MarketDataError> {
    let profile = source.company_profile(ticker).await?;
    if profile.is_empty() {
        return Err(MarketDataError::unavailable(format!(
            "No information found for ticker {ticker}"
        )));
    }

    let statements = source.quarterly_statements(ticker).await?;
    if statements.is_incomplete() {
        return Err(MarketDataError::unavailable(format!(
            "Incomplete financial data for ticker {ticker}"
        )));
    }

    let series = organize_quarters(&statements);

    Ok(StockOverview {
        company_name: profile.long_name,
        stock_price: profile.current_price.and_then(finite),
        pe_ratio: profile.trailing_pe.and_then(finite),
        industry: profile.industry,
        description: profile.summary,
        quarterly_data: series.quarterly,
        margin_data: series.margins,
        balance_sheet_data: series.balance_sheet,
    })
}

/// Reshapes raw statements into date-descending chart rows.
///
/// Income-statement periods drive the output; balance sheet and cash flow
/// periods are matched by date and contribute zeros when absent.
pub fn organize_quarters(statements: &QuarterlyStatements) -> ChartSeries {
    let mut income: Vec<&Statement> = statements.income.iter().collect();
    income.sort_by(|a, b| b.date.cmp(&a.date));

    let mut series = ChartSeries::default();
    for financials in income.into_iter().take(QUARTERS_REPORTED) {
        let empty = Statement::new(financials.date);
        let balance = find_period(&statements.balance_sheet, financials.date).unwrap_or(&empty);
        let cash_flow = find_period(&statements.cash_flow, financials.date).unwrap_or(&empty);
        let date = financials.date.format(DATE_FORMAT).to_string();

        let revenue = financials.item(TOTAL_REVENUE);
        let gross_profit = financials.item(GROSS_PROFIT);
        let operating_income = financials.item(OPERATING_INCOME);
        let net_income = financials.item(NET_INCOME);
        let operating_cash_flow = cash_flow.item(OPERATING_CASH_FLOW);
        let capital_expenditure = cash_flow.item(CAPITAL_EXPENDITURE);
        let free_cash_flow = if operating_cash_flow.is_nan() || capital_expenditure.is_nan() {
            None
        } else {
            finite(operating_cash_flow + capital_expenditure)
        };

        series.quarterly.push(QuarterlyRow {
            date: date.clone(),
            revenue: finite(revenue),
            operating_income: finite(operating_income),
            net_income: finite(net_income),
            cash_balance: finite(balance.item(CASH)),
            operating_cash_flow: finite(operating_cash_flow),
            free_cash_flow,
        });

        series.margins.push(MarginRow {
            date: date.clone(),
            gross_margin: margin_pct(gross_profit, revenue),
            operating_margin: margin_pct(operating_income, revenue),
            net_income_margin: margin_pct(net_income, revenue),
        });

        let current_assets = balance.item(CURRENT_ASSETS);
        let current_liabilities = balance.item(CURRENT_LIABILITIES);
        series.balance_sheet.push(BalanceSheetRow {
            date,
            current_assets: finite(current_assets),
            current_liabilities: finite(current_liabilities),
            long_term_assets: finite(balance.item(TOTAL_ASSETS) - current_assets),
            long_term_liabilities: finite(balance.item(TOTAL_LIABILITIES) - current_liabilities),
        });
    }

    series
}

fn find_period(statements: &[Statement], date: NaiveDate) -> Option<&Statement> {
    statements.iter().find(|statement| statement.date == date)
}

fn margin_pct(value: f64, revenue: f64) -> Option<f64> {
    if revenue == 0.0 {
        return None;
    }
    finite(value / revenue * 100.0)
}
