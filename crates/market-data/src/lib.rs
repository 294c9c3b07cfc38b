pub mod error;
pub mod fundamentals;
pub mod history;
pub mod movers;
pub mod quote;
pub mod source;
pub mod yahoo;

mod serde_util;

#[cfg(test)]
pub(crate) mod testing;

pub use error::MarketDataError;
pub use fundamentals::{
    stock_overview, CompanyProfile, QuarterlyStatements, Statement, StockOverview,
};
pub use history::{
    price_history, HistoryQuery, HistorySpan, PriceBar, PriceHistory, PricePoint, TimeRange,
};
pub use movers::{top_movers, Mover, TOP_MOVER_TICKERS};
pub use quote::Quote;
pub use source::{FundamentalsSource, QuoteSource};
pub use yahoo::YahooClient;
