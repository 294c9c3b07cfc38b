mod client;
mod payload;

pub use client::YahooClient;
pub use payload::{parse_chart_bars, parse_chart_quote, parse_profile, parse_statements};
