use chrono::{DateTime, TimeZone};
use serde::Serialize;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An accepted tick, broadcast to every connected viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceUpdate {
    pub price: f64,
    pub timestamp: String,
}

impl PriceUpdate {
    pub fn new<Tz>(price: f64, at: DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            price,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}
