use chrono::{DateTime, Utc};

/// One observed price sample. Lives for a single polling iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(price: f64, observed_at: DateTime<Utc>) -> Self {
        Self { price, observed_at }
    }
}
