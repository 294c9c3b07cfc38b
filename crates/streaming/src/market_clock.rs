use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

/// Answers whether ticks should be fetched at a given instant.
pub trait TradingSession: Send + Sync {
    fn is_open(&self, at: DateTime<Utc>) -> bool;
}

/// Regular-session hours of one exchange, evaluated in its local time.
///
/// The session bounds are inclusive on both ends. Exchange holidays are not
/// modelled: a weekday holiday reports open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClock {
    tz: Tz,
    opens_at: NaiveTime,
    closes_at: NaiveTime,
}

impl Default for MarketClock {
    /// US equities regular session expressed in Pacific time.
    fn default() -> Self {
        Self {
            tz: chrono_tz::US::Pacific,
            opens_at: NaiveTime::from_hms_opt(6, 30, 0).expect("06:30:00 is a valid time"),
            closes_at: NaiveTime::from_hms_opt(13, 0, 0).expect("13:00:00 is a valid time"),
        }
    }
}

impl MarketClock {
    pub fn new(tz: Tz, opens_at: NaiveTime, closes_at: NaiveTime) -> Self {
        Self {
            tz,
            opens_at,
            closes_at,
        }
    }

    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.tz);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = local.time();
        self.opens_at <= time && time <= self.closes_at
    }
}

impl TradingSession for MarketClock {
    fn is_open(&self, at: DateTime<Utc>) -> bool {
        MarketClock::is_open(self, at)
    }
}
