use std::{collections::VecDeque, fmt};

pub const DEFAULT_WINDOW_LEN: usize = 10;
pub const DEFAULT_MAX_DEVIATION: f64 = 0.06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFilterConfigError {
    /// `window_len` must be greater than zero.
    InvalidWindowLen,
    /// `max_deviation` must be finite and greater than zero.
    InvalidMaxDeviation,
}

impl fmt::Display for PriceFilterConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidWindowLen => write!(f, "price window length must be greater than zero"),
            Self::InvalidMaxDeviation => {
                write!(f, "max deviation must be a finite fraction greater than zero")
            }
        }
    }
}

impl std::error::Error for PriceFilterConfigError {}

/// Rolling outlier detector over the most recent accepted prices of one
/// ticker.
///
/// Owned by a single polling task; never shared.
#[derive(Debug, Clone)]
pub struct PriceFilter {
    window: VecDeque<f64>,
    current_ticker: Option<String>,
    window_len: usize,
    max_deviation: f64,
}

impl Default for PriceFilter {
    fn default() -> Self {
        Self {
            window: VecDeque::with_capacity(DEFAULT_WINDOW_LEN + 1),
            current_ticker: None,
            window_len: DEFAULT_WINDOW_LEN,
            max_deviation: DEFAULT_MAX_DEVIATION,
        }
    }
}

impl PriceFilter {
    /// Creates a filter with validated parameters.
    ///
    /// - `window_len`: number of accepted prices kept; oldest evicted first.
    /// - `max_deviation`: largest accepted `|price - mean| / mean`, as a
    ///   fraction (`0.06` is 6%).
    pub fn new(window_len: usize, max_deviation: f64) -> Result<Self, PriceFilterConfigError> {
        if window_len == 0 {
            return Err(PriceFilterConfigError::InvalidWindowLen);
        }
        if !max_deviation.is_finite() || max_deviation <= 0.0 {
            return Err(PriceFilterConfigError::InvalidMaxDeviation);
        }

        Ok(Self {
            window: VecDeque::with_capacity(window_len + 1),
            current_ticker: None,
            window_len,
            max_deviation,
        })
    }

    /// Decides whether `new_price` is plausible for `ticker`.
    ///
    /// A ticker change clears the window first. With no history the price is
    /// accepted. Otherwise it is rejected when its relative deviation from the
    /// window mean exceeds the configured threshold; rejected prices never
    /// enter the window.
    ///
    /// A window mean of exactly zero leaves the deviation undefined; such
    /// prices are accepted so the window can recover.
    ///
    /// A non-finite price reaching an empty window is accepted like any other
    /// first price, after which the mean is non-finite and every later price
    /// for that ticker is rejected until the ticker changes. Quote sources
    /// are expected to hand over finite prices only.
    pub fn validate(&mut self, new_price: f64, ticker: &str) -> bool {
        if self.current_ticker.as_deref() != Some(ticker) {
            self.window.clear();
            self.current_ticker = Some(ticker.to_string());
        }

        if let Some(avg) = self.average() {
            if avg != 0.0 {
                let deviation = (new_price - avg).abs() / avg;
                if deviation.is_nan() || deviation > self.max_deviation {
                    return false;
                }
            }
        }

        self.window.push_back(new_price);
        while self.window.len() > self.window_len {
            self.window.pop_front();
        }
        true
    }

    /// Mean of the current window, `None` when empty.
    pub fn average(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    pub fn window(&self) -> &VecDeque<f64> {
        &self.window
    }

    pub fn current_ticker(&self) -> Option<&str> {
        self.current_ticker.as_deref()
    }
}
