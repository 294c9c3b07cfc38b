pub mod engine;
pub mod events;
pub mod market_clock;
pub mod price_filter;
pub mod registry;

pub use engine::{normalize_ticker, EngineSettings, StreamingEngine, DEFAULT_POLL_INTERVAL};
pub use events::PriceUpdate;
pub use market_clock::{MarketClock, TradingSession};
pub use price_filter::{
    PriceFilter, PriceFilterConfigError, DEFAULT_MAX_DEVIATION, DEFAULT_WINDOW_LEN,
};
pub use registry::{ConnectionId, SubscriptionId, SubscriptionLease, SubscriptionRegistry};
