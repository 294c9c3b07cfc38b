use std::{fmt, sync::Arc, time::Duration};

use chrono::{Local, Utc};
use market_data::QuoteSource;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    events::PriceUpdate,
    market_clock::TradingSession,
    price_filter::{PriceFilter, PriceFilterConfigError, DEFAULT_MAX_DEVIATION, DEFAULT_WINDOW_LEN},
    registry::{ConnectionId, SubscriptionId, SubscriptionLease, SubscriptionRegistry},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const UPDATES_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub poll_interval: Duration,
    pub window_len: usize,
    pub max_deviation: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            window_len: DEFAULT_WINDOW_LEN,
            max_deviation: DEFAULT_MAX_DEVIATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
    MarketClosed,
    FetchFailed,
    Rejected,
    Emitted,
    Superseded,
}

/// Runs one polling task per active subscription and fans accepted ticks out
/// on a single broadcast channel.
///
/// Every connected viewer receives every `price_update`, whichever ticker it
/// asked for.
#[derive(Clone)]
pub struct StreamingEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: SubscriptionRegistry,
    quotes: Arc<dyn QuoteSource>,
    session: Arc<dyn TradingSession>,
    updates_tx: broadcast::Sender<PriceUpdate>,
    filter: PriceFilter,
    poll_interval: Duration,
}

impl fmt::Debug for StreamingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingEngine")
            .field("active_subscriptions", &self.inner.registry.active_count())
            .field("poll_interval", &self.inner.poll_interval)
            .finish_non_exhaustive()
    }
}

impl StreamingEngine {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        session: Arc<dyn TradingSession>,
        settings: EngineSettings,
    ) -> Result<Self, PriceFilterConfigError> {
        let filter = PriceFilter::new(settings.window_len, settings.max_deviation)?;
        let (updates_tx, _) = broadcast::channel(UPDATES_CAPACITY);

        Ok(Self {
            inner: Arc::new(EngineInner {
                registry: SubscriptionRegistry::new(),
                quotes,
                session,
                updates_tx,
                filter,
                poll_interval: settings.poll_interval,
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PriceUpdate> {
        self.inner.updates_tx.subscribe()
    }

    /// Replaces the connection's subscription with a fresh polling task.
    ///
    /// Returns `None` and leaves any existing subscription untouched when the
    /// ticker is blank.
    pub fn start_stream(
        &self,
        connection_id: ConnectionId,
        ticker: &str,
    ) -> Option<SubscriptionId> {
        let ticker = normalize_ticker(ticker)?;
        let inner = Arc::clone(&self.inner);

        let id = self
            .inner
            .registry
            .start_stream(connection_id, &ticker, move |lease| {
                tokio::spawn(run_subscription(inner, lease))
            });

        info!(%connection_id, ticker = %ticker, "stream started");
        Some(id)
    }

    pub fn stop_stream(&self, connection_id: ConnectionId) -> bool {
        let stopped = self.inner.registry.stop_stream(connection_id);
        if stopped {
            info!(%connection_id, "stream stopped");
        }
        stopped
    }

    pub fn disconnect(&self, connection_id: ConnectionId) {
        self.stop_stream(connection_id);
        debug!(%connection_id, "connection closed");
    }

    pub fn is_active(&self, connection_id: ConnectionId, ticker: &str) -> bool {
        self.inner.registry.is_active(connection_id, ticker)
    }

    pub fn ticker_for(&self, connection_id: ConnectionId) -> Option<String> {
        self.inner.registry.ticker_for(connection_id)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.registry.active_count()
    }

    /// Cancels every polling task. Called once on server shutdown.
    pub fn shutdown(&self) -> usize {
        let stopped = self.inner.registry.stop_all();
        info!(stopped, "streaming engine shut down");
        stopped
    }
}

/// Trims and upper-cases a client-supplied symbol; blank input yields `None`.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_uppercase())
}

async fn run_subscription(inner: Arc<EngineInner>, lease: SubscriptionLease) {
    let mut filter = inner.filter.clone();
    info!(
        connection_id = %lease.connection_id,
        ticker = %lease.ticker,
        "polling task started"
    );

    loop {
        if lease.cancel.is_cancelled()
            || !inner
                .registry
                .is_active(lease.connection_id, &lease.ticker)
        {
            break;
        }

        let outcome = tokio::select! {
            biased;
            _ = lease.cancel.cancelled() => PollOutcome::Superseded,
            outcome = poll_once(&inner, &lease, &mut filter) => outcome,
        };
        if outcome == PollOutcome::Superseded {
            break;
        }

        tokio::select! {
            biased;
            _ = lease.cancel.cancelled() => break,
            _ = tokio::time::sleep(inner.poll_interval) => {}
        }
    }

    info!(
        connection_id = %lease.connection_id,
        ticker = %lease.ticker,
        "polling task stopped"
    );
}

async fn poll_once(
    inner: &EngineInner,
    lease: &SubscriptionLease,
    filter: &mut PriceFilter,
) -> PollOutcome {
    let connection_id = lease.connection_id;
    let ticker = lease.ticker.as_str();

    if !inner.session.is_open(Utc::now()) {
        debug!(%connection_id, ticker, "market closed, skipping poll");
        return PollOutcome::MarketClosed;
    }

    let quote = match inner.quotes.latest_quote(ticker).await {
        Ok(quote) => quote,
        Err(err) => {
            warn!(%connection_id, ticker, error = %err, "quote fetch failed");
            return PollOutcome::FetchFailed;
        }
    };

    if !filter.validate(quote.price, ticker) {
        info!(
            %connection_id,
            ticker,
            price = quote.price,
            average = ?filter.average(),
            "outlier rejected"
        );
        return PollOutcome::Rejected;
    }

    let update = PriceUpdate::new(quote.price, Local::now());
    match inner
        .registry
        .emit_if_current(lease, || inner.updates_tx.send(update))
    {
        Some(Ok(receivers)) => {
            debug!(%connection_id, ticker, price = quote.price, receivers, "price update emitted");
            PollOutcome::Emitted
        }
        Some(Err(_)) => {
            debug!(%connection_id, ticker, price = quote.price, "price update had no receivers");
            PollOutcome::Emitted
        }
        None => PollOutcome::Superseded,
    }
}
