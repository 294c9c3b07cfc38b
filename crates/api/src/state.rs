use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use market_data::FundamentalsSource;
use streaming::{ConnectionId, StreamingEngine};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectError {
    ConnectionIdOverflow,
}

#[derive(Clone)]
pub struct AppState {
    next_connection_id: Arc<AtomicU64>,
    engine: StreamingEngine,
    fundamentals: Arc<dyn FundamentalsSource>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("next_connection_id", &self.next_connection_id)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(engine: StreamingEngine, fundamentals: Arc<dyn FundamentalsSource>) -> Self {
        Self {
            next_connection_id: Arc::new(AtomicU64::new(0)),
            engine,
            fundamentals,
        }
    }

    /// Allocates the id for a freshly upgraded socket. No subscription exists
    /// until the client sends `start_stream`.
    pub fn connect(&self) -> Result<ConnectionId, ConnectError> {
        let previous = self
            .next_connection_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_add(1)
            })
            .map_err(|_| ConnectError::ConnectionIdOverflow)?;

        Ok(ConnectionId(previous + 1))
    }

    pub fn engine(&self) -> &StreamingEngine {
        &self.engine
    }

    pub fn fundamentals(&self) -> &dyn FundamentalsSource {
        self.fundamentals.as_ref()
    }
}
