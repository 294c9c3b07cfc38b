use std::{
    collections::HashMap,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Distinguishes successive subscriptions of the same connection, including
/// a restart on the same ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What a polling task is handed when it is spawned.
#[derive(Debug, Clone)]
pub struct SubscriptionLease {
    pub connection_id: ConnectionId,
    pub subscription_id: SubscriptionId,
    pub ticker: String,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
struct Subscription {
    id: SubscriptionId,
    ticker: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Cancels the lease and aborts the task, so a task parked outside a
    /// cancellation-aware await is still torn down.
    fn retire(self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

/// Which connection streams which ticker, through which task.
///
/// Every mutation and every emission check takes the same lock, so once
/// [`start_stream`](Self::start_stream) or [`stop_stream`](Self::stop_stream)
/// returns, a superseded task can no longer pass
/// [`emit_if_current`](Self::emit_if_current).
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<ConnectionId, Subscription>>,
    next_subscription_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any subscription of `connection_id` with one on `ticker`.
    ///
    /// The previous task is cancelled before `spawn` runs, and `spawn` runs
    /// under the registry lock.
    pub fn start_stream<F>(
        &self,
        connection_id: ConnectionId,
        ticker: &str,
        spawn: F,
    ) -> SubscriptionId
    where
        F: FnOnce(SubscriptionLease) -> JoinHandle<()>,
    {
        let id = SubscriptionId(self.next_subscription_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let lease = SubscriptionLease {
            connection_id,
            subscription_id: id,
            ticker: ticker.to_string(),
            cancel: cancel.clone(),
        };

        let mut entries = self.entries.lock();
        if let Some(previous) = entries.remove(&connection_id) {
            previous.retire();
        }

        let task = spawn(lease);
        entries.insert(
            connection_id,
            Subscription {
                id,
                ticker: ticker.to_string(),
                cancel,
                task,
            },
        );
        id
    }

    /// Cancels and removes the subscription, returning whether one existed.
    pub fn stop_stream(&self, connection_id: ConnectionId) -> bool {
        match self.entries.lock().remove(&connection_id) {
            Some(previous) => {
                previous.retire();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, connection_id: ConnectionId, ticker: &str) -> bool {
        self.entries
            .lock()
            .get(&connection_id)
            .is_some_and(|entry| entry.ticker == ticker)
    }

    pub fn is_current(&self, lease: &SubscriptionLease) -> bool {
        self.entries
            .lock()
            .get(&lease.connection_id)
            .is_some_and(|entry| entry.id == lease.subscription_id)
    }

    /// Runs `emit` only while `lease` is still the connection's subscription.
    ///
    /// `emit` runs under the registry lock and must not block.
    pub fn emit_if_current<T>(
        &self,
        lease: &SubscriptionLease,
        emit: impl FnOnce() -> T,
    ) -> Option<T> {
        let entries = self.entries.lock();
        let current = entries
            .get(&lease.connection_id)
            .is_some_and(|entry| entry.id == lease.subscription_id);
        current.then(emit)
    }

    pub fn ticker_for(&self, connection_id: ConnectionId) -> Option<String> {
        self.entries
            .lock()
            .get(&connection_id)
            .map(|entry| entry.ticker.clone())
    }

    pub fn active_count(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn stop_all(&self) -> usize {
        let drained: Vec<Subscription> = self
            .entries
            .lock()
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        let stopped = drained.len();
        for entry in drained {
            entry.retire();
        }
        stopped
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use tokio::sync::oneshot;

    use super::*;

    fn idle_task(
        leases: &Arc<StdMutex<Vec<SubscriptionLease>>>,
    ) -> impl FnOnce(SubscriptionLease) -> JoinHandle<()> {
        let leases = Arc::clone(leases);
        move |lease| {
            leases.lock().unwrap().push(lease);
            tokio::spawn(async {})
        }
    }

    #[tokio::test]
    async fn start_stream_records_ticker() {
        let registry = SubscriptionRegistry::new();
        let leases = Arc::default();

        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));

        assert!(registry.is_active(ConnectionId(1), "AAPL"));
        assert!(!registry.is_active(ConnectionId(1), "MSFT"));
        assert!(!registry.is_active(ConnectionId(2), "AAPL"));
        assert_eq!(registry.ticker_for(ConnectionId(1)).as_deref(), Some("AAPL"));
    }

    #[tokio::test]
    async fn restarting_same_ticker_cancels_previous_lease() {
        let registry = SubscriptionRegistry::new();
        let leases: Arc<StdMutex<Vec<SubscriptionLease>>> = Arc::default();

        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));
        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));

        let leases = leases.lock().unwrap();
        assert_eq!(registry.active_count(), 1);
        assert!(leases[0].cancel.is_cancelled());
        assert!(!leases[1].cancel.is_cancelled());
        assert!(!registry.is_current(&leases[0]));
        assert!(registry.is_current(&leases[1]));
    }

    #[tokio::test]
    async fn superseded_lease_cannot_emit() {
        let registry = SubscriptionRegistry::new();
        let leases: Arc<StdMutex<Vec<SubscriptionLease>>> = Arc::default();

        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));
        registry.start_stream(ConnectionId(1), "MSFT", idle_task(&leases));

        let leases = leases.lock().unwrap();
        assert_eq!(registry.emit_if_current(&leases[0], || "stale"), None);
        assert_eq!(registry.emit_if_current(&leases[1], || "fresh"), Some("fresh"));
    }

    #[tokio::test]
    async fn stop_stream_cancels_and_removes() {
        let registry = SubscriptionRegistry::new();
        let leases: Arc<StdMutex<Vec<SubscriptionLease>>> = Arc::default();
        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));

        assert!(registry.stop_stream(ConnectionId(1)));

        assert_eq!(registry.active_count(), 0);
        assert!(leases.lock().unwrap()[0].cancel.is_cancelled());
    }

    fn parked_task(
        dropped: oneshot::Sender<()>,
    ) -> impl FnOnce(SubscriptionLease) -> JoinHandle<()> {
        move |_lease| {
            tokio::spawn(async move {
                let _held = dropped;
                std::future::pending::<()>().await;
            })
        }
    }

    #[tokio::test]
    async fn stop_stream_aborts_task_that_ignores_cancellation() {
        let registry = SubscriptionRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.start_stream(ConnectionId(1), "AAPL", parked_task(tx));

        assert!(registry.stop_stream(ConnectionId(1)));

        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn restart_aborts_previous_task() {
        let registry = SubscriptionRegistry::new();
        let leases: Arc<StdMutex<Vec<SubscriptionLease>>> = Arc::default();
        let (tx, rx) = oneshot::channel();
        registry.start_stream(ConnectionId(1), "AAPL", parked_task(tx));

        registry.start_stream(ConnectionId(1), "MSFT", idle_task(&leases));

        assert!(rx.await.is_err());
        assert!(registry.is_active(ConnectionId(1), "MSFT"));
    }

    #[test]
    fn stop_stream_without_subscription_is_a_no_op() {
        let registry = SubscriptionRegistry::new();

        assert!(!registry.stop_stream(ConnectionId(42)));
        assert!(!registry.stop_stream(ConnectionId(42)));
    }

    #[tokio::test]
    async fn connections_are_independent() {
        let registry = SubscriptionRegistry::new();
        let leases: Arc<StdMutex<Vec<SubscriptionLease>>> = Arc::default();

        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));
        registry.start_stream(ConnectionId(2), "AAPL", idle_task(&leases));
        registry.stop_stream(ConnectionId(1));

        assert!(registry.is_active(ConnectionId(2), "AAPL"));
        assert!(!leases.lock().unwrap()[1].cancel.is_cancelled());
    }

    #[tokio::test]
    async fn stop_all_cancels_every_subscription() {
        let registry = SubscriptionRegistry::new();
        let leases: Arc<StdMutex<Vec<SubscriptionLease>>> = Arc::default();
        registry.start_stream(ConnectionId(1), "AAPL", idle_task(&leases));
        registry.start_stream(ConnectionId(2), "MSFT", idle_task(&leases));

        assert_eq!(registry.stop_all(), 2);

        assert_eq!(registry.active_count(), 0);
        assert!(leases.lock().unwrap().iter().all(|lease| lease.cancel.is_cancelled()));
    }
}
