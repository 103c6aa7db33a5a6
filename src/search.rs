//! Debounced chassis search
//!
//! Every input change bumps a generation counter and cancels the pending
//! search. A search only fires after the debounce window and only for queries
//! of at least `min_chars`. Responses are tagged with the generation they were
//! issued for; anything older than the latest input is dropped, so a slow
//! response to an old query can never overwrite a newer one.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::{ApiClient, VehicleSummary};
use crate::config::Config;
use crate::error::Result;

/// Backend used by `ChassisSearch`
pub trait VehicleSearch: Send + Sync + 'static {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<VehicleSummary>>> + Send;
}

impl VehicleSearch for ApiClient {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<VehicleSummary>>> + Send {
        self.search_vehicles(query)
    }
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub generation: u64,
    pub query: String,
    pub result: Result<Vec<VehicleSummary>>,
}

pub struct ChassisSearch<S: VehicleSearch> {
    source: Arc<S>,
    debounce: Duration,
    min_chars: usize,
    latest: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<SearchOutcome>,
    rx: mpsc::UnboundedReceiver<SearchOutcome>,
}

impl<S: VehicleSearch> ChassisSearch<S> {
    pub fn new(source: Arc<S>, debounce: Duration, min_chars: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            debounce,
            min_chars,
            latest: Arc::new(AtomicU64::new(0)),
            pending: None,
            tx,
            rx,
        }
    }

    pub fn from_config(source: Arc<S>, config: &Config) -> Self {
        Self::new(
            source,
            Duration::from_millis(config.search_debounce_ms),
            config.search_min_chars,
        )
    }

    pub fn generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Handles an input change. Returns the new generation, or `None` when the
    /// query is too short to search.
    pub fn input(&mut self, text: &str) -> Option<u64> {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel_pending();

        let query = text.trim().to_string();
        if query.chars().count() < self.min_chars {
            tracing::debug!(generation, "query below minimum length, search skipped");
            return None;
        }

        let source = Arc::clone(&self.source);
        let latest = Arc::clone(&self.latest);
        let tx = self.tx.clone();
        let debounce = self.debounce;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if latest.load(Ordering::SeqCst) != generation {
                return;
            }
            tracing::debug!(generation, query = %query, "searching");
            let result = source.search(&query).await;
            // receiver gone means the search box was torn down
            let _ = tx.send(SearchOutcome {
                generation,
                query,
                result,
            });
        }));
        Some(generation)
    }

    /// Next response for the latest query; stale responses are skipped
    pub async fn next_result(&mut self) -> Option<SearchOutcome> {
        while let Some(outcome) = self.rx.recv().await {
            if outcome.generation == self.generation() {
                return Some(outcome);
            }
            tracing::warn!(
                generation = outcome.generation,
                query = %outcome.query,
                "discarding stale search response"
            );
        }
        None
    }

    pub fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<S: VehicleSearch> Drop for ChassisSearch<S> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
