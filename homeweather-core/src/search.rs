//! Debounced place-name search.
//!
//! Every query change cancels the previous one. A search only reaches the
//! geocoder after the input has been quiet for the debounce interval, and
//! only the most recently issued search may publish its results.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    geocode::{Address, GeocodeProvider},
    model::PlaceCandidate,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// What the presentation layer observes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<PlaceCandidate>,
    pub is_searching: bool,
    /// Query that `results` answer; `None` until a search completes.
    pub resolved_for: Option<String>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    token: Option<CancellationToken>,
}

#[derive(Debug)]
struct Inner {
    geocoder: Arc<dyn GeocodeProvider>,
    debounce: Duration,
    limit: usize,
    slot: Mutex<Slot>,
    state: watch::Sender<SearchState>,
}

#[derive(Debug, Clone)]
pub struct SearchCoordinator {
    inner: Arc<Inner>,
}

impl SearchCoordinator {
    pub fn new(geocoder: Arc<dyn GeocodeProvider>) -> Self {
        Self::with_settings(geocoder, DEFAULT_DEBOUNCE, DEFAULT_RESULT_LIMIT)
    }

    pub fn with_settings(geocoder: Arc<dyn GeocodeProvider>, debounce: Duration, limit: usize) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            inner: Arc::new(Inner {
                geocoder,
                debounce,
                limit,
                slot: Mutex::new(Slot::default()),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> SearchState {
        self.inner.state.borrow().clone()
    }

    /// Must be called from within a tokio runtime.
    pub fn on_query_changed(&self, text: &str) {
        let query = text.trim().to_string();

        let mut slot = self.inner.lock_slot();
        if let Some(previous) = slot.token.take() {
            previous.cancel();
        }
        slot.generation += 1;
        let generation = slot.generation;

        if query.is_empty() {
            debug!("blank query, clearing results");
            self.inner.state.send_replace(SearchState::default());
            return;
        }

        let token = CancellationToken::new();
        slot.token = Some(token.clone());
        self.inner.state.send_modify(|s| {
            s.query = query.clone();
            s.is_searching = false;
        });
        drop(slot);

        debug!(%query, generation, "search scheduled");
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(query, generation, token).await });
    }

    pub fn clear(&self) {
        self.on_query_changed("");
    }
}

impl Inner {
    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run(self: Arc<Self>, query: String, generation: u64, token: CancellationToken) {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(%query, "search superseded before it started");
                return;
            }
            _ = tokio::time::sleep(self.debounce) => {}
        }

        if !self.publish(generation, |s| s.is_searching = true) {
            return;
        }

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                debug!(%query, "in-flight search cancelled");
                return;
            }
            outcome = self.geocoder.forward_geocode(&query, self.limit) => outcome,
        };

        let results: Vec<PlaceCandidate> = match outcome {
            Ok(addresses) => addresses
                .iter()
                .filter_map(Address::to_candidate)
                .take(self.limit)
                .collect(),
            Err(e) => {
                warn!(%query, error = %e, "place search failed");
                Vec::new()
            }
        };

        let count = results.len();
        let resolved_for = query.clone();
        if self.publish(generation, move |s| {
            s.results = results;
            s.is_searching = false;
            s.resolved_for = Some(resolved_for);
        }) {
            debug!(%query, count, "search results published");
        }
    }

    /// Applies `update` only while `generation` is still the latest issued
    /// search. The slot lock is held while publishing.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut SearchState)) -> bool {
        let slot = self.lock_slot();
        if slot.generation != generation {
            debug!(generation, latest = slot.generation, "dropping stale search update");
            return false;
        }
        self.state.send_modify(update);
        true
    }
}
