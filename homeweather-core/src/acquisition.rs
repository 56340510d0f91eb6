//! Load/refresh state machine for weather of the home location.
//!
//! ```text
//! Idle ──load──▶ Loading ──ok──▶ Success ──refresh──▶ Refreshing ──ok──▶ Success
//!                   │                                     │
//!                   └──err──▶ Failed(prev=None)           └──err──▶ Failed(prev)
//! Failed ──load──▶ Loading        Failed(prev) ──refresh──▶ Refreshing(prev)
//! ```

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::FetchError,
    mapper::{self, SnapshotLabel},
    model::{Coordinates, HomeLocation, WeatherSnapshot},
    provider::{FetchOptions, WeatherFetcher},
};

pub const INVALID_COORDINATES: &str = "invalid coordinates";

#[derive(Debug, Clone, Default, PartialEq)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Loading,
    Refreshing {
        previous: Arc<WeatherSnapshot>,
    },
    Success {
        data: Arc<WeatherSnapshot>,
    },
    Failed {
        message: String,
        previous: Option<Arc<WeatherSnapshot>>,
    },
}

impl AcquisitionState {
    /// Snapshot that should stay on screen in this state.
    pub fn displayed_data(&self) -> Option<&Arc<WeatherSnapshot>> {
        match self {
            AcquisitionState::Idle | AcquisitionState::Loading => None,
            AcquisitionState::Refreshing { previous } => Some(previous),
            AcquisitionState::Success { data } => Some(data),
            AcquisitionState::Failed { previous, .. } => previous.as_ref(),
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Loading | AcquisitionState::Refreshing { .. }
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AcquisitionState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AcquisitionState::Idle => "idle",
            AcquisitionState::Loading => "loading",
            AcquisitionState::Refreshing { .. } => "refreshing",
            AcquisitionState::Success { .. } => "success",
            AcquisitionState::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Load,
    Refresh,
}

impl Operation {
    fn failure_message(self, err: &FetchError) -> String {
        match self {
            Operation::Load => format!("failed to load weather: {}", err.summary()),
            Operation::Refresh => format!("failed to refresh weather: {}", err.summary()),
        }
    }
}

/// Settings applied to every fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub fetch: FetchOptions,
    /// Country label attached to snapshots.
    pub country: String,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            country: "CZ".to_string(),
        }
    }
}

/// Sole owner of [`AcquisitionState`].
///
/// `load` always takes over: results of any older load or refresh are
/// discarded. `refresh` is ignored while a fetch is already running.
#[derive(Debug)]
pub struct AcquisitionStateMachine {
    fetcher: Arc<dyn WeatherFetcher>,
    settings: AcquisitionSettings,
    state: watch::Sender<AcquisitionState>,
    generation: AtomicU64,
    /// Kept after a failed load so that `retry` has something to retry.
    last_location: Mutex<Option<HomeLocation>>,
}

impl AcquisitionStateMachine {
    pub fn new(fetcher: Arc<dyn WeatherFetcher>, settings: AcquisitionSettings) -> Self {
        let (state, _) = watch::channel(AcquisitionState::Idle);
        Self {
            fetcher,
            settings,
            state,
            generation: AtomicU64::new(0),
            last_location: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AcquisitionState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> AcquisitionState {
        self.state.borrow().clone()
    }

    pub fn last_location(&self) -> Option<HomeLocation> {
        self.lock_location().clone()
    }

    /// Fetch weather for `home`.
    ///
    /// Data already on screen for the same location survives a failed load;
    /// a first load or a load for a different location starts blank.
    pub async fn load(&self, home: &HomeLocation) {
        let previous = self.retained_snapshot(home);
        self.remember(home);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let coordinates = match home.coordinates() {
            Ok(c) => c,
            Err(e) => {
                warn!(name = %home.name, error = %e, "refusing to load invalid coordinates");
                self.transition(generation, |_| AcquisitionState::Failed {
                    message: INVALID_COORDINATES.to_string(),
                    previous,
                });
                return;
            }
        };

        self.transition(generation, |_| AcquisitionState::Loading);
        self.fetch_and_settle(generation, home, coordinates, Operation::Load, previous)
            .await;
    }

    /// Fetch fresh weather while keeping the current snapshot visible.
    ///
    /// No-op while a load or refresh is running. Without any snapshot to
    /// keep, this is a plain [`load`](Self::load).
    pub async fn refresh(&self, home: &HomeLocation) {
        let coordinates = match home.coordinates() {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(name = %home.name, error = %e, "refusing to refresh invalid coordinates");
                None
            }
        };

        // Deciding between refresh, load and no-op happens under the state
        // lock, so concurrent callers cannot both start a fetch.
        let mut started = None;
        self.state.send_if_modified(|state| {
            let (operation, previous) = match state {
                AcquisitionState::Success { data }
                | AcquisitionState::Failed {
                    previous: Some(data),
                    ..
                } => (Operation::Refresh, Some(data.clone())),
                AcquisitionState::Idle | AcquisitionState::Failed { previous: None, .. } => {
                    (Operation::Load, None)
                }
                AcquisitionState::Loading | AcquisitionState::Refreshing { .. } => return false,
            };

            let generation = match operation {
                Operation::Load => self.generation.fetch_add(1, Ordering::SeqCst) + 1,
                Operation::Refresh => self.generation.load(Ordering::SeqCst),
            };
            *state = match (coordinates, &previous) {
                (Some(_), Some(snapshot)) => AcquisitionState::Refreshing {
                    previous: snapshot.clone(),
                },
                (Some(_), None) => AcquisitionState::Loading,
                (None, snapshot) => AcquisitionState::Failed {
                    message: INVALID_COORDINATES.to_string(),
                    previous: snapshot.clone(),
                },
            };
            debug!(state = state.name(), generation, "state transition");
            started = Some((operation, generation, previous));
            true
        });

        let Some((operation, generation, previous)) = started else {
            debug!("refresh ignored, a fetch is already running");
            return;
        };
        self.remember(home);
        let Some(coordinates) = coordinates else {
            return;
        };

        self.fetch_and_settle(generation, home, coordinates, operation, previous)
            .await;
    }

    /// Reload the last location handed to `load` or `refresh`.
    pub async fn retry(&self) {
        match self.last_location() {
            Some(home) => self.load(&home).await,
            None => debug!("retry requested before any load"),
        }
    }

    async fn fetch_and_settle(
        &self,
        generation: u64,
        home: &HomeLocation,
        coordinates: Coordinates,
        operation: Operation,
        previous: Option<Arc<WeatherSnapshot>>,
    ) {
        let outcome = match self.fetcher.fetch(coordinates, &self.settings.fetch).await {
            Ok(payload) => mapper::to_snapshot(
                payload,
                SnapshotLabel {
                    name: &home.name,
                    country: &self.settings.country,
                },
                self.settings.fetch.units,
            ),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(snapshot) => {
                info!(name = %home.name, ?operation, "weather updated");
                let data = Arc::new(snapshot);
                self.transition(generation, |_| AcquisitionState::Success { data });
            }
            Err(e) => {
                warn!(name = %home.name, ?operation, error = %e, "weather fetch failed");
                let message = operation.failure_message(&e);
                self.transition(generation, |_| AcquisitionState::Failed { message, previous });
            }
        }
    }

    /// Replaces the state unless a newer load has started since `generation`.
    fn transition(
        &self,
        generation: u64,
        next: impl FnOnce(&AcquisitionState) -> AcquisitionState,
    ) {
        self.state.send_if_modified(|state| {
            let latest = self.generation.load(Ordering::SeqCst);
            if latest != generation {
                debug!(generation, latest, "dropping stale weather result");
                return false;
            }
            *state = next(state);
            debug!(state = state.name(), generation, "state transition");
            true
        });
    }

    /// Snapshot on screen, provided it belongs to `home`.
    fn retained_snapshot(&self, home: &HomeLocation) -> Option<Arc<WeatherSnapshot>> {
        if self.lock_location().as_ref() != Some(home) {
            return None;
        }
        self.state.borrow().displayed_data().cloned()
    }

    fn remember(&self, home: &HomeLocation) {
        *self.lock_location() = Some(home.clone());
    }

    fn lock_location(&self) -> std::sync::MutexGuard<'_, Option<HomeLocation>> {
        self.last_location
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
