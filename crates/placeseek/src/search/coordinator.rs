//! Search coordinator
//!
//! The single owner of "which search is current". Every search started here
//! gets a fresh generation; its background task reports back through a
//! [`Completion`] tagged with that generation, and [`SearchCoordinator::on_completion`]
//! drops anything that is not from the latest generation. Superseded tasks are
//! also aborted, but the generation check alone keeps results in order.

use std::{sync::Arc, time::Duration};

use placeseek_providers::{
    BiasRegion, Coordinate, LocationProvider, PlaceCandidate, Result as ProviderResult,
    SearchProvider,
};
use tokio::{
    sync::{mpsc, watch},
    task::AbortHandle,
    time::{Instant, sleep},
};
use tracing::{Span, debug, field, info, instrument, warn};

use super::rank::rank_by_distance;
use crate::config::EngineConfig;

pub type Generation = u64;

/// Everything a caller can observe about the engine at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchSnapshot {
    /// Text shown in the search box
    pub search_text: String,
    /// True while the search of the current generation is outstanding
    pub is_searching: bool,
    pub results: Vec<PlaceCandidate>,
    /// Generation of the most recently started search, zero before the first one
    pub generation: Generation,
}

/// A trimmed free-text query plus the region it is biased towards.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    text: String,
    bias_region: BiasRegion,
}

impl SearchQuery {
    pub fn new(text: &str, bias_region: BiasRegion) -> Self {
        Self {
            text: text.trim().to_string(),
            bias_region,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bias_region(&self) -> &BiasRegion {
        &self.bias_region
    }

    /// An empty query never reaches the search provider.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Outcome of a background search task, tagged with the generation that started it.
#[derive(Debug)]
pub struct Completion {
    generation: Generation,
    kind: CompletionKind,
}

#[derive(Debug)]
enum CompletionKind {
    Text(ProviderResult<Vec<PlaceCandidate>>),
    Nearby {
        reference: Coordinate,
        outcome: ProviderResult<Vec<PlaceCandidate>>,
    },
    LocationTimedOut,
}

/// What [`SearchCoordinator::on_completion`] did with a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The completion belonged to a superseded generation.
    Discarded,
    /// Free-text results were published.
    TextResults,
    /// Ranked nearby results were published and the search text replaced by the marker.
    NearbyResults,
    /// The provider failed; results were emptied.
    Failed,
    /// No location fix arrived in time; results were left untouched.
    LocationTimedOut,
}

pub struct SearchCoordinator {
    config: Arc<EngineConfig>,
    search: Arc<dyn SearchProvider>,
    location: Arc<dyn LocationProvider>,
    state: watch::Sender<SearchSnapshot>,
    in_flight: Option<AbortHandle>,
    completion_tx: mpsc::UnboundedSender<Completion>,
}

impl SearchCoordinator {
    /// Create a coordinator and the receiver its background tasks report to.
    ///
    /// Every [`Completion`] read from the receiver must be handed back to
    /// [`on_completion`](Self::on_completion) by the owner.
    pub fn new(
        config: Arc<EngineConfig>,
        search: Arc<dyn SearchProvider>,
        location: Arc<dyn LocationProvider>,
    ) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SearchSnapshot::default());
        let coordinator = Self {
            config,
            search,
            location,
            state,
            in_flight: None,
            completion_tx,
        };
        (coordinator, completion_rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.state.subscribe()
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> SearchSnapshot {
        self.state.borrow().clone()
    }

    pub fn generation(&self) -> Generation {
        self.state.borrow().generation
    }

    /// Reflect the visible search text. Does not start a search.
    pub fn set_search_text(&self, text: &str) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.search_text == text {
                false
            } else {
                text.clone_into(&mut snapshot.search_text);
                true
            }
        });
    }

    /// Build a free-text query, biased around the current fix or the default region.
    pub fn text_query(&self, text: &str) -> SearchQuery {
        let region = self
            .location
            .current_region(self.config.default_region, self.config.text_search_radius_m);
        SearchQuery::new(text, region)
    }

    /// Observe a different location provider from now on.
    ///
    /// A nearby search that is already waiting keeps polling the provider it started with.
    pub fn set_location_provider(&mut self, location: Arc<dyn LocationProvider>) {
        self.location = location;
    }

    /// Start a free-text search, superseding whatever is outstanding.
    ///
    /// Must be called inside a tokio runtime.
    #[instrument(name = "Execute search", skip_all, fields(text = query.text(), generation = field::Empty))]
    pub fn execute(&mut self, query: SearchQuery) -> Generation {
        let generation = self.begin();
        Span::current().record("generation", generation);

        if query.is_empty() {
            debug!("Empty query, clearing results");
            self.state.send_modify(|snapshot| {
                snapshot.generation = generation;
                snapshot.results.clear();
                snapshot.is_searching = false;
            });
            return generation;
        }

        self.publish_searching(generation);

        let search = Arc::clone(&self.search);
        let completion_tx = self.completion_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = search.search(&query.text, &query.bias_region).await;
            let _ = completion_tx.send(Completion {
                generation,
                kind: CompletionKind::Text(outcome),
            });
        });
        self.in_flight = Some(task.abort_handle());
        generation
    }

    /// Start a "search near me", superseding whatever is outstanding.
    ///
    /// Without location authorization this only asks for permission. Without a
    /// cached fix it asks the location provider for one and waits, bounded by
    /// the configured timeout, before querying. Must be called inside a tokio runtime.
    #[instrument(name = "Execute nearby search", skip_all, fields(generation = field::Empty))]
    pub fn execute_nearby(&mut self) -> Generation {
        let generation = self.begin();
        Span::current().record("generation", generation);

        let authorization = self.location.authorization_state();
        if !authorization.is_authorized() {
            info!(%authorization, "Location not authorized, requesting permission");
            self.location.request_permission();
            self.state.send_modify(|snapshot| {
                snapshot.generation = generation;
                snapshot.is_searching = false;
            });
            return generation;
        }

        self.publish_searching(generation);

        let cached = self.location.current_coordinate();
        if cached.is_none() {
            debug!("No cached location fix, requesting one");
            self.location.request_location_update();
        }

        let search = Arc::clone(&self.search);
        let location = Arc::clone(&self.location);
        let completion_tx = self.completion_tx.clone();
        let terms = self.config.nearby_terms.clone();
        let radius_m = self.config.nearby_radius_m;
        let poll_interval = self.config.location_poll_interval;
        let wait_timeout = self.config.location_wait_timeout;

        let task = tokio::spawn(async move {
            let fix = match cached {
                Some(coordinate) => Some(coordinate),
                None => wait_for_fix(location.as_ref(), poll_interval, wait_timeout).await,
            };
            let kind = match fix {
                Some(reference) => {
                    let region = BiasRegion::new(reference, radius_m);
                    let outcome = search.search_nearby(&terms, &region).await;
                    CompletionKind::Nearby { reference, outcome }
                }
                None => CompletionKind::LocationTimedOut,
            };
            let _ = completion_tx.send(Completion { generation, kind });
        });
        self.in_flight = Some(task.abort_handle());
        generation
    }

    /// Apply a background completion if it belongs to the current generation.
    pub fn on_completion(&mut self, completion: Completion) -> Applied {
        let current = self.generation();
        if completion.generation != current {
            debug!(
                stale = completion.generation,
                current, "Discarding superseded completion"
            );
            return Applied::Discarded;
        }
        self.in_flight = None;

        match completion.kind {
            CompletionKind::Text(Ok(results)) => {
                debug!(results = results.len(), "Text search completed");
                self.publish_results(results, None);
                Applied::TextResults
            }
            CompletionKind::Nearby {
                reference,
                outcome: Ok(results),
            } => {
                debug!(results = results.len(), %reference, "Nearby search completed");
                let ranked = rank_by_distance(&reference, results);
                let marker = self.config.nearby_marker.clone();
                self.publish_results(ranked, Some(marker));
                Applied::NearbyResults
            }
            CompletionKind::Text(Err(error)) | CompletionKind::Nearby { outcome: Err(error), .. } => {
                warn!(provider = self.search.name(), %error, "Search failed, showing no results");
                self.publish_results(Vec::new(), None);
                Applied::Failed
            }
            CompletionKind::LocationTimedOut => {
                info!(
                    timeout = ?self.config.location_wait_timeout,
                    "No location fix in time, abandoning nearby search"
                );
                self.state.send_modify(|snapshot| snapshot.is_searching = false);
                Applied::LocationTimedOut
            }
        }
    }

    /// Supersede any outstanding search and reset to an empty, idle state.
    pub fn clear(&mut self) {
        let generation = self.begin();
        debug!(generation, "Clearing results");
        self.state.send_modify(|snapshot| {
            snapshot.generation = generation;
            snapshot.search_text.clear();
            snapshot.results.clear();
            snapshot.is_searching = false;
        });
    }

    /// Abort any outstanding work.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    /// Claim the next generation and abort the search it supersedes.
    fn begin(&mut self) -> Generation {
        self.shutdown();
        self.generation() + 1
    }

    fn publish_searching(&self, generation: Generation) {
        self.state.send_modify(|snapshot| {
            snapshot.generation = generation;
            snapshot.is_searching = true;
        });
    }

    fn publish_results(&self, results: Vec<PlaceCandidate>, search_text: Option<String>) {
        self.state.send_modify(|snapshot| {
            snapshot.results = results;
            snapshot.is_searching = false;
            if let Some(text) = search_text {
                snapshot.search_text = text;
            }
        });
    }
}

impl Drop for SearchCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Poll for a fix every `poll_interval`, giving up once `timeout` has passed.
async fn wait_for_fix(
    location: &dyn LocationProvider,
    poll_interval: Duration,
    timeout: Duration,
) -> Option<Coordinate> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(coordinate) = location.current_coordinate() {
            return Some(coordinate);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(poll_interval.min(deadline - now)).await;
    }
}
