//! The location search engine.
//!
//! [`LocationSearch`] is a cheap, cloneable handle to a single engine task.
//! The task is the only place that touches search state: UI operations, debounce
//! timer ticks and provider completions all arrive on channels and are handled
//! one at a time, so no locking is needed around the generation check.
//!
//! ```rust
//! use placeseek::{LocationSearch, providers::{CatalogSearchProvider, sample_catalog}};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), placeseek::error::PlaceSeekError> {
//! let search = LocationSearch::builder()
//!     .search_provider(CatalogSearchProvider::new(sample_catalog()))
//!     .spawn()?;
//!
//! search.handle_text_change("drinks");
//! let snapshot = search.wait_for(|snapshot| !snapshot.results.is_empty()).await?;
//! println!("{} places match {:?}", snapshot.results.len(), snapshot.search_text);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use placeseek_providers::{LocationProvider, ManualLocationProvider, PlaceCandidate, SearchProvider};
use tokio::{
    runtime::Handle,
    sync::{mpsc, watch},
};
use tracing::{debug, info, instrument};

use crate::{
    config::EngineConfig,
    error::{PlaceSeekError, Result},
    search::{
        Applied, Completion, DebounceController, DebounceEvent, DebounceTick, SearchCoordinator,
        SearchSnapshot,
    },
};

enum Command {
    TextChanged(String),
    Voice { text: String, is_final: bool },
    SearchNow,
    SearchNearby,
    ClearResults,
    SetLocationProvider(Arc<dyn LocationProvider>),
    Shutdown,
}

/// Handle to a running location search engine.
///
/// All operations are fire-and-forget and return immediately; their effect shows
/// up in the published [`SearchSnapshot`]. After [`shutdown`](Self::shutdown) they
/// are silently ignored, and the awaiting helpers return
/// [`PlaceSeekError::EngineClosed`].
#[derive(Clone)]
pub struct LocationSearch {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SearchSnapshot>,
    config: Arc<EngineConfig>,
}

impl LocationSearch {
    pub fn builder() -> LocationSearchBuilder {
        LocationSearchBuilder::new()
    }

    /// Record new search text and (re)start the debounce timer.
    ///
    /// Empty or all-whitespace text clears the results at once.
    pub fn handle_text_change(&self, text: impl Into<String>) {
        self.send(Command::TextChanged(text.into()));
    }

    /// Forward a voice recognition update.
    ///
    /// A partial update behaves like [`handle_text_change`](Self::handle_text_change).
    /// A final, non-empty update searches immediately without waiting out the debounce.
    pub fn handle_voice(&self, text: impl Into<String>, is_final: bool) {
        self.send(Command::Voice {
            text: text.into(),
            is_final,
        });
    }

    /// Search the current text now, skipping the debounce delay.
    pub fn search_now(&self) {
        self.send(Command::SearchNow);
    }

    /// Search for places near the current location.
    pub fn search_nearby(&self) {
        self.send(Command::SearchNearby);
    }

    /// Supersede any outstanding search and empty both the results and the text.
    pub fn clear_results(&self) {
        self.send(Command::ClearResults);
    }

    pub fn set_location_provider(&self, location: impl LocationProvider + 'static) {
        self.send(Command::SetLocationProvider(Arc::new(location)));
    }

    /// Stop the engine, aborting pending timers and in-flight searches.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn search_text(&self) -> String {
        self.state.borrow().search_text.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.state.borrow().is_searching
    }

    pub fn results(&self) -> Vec<PlaceCandidate> {
        self.state.borrow().results.clone()
    }

    pub fn snapshot(&self) -> SearchSnapshot {
        self.state.borrow().clone()
    }

    /// A receiver that is notified whenever the engine publishes new state.
    pub fn subscribe(&self) -> watch::Receiver<SearchSnapshot> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`, checking the current state first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SearchSnapshot) -> bool,
    ) -> Result<SearchSnapshot> {
        let mut state = self.state.clone();
        let snapshot = state
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| PlaceSeekError::EngineClosed)?;
        Ok(snapshot.clone())
    }

    /// Wait for the next state the engine publishes.
    pub async fn changed(&self) -> Result<SearchSnapshot> {
        let mut state = self.state.clone();
        state.mark_unchanged();
        state
            .changed()
            .await
            .map_err(|_| PlaceSeekError::EngineClosed)?;
        Ok(state.borrow_and_update().clone())
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Location search engine is not running, ignoring command");
        }
    }
}

/// Builder for spawning a [`LocationSearch`] engine.
#[derive(Default)]
pub struct LocationSearchBuilder {
    config: Option<EngineConfig>,
    search: Option<Arc<dyn SearchProvider>>,
    location: Option<Arc<dyn LocationProvider>>,
}

impl LocationSearchBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of [`EngineConfig::default`]. It is validated on spawn.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the place search backend. Required.
    #[must_use]
    pub fn search_provider(mut self, search: impl SearchProvider + 'static) -> Self {
        self.search = Some(Arc::new(search));
        self
    }

    /// Set a search backend that is shared with other owners.
    #[must_use]
    pub fn shared_search_provider(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    /// Set the location source. Defaults to an undetermined [`ManualLocationProvider`].
    #[must_use]
    pub fn location_provider(mut self, location: impl LocationProvider + 'static) -> Self {
        self.location = Some(Arc::new(location));
        self
    }

    /// Start the engine on the current tokio runtime.
    #[instrument(name = "Spawn location search", skip_all, level = "info")]
    pub fn spawn(self) -> Result<LocationSearch> {
        let runtime = Handle::try_current().map_err(|_| PlaceSeekError::NoRuntime)?;

        let config = self.config.unwrap_or_default();
        config.validate()?;
        let config = Arc::new(config);

        let search = self.search.ok_or_else(|| {
            PlaceSeekError::ConfigError("A search provider is required".to_string())
        })?;
        let location = self
            .location
            .unwrap_or_else(|| Arc::new(ManualLocationProvider::new()));

        info!(
            provider = search.name(),
            debounce = ?config.debounce_delay,
            "Starting location search engine"
        );

        let (debounce, ticks) = DebounceController::new(config.debounce_delay);
        let (coordinator, completions) =
            SearchCoordinator::new(Arc::clone(&config), search, location);
        let (command_tx, commands) = mpsc::unbounded_channel();
        let state = coordinator.subscribe();

        let engine = Engine {
            config: Arc::clone(&config),
            debounce,
            coordinator,
        };
        runtime.spawn(engine.run(commands, ticks, completions));

        Ok(LocationSearch {
            commands: command_tx,
            state,
            config,
        })
    }
}

struct Engine {
    config: Arc<EngineConfig>,
    debounce: DebounceController,
    coordinator: SearchCoordinator,
}

impl Engine {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut ticks: mpsc::UnboundedReceiver<DebounceTick>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(tick) = ticks.recv() => {
                    if let Some(event) = self.debounce.on_tick(tick) {
                        self.settle(event);
                    }
                }
                Some(completion) = completions.recv() => self.apply(completion),
            }
        }

        self.debounce.cancel();
        self.coordinator.shutdown();
        info!(
            generation = self.coordinator.generation(),
            "Location search engine stopped"
        );
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::TextChanged(text) | Command::Voice { text, is_final: false } => {
                self.coordinator.set_search_text(&text);
                if let Some(event) = self.debounce.on_text_changed(text) {
                    self.settle(event);
                }
            }
            Command::Voice {
                text,
                is_final: true,
            } => {
                if text.trim().is_empty() {
                    debug!("Ignoring empty final voice result");
                    return;
                }
                self.coordinator.set_search_text(&text);
                self.debounce.replace_text(text);
                let event = self.debounce.settle_now();
                self.settle(event);
            }
            Command::SearchNow => {
                let event = self.debounce.settle_now();
                self.settle(event);
            }
            Command::SearchNearby => {
                self.coordinator.execute_nearby();
            }
            Command::ClearResults => {
                self.debounce.replace_text(String::new());
                self.coordinator.clear();
            }
            Command::SetLocationProvider(location) => {
                debug!("Swapping location provider");
                self.coordinator.set_location_provider(location);
            }
            Command::Shutdown => {}
        }
    }

    fn settle(&mut self, event: DebounceEvent) {
        let text = match event {
            DebounceEvent::Settled(text) => text,
            DebounceEvent::Cleared => String::new(),
        };
        let query = self.coordinator.text_query(&text);
        self.coordinator.execute(query);
    }

    fn apply(&mut self, completion: Completion) {
        if self.coordinator.on_completion(completion) == Applied::NearbyResults {
            // The marker is display text only, it must never be searched
            self.debounce.replace_text(self.config.nearby_marker.clone());
        }
    }
}
