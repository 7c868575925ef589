//! Placeseek - Place Search Coordination Engine
//!
//! Placeseek turns rapidly changing search text, voice recognition updates and
//! "search near me" requests into a single, up-to-date list of places. It
//! debounces keystrokes, makes sure only the most recently started search can
//! publish results, waits (bounded) for a location fix when one is needed, and
//! orders nearby results by distance.
//!
//! # Quick Start
//!
//! ```rust
//! use placeseek::{
//!     EngineConfig, LocationSearch,
//!     providers::{Coordinate, CatalogSearchProvider, ManualLocationProvider, sample_catalog},
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), placeseek::error::PlaceSeekError> {
//! let location = ManualLocationProvider::authorized_at(Coordinate::new(25.0330, 121.5654));
//!
//! let search = LocationSearch::builder()
//!     .config(EngineConfig::builder().build()?)
//!     .search_provider(CatalogSearchProvider::new(sample_catalog()))
//!     .location_provider(location)
//!     .spawn()?;
//!
//! // Nearest places first, and the search text becomes the "nearby" marker
//! search.search_nearby();
//! let snapshot = search.wait_for(|snapshot| !snapshot.results.is_empty()).await?;
//! assert_eq!(snapshot.search_text, "nearby");
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Debounced typeahead**: one provider call per pause in typing
//! - **Supersession**: stale completions are discarded by generation, and aborted
//! - **Nearby search**: permission handling and a bounded wait for a location fix
//! - **Voice input**: partial results feed the debounce, final results search at once
//! - **Pluggable providers**: an in-memory catalog and an OpenStreetMap Nominatim
//!   client ship in [`providers`]
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
mod search;
pub mod voice;

pub use core::{LocationSearch, LocationSearchBuilder};

pub use config::{DEFAULT_CENTER, EngineConfig, EngineConfigBuilder, NearbyBuilder};
pub use error::{PlaceSeekError, Result};
pub use placeseek_providers as providers;
pub use placeseek_providers::{
    AuthorizationState, BiasRegion, Coordinate, LocationProvider, PlaceCandidate, SearchProvider,
};
pub use search::{Generation, SearchQuery, SearchSnapshot, rank_by_distance};
pub use voice::{Recognition, VoiceInput, VoiceStop};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Placeseek library.
///
/// Honors `RUST_LOG` when set, otherwise logs at `level`. HTTP client internals
/// are capped at `warn`. Only the first call installs a subscriber; later calls
/// are no-ops.
///
/// # Examples
///
/// ```rust
/// use placeseek::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), placeseek::error::PlaceSeekError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static ()> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|error| anyhow::anyhow!(error))?;
        Ok(())
    })
}
