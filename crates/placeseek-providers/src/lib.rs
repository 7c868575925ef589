//! Provider contracts and concrete providers for placeseek.
//!
//! This crate holds everything the search engine talks to but does not own:
//!
//! - [`model`]: coordinates, bias regions and the normalized [`PlaceCandidate`]
//! - [`location`]: the [`LocationProvider`] contract and an in-process
//!   [`ManualLocationProvider`] for tests, demos and hosts that push fixes in
//! - [`search`]: the [`SearchProvider`] contract
//! - [`catalog`]: an in-memory [`CatalogSearchProvider`]
//! - `nominatim` (feature `nominatim`, on by default): an HTTP provider backed
//!   by an OpenStreetMap Nominatim instance
//!
//! The engine itself lives in the `placeseek` crate, which re-exports this one
//! as `placeseek::providers`.

pub mod catalog;
pub mod location;
pub mod model;
#[cfg(feature = "nominatim")]
pub mod nominatim;
pub mod search;

pub use catalog::{CatalogSearchProvider, sample_catalog};
pub use location::{AuthorizationState, LocationProvider, ManualLocationProvider, PermissionPrompt};
pub use model::{BiasRegion, Coordinate, PlaceCandidate, PlaceCandidateBuilder};
#[cfg(feature = "nominatim")]
pub use nominatim::{NominatimConfig, NominatimSearchProvider, merge_term_responses};
pub use search::SearchProvider;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ProviderError {
        #[cfg(feature = "nominatim")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Unexpected status {status} from {url}")]
        Status { status: u16, url: String },
        #[error("Failed to decode provider response: {0}")]
        Decode(#[from] serde_json::Error),
        #[error("Invalid search region: {0}")]
        InvalidRegion(String),
        #[error("Provider unavailable: {0}")]
        Unavailable(String),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }

    pub type Result<T> = std::result::Result<T, ProviderError>;
}

pub use error::{ProviderError, Result};
