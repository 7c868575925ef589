//! The search provider contract.

use async_trait::async_trait;
use itertools::Itertools;

use crate::{
    Result,
    model::{BiasRegion, PlaceCandidate},
};

/// An opaque place-search backend.
///
/// Implementations return candidates in their own relevance order; the engine
/// keeps that order for free-text searches and re-ranks nearby searches by
/// distance itself.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Free-text search scoped by `region`.
    async fn search(&self, text: &str, region: &BiasRegion) -> Result<Vec<PlaceCandidate>>;

    /// Search for any of the canned `terms` around `region`.
    ///
    /// The default joins the non-blank terms into one natural-language query.
    async fn search_nearby(
        &self,
        terms: &[String],
        region: &BiasRegion,
    ) -> Result<Vec<PlaceCandidate>> {
        let query = terms
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .join(" ");
        self.search(&query, region).await
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        "search-provider"
    }
}
