//! In-memory search provider over a fixed list of places.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use itertools::Itertools;
use tracing::debug;

use crate::{
    ProviderError, Result,
    model::{BiasRegion, Coordinate, PlaceCandidate},
    search::SearchProvider,
};

/// Free-text matches may lie this many radii away from the region center.
/// The region biases a text search, it does not bound it tightly.
const TEXT_REGION_SLACK: f64 = 4.0;

/// Searches a fixed catalog of places.
///
/// Text search requires every whitespace-separated token of the query to occur
/// (case-insensitively) in a candidate's name, address or category, and keeps
/// catalog order. Nearby search matches any canned term against the category
/// or name and only considers places inside the region radius.
#[derive(Debug, Clone)]
pub struct CatalogSearchProvider {
    places: Arc<[PlaceCandidate]>,
    latency: Duration,
    available: bool,
}

impl CatalogSearchProvider {
    pub fn new(places: impl Into<Arc<[PlaceCandidate]>>) -> Self {
        Self {
            places: places.into(),
            latency: Duration::ZERO,
            available: true,
        }
    }

    /// A provider whose every call fails, e.g. to simulate being offline.
    pub fn unavailable() -> Self {
        Self {
            places: Arc::from(Vec::new()),
            latency: Duration::ZERO,
            available: false,
        }
    }

    /// Delay every response by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    async fn respond(&self) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.available {
            Ok(())
        } else {
            Err(ProviderError::Unavailable("catalog is offline".into()))
        }
    }
}

fn haystack(place: &PlaceCandidate) -> String {
    format!(
        "{} {} {}",
        place.name(),
        place.address_line(),
        place.category().unwrap_or_default()
    )
    .to_lowercase()
}

#[async_trait]
impl SearchProvider for CatalogSearchProvider {
    async fn search(&self, text: &str, region: &BiasRegion) -> Result<Vec<PlaceCandidate>> {
        self.respond().await?;

        let tokens = text.split_whitespace().map(str::to_lowercase).collect_vec();
        let widened = BiasRegion::new(region.center, region.radius_m * TEXT_REGION_SLACK);

        let matches = self
            .places
            .iter()
            .filter(|place| widened.contains(&place.coordinate()))
            .filter(|place| {
                let haystack = haystack(place);
                tokens.iter().all(|token| haystack.contains(token.as_str()))
            })
            .cloned()
            .collect_vec();

        debug!(text, matches = matches.len(), "Catalog text search");
        Ok(matches)
    }

    async fn search_nearby(
        &self,
        terms: &[String],
        region: &BiasRegion,
    ) -> Result<Vec<PlaceCandidate>> {
        self.respond().await?;

        let terms = terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect_vec();

        let matches = self
            .places
            .iter()
            .filter(|place| region.contains(&place.coordinate()))
            .filter(|place| {
                let category = place.category().unwrap_or_default().to_lowercase();
                let name = place.name().to_lowercase();
                terms
                    .iter()
                    .any(|term| category.contains(term.as_str()) || name.contains(term.as_str()))
            })
            .cloned()
            .collect_vec();

        debug!(matches = matches.len(), "Catalog nearby search");
        Ok(matches)
    }

    fn name(&self) -> &'static str {
        "catalog"
    }
}

/// A handful of group-buy stores around Taipei 101.
pub fn sample_catalog() -> Vec<PlaceCandidate> {
    vec![
        PlaceCandidate::builder("store-1", Coordinate::new(25.0360, 121.5680))
            .name("清心福全 Ching Shin")
            .address_line("台北市信義區松仁路")
            .category("drinks")
            .phone_number("02-1234-5678")
            .build(),
        PlaceCandidate::builder("store-2", Coordinate::new(25.0268, 121.5436))
            .name("50嵐 50 Lan")
            .address_line("台北市大安區安和路")
            .category("drinks")
            .phone_number("02-2345-6789")
            .build(),
        PlaceCandidate::builder("store-3", Coordinate::new(25.0445, 121.5150))
            .name("池上便當 Chishang Bento")
            .address_line("台北市中正區忠孝西路")
            .category("lunch")
            .phone_number("02-3456-7890")
            .build(),
        PlaceCandidate::builder("store-4", Coordinate::new(25.0520, 121.6070))
            .name("三商巧福 Mercuries Noodles")
            .address_line("台北市南港區南港路")
            .category("lunch")
            .phone_number("02-4567-8901")
            .build(),
        PlaceCandidate::builder("store-5", Coordinate::new(25.0930, 121.5250))
            .name("85度C Bakery Cafe")
            .address_line("台北市士林區中正路")
            .category("dessert")
            .phone_number("02-5678-9012")
            .build(),
        PlaceCandidate::builder("store-6", Coordinate::new(25.0345, 121.5630))
            .name("信義 Bakery House")
            .address_line("台北市信義區市府路")
            .category("bakery")
            .website("https://bakery.example.com")
            .build(),
        PlaceCandidate::builder("store-7", Coordinate::new(25.0302, 121.5700))
            .name("Xinyi Corner Cafe")
            .address_line("台北市信義區松智路")
            .category("cafe")
            .build(),
    ]
}
