//! Search provider backed by an OpenStreetMap Nominatim `/search` endpoint.

use std::time::Duration;

use ahash::AHashSet;
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{
    ProviderError, Result,
    model::{BiasRegion, Coordinate, PlaceCandidate},
    search::SearchProvider,
};

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Connection settings for [`NominatimSearchProvider`].
///
/// The public Nominatim instance requires an identifying `User-Agent`, so set
/// [`user_agent`](Self::user_agent) to something that identifies your application.
#[derive(Debug, Clone)]
pub struct NominatimConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Maximum rows per request.
    pub limit: usize,
    pub timeout: Duration,
}

impl Default for NominatimConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: concat!("placeseek/", env!("CARGO_PKG_VERSION")).to_string(),
            limit: 20,
            timeout: Duration::from_secs(10),
        }
    }
}

impl NominatimConfig {
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP place search against Nominatim.
///
/// The bias region becomes an unbounded `viewbox`, so results near the region
/// are preferred but results outside it are still returned.
#[derive(Debug, Clone)]
pub struct NominatimSearchProvider {
    client: Client,
    config: NominatimConfig,
}

impl NominatimSearchProvider {
    pub fn new(config: NominatimConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(ProviderError::Unavailable(
                "Nominatim requires a non-empty User-Agent".into(),
            ));
        }
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &NominatimConfig {
        &self.config
    }

    #[instrument(name = "Nominatim search", skip(self, region), level = "debug")]
    async fn fetch(&self, text: &str, region: &BiasRegion) -> Result<Vec<PlaceCandidate>> {
        if !region.is_valid() {
            return Err(ProviderError::InvalidRegion(format!(
                "center {} radius {}m",
                region.center, region.radius_m
            )));
        }

        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let limit = self.config.limit.to_string();
        let viewbox = viewbox(region);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", text),
                ("format", "jsonv2"),
                ("limit", limit.as_str()),
                ("viewbox", viewbox.as_str()),
                ("bounded", "0"),
                ("extratags", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.text().await?;
        let places = parse_search_response(&body)?;
        debug!(results = places.len(), "Nominatim responded");
        Ok(places)
    }
}

#[async_trait]
impl SearchProvider for NominatimSearchProvider {
    async fn search(&self, text: &str, region: &BiasRegion) -> Result<Vec<PlaceCandidate>> {
        self.fetch(text, region).await
    }

    /// One request per non-blank term, merged in term order and de-duplicated by id.
    /// Fails only when every term failed.
    async fn search_nearby(
        &self,
        terms: &[String],
        region: &BiasRegion,
    ) -> Result<Vec<PlaceCandidate>> {
        let terms = terms
            .iter()
            .map(|term| term.trim())
            .filter(|term| !term.is_empty())
            .collect::<Vec<_>>();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let responses = join_all(terms.iter().map(|term| self.fetch(term, region))).await;
        merge_term_responses(terms.into_iter().zip(responses))
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

/// Merge per-term responses in order, keeping the first candidate for each id.
///
/// Failed terms are logged and skipped. The last error is returned only when no
/// term succeeded.
pub fn merge_term_responses<'a>(
    responses: impl IntoIterator<Item = (&'a str, Result<Vec<PlaceCandidate>>)>,
) -> Result<Vec<PlaceCandidate>> {
    let mut seen = AHashSet::new();
    let mut merged = Vec::new();
    let mut last_error = None;
    let mut any_succeeded = false;

    for (term, response) in responses {
        match response {
            Ok(places) => {
                any_succeeded = true;
                merged.extend(
                    places
                        .into_iter()
                        .filter(|place| seen.insert(place.id().to_string())),
                );
            }
            Err(error) => {
                warn!(term, %error, "Nearby term failed");
                last_error = Some(error);
            }
        }
    }

    match last_error {
        Some(error) if !any_succeeded => Err(error),
        _ => Ok(merged),
    }
}

/// `west,north,east,south` around the region, clamped to valid ranges.
fn viewbox(region: &BiasRegion) -> String {
    let (lat_delta, lon_delta) = region.degree_deltas();
    let center = region.center;
    let west = (center.longitude - lon_delta).max(-180.0);
    let east = (center.longitude + lon_delta).min(180.0);
    let north = (center.latitude + lat_delta).min(90.0);
    let south = (center.latitude - lat_delta).max(-90.0);
    format!("{west:.6},{north:.6},{east:.6},{south:.6}")
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    extratags: Option<Value>,
}

impl NominatimPlace {
    fn into_candidate(self) -> Option<PlaceCandidate> {
        let coordinate = Coordinate::new(self.lat.parse().ok()?, self.lon.parse().ok()?);
        if !coordinate.is_valid() {
            return None;
        }

        let tag = |key: &str| {
            self.extratags
                .as_ref()
                .and_then(|tags| tags.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let phone = tag("phone").or_else(|| tag("contact:phone"));
        let website = tag("website").or_else(|| tag("contact:website"));

        let mut builder = PlaceCandidate::builder(self.place_id.to_string(), coordinate)
            .name(self.name.unwrap_or_default())
            .address_line(self.display_name);
        if let Some(kind) = self.kind {
            builder = builder.category(kind);
        }
        if let Some(phone) = phone {
            builder = builder.phone_number(phone);
        }
        if let Some(website) = website {
            builder = builder.website(website);
        }
        Some(builder.build())
    }
}

/// Decode a `format=jsonv2` response body. Rows with unusable coordinates are skipped.
pub fn parse_search_response(body: &str) -> Result<Vec<PlaceCandidate>> {
    let rows: Vec<NominatimPlace> = serde_json::from_str(body)?;
    Ok(rows
        .into_iter()
        .filter_map(NominatimPlace::into_candidate)
        .collect())
}
