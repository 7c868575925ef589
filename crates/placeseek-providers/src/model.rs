//! Geographic primitives and the normalized place record.
//!
//! Every provider, whatever its backend, hands the engine [`PlaceCandidate`]s.
//! Candidates are immutable once built: the engine only reorders or replaces
//! whole lists of them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mean earth radius in meters (IUGG).
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;
/// Approximate length of one degree of latitude in meters.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// A latitude/longitude pair in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite and within their geographic range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in meters (haversine).
    ///
    /// ```
    /// use placeseek_providers::Coordinate;
    ///
    /// let equator = Coordinate::new(0.0, 0.0);
    /// let one_degree_north = Coordinate::new(1.0, 0.0);
    /// let meters = equator.distance_to(&one_degree_north);
    /// assert!((meters - 111_195.0).abs() < 10.0);
    /// ```
    pub fn distance_to(&self, other: &Self) -> f64 {
        let lat1 = self.latitude * DEG_TO_RAD;
        let lat2 = other.latitude * DEG_TO_RAD;
        let delta_lat = (other.latitude - self.latitude) * DEG_TO_RAD;
        let delta_lon = (other.longitude - self.longitude) * DEG_TO_RAD;

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_M * c
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// A center coordinate plus a radius, used to scope a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasRegion {
    pub center: Coordinate,
    /// Radius in meters.
    pub radius_m: f64,
}

impl BiasRegion {
    pub const fn new(center: Coordinate, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    pub fn is_valid(&self) -> bool {
        self.center.is_valid() && self.radius_m.is_finite() && self.radius_m > 0.0
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.center.distance_to(coordinate) <= self.radius_m
    }

    /// Half-extent of the region in degrees as `(latitude_delta, longitude_delta)`.
    ///
    /// Longitude degrees shrink towards the poles, so the longitude delta is
    /// widened by `1 / cos(latitude)` (clamped near the poles).
    pub fn degree_deltas(&self) -> (f64, f64) {
        let lat_delta = self.radius_m / METERS_PER_DEGREE;
        let cos_lat = (self.center.latitude * DEG_TO_RAD).cos().max(0.01);
        let lon_delta = (self.radius_m / (METERS_PER_DEGREE * cos_lat)).min(180.0);
        (lat_delta, lon_delta)
    }
}

/// One searchable location result.
///
/// `id` is only stable within a single result set. `name` and `address_line`
/// may be empty, which callers should treat as "unknown".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    id: String,
    name: String,
    address_line: String,
    coordinate: Coordinate,
    category: Option<String>,
    phone_number: Option<String>,
    website: Option<String>,
}

impl PlaceCandidate {
    /// Start building a candidate at `coordinate`.
    pub fn builder(id: impl Into<String>, coordinate: Coordinate) -> PlaceCandidateBuilder {
        PlaceCandidateBuilder::new(id, coordinate)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name, or `"Unknown"` when the provider did not supply one.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Unknown"
        } else {
            &self.name
        }
    }

    pub fn address_line(&self) -> &str {
        &self.address_line
    }

    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Free-form classification tag; `None` means uncategorized.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }
}

/// Builder for [`PlaceCandidate`]. Blank optional fields are stored as `None`.
#[derive(Debug, Clone)]
pub struct PlaceCandidateBuilder {
    candidate: PlaceCandidate,
}

impl PlaceCandidateBuilder {
    pub fn new(id: impl Into<String>, coordinate: Coordinate) -> Self {
        Self {
            candidate: PlaceCandidate {
                id: id.into(),
                name: String::new(),
                address_line: String::new(),
                coordinate,
                category: None,
                phone_number: None,
                website: None,
            },
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.candidate.name = name.into();
        self
    }

    #[must_use]
    pub fn address_line(mut self, address_line: impl Into<String>) -> Self {
        self.candidate.address_line = address_line.into();
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.candidate.category = non_blank(category.into());
        self
    }

    #[must_use]
    pub fn phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.candidate.phone_number = non_blank(phone_number.into());
        self
    }

    #[must_use]
    pub fn website(mut self, website: impl Into<String>) -> Self {
        self.candidate.website = non_blank(website.into());
        self
    }

    pub fn build(self) -> PlaceCandidate {
        self.candidate
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
