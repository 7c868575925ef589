use std::time::Duration;

use placeseek_providers::{BiasRegion, Coordinate};

use crate::error::{PlaceSeekError, Result};

/// Taipei 101, used as the free-text bias center until a fix exists.
pub const DEFAULT_CENTER: Coordinate = Coordinate::new(25.0330, 121.5654);

/// Timing and geography settings for a search engine.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineConfig {
    /// Quiet period after the last keystroke before a text search starts
    pub debounce_delay: Duration,
    /// How often a nearby search re-checks the location provider for a fix
    pub location_poll_interval: Duration,
    /// How long a nearby search waits for a fix before giving up silently
    pub location_wait_timeout: Duration,
    /// Bias region for free-text searches while no fix is known
    pub default_region: BiasRegion,
    /// Bias radius around the fix for free-text searches
    pub text_search_radius_m: f64,
    /// Bias radius around the fix for nearby searches
    pub nearby_radius_m: f64,
    /// Canned terms sent for a nearby search
    pub nearby_terms: Vec<String>,
    /// Search text shown after a nearby search succeeds
    pub nearby_marker: String,
    /// Voice input stops after this long without a non-empty recognition
    pub voice_silence_timeout: Duration,
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Check the invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.debounce_delay.is_zero() {
            return Err(PlaceSeekError::ConfigError(
                "Debounce delay must be non-zero".into(),
            ));
        }
        if self.location_poll_interval.is_zero() {
            return Err(PlaceSeekError::ConfigError(
                "Location poll interval must be non-zero".into(),
            ));
        }
        if self.location_poll_interval > self.location_wait_timeout {
            return Err(PlaceSeekError::ConfigError(format!(
                "Location poll interval ({:?}) must not exceed the wait timeout ({:?})",
                self.location_poll_interval, self.location_wait_timeout
            )));
        }
        for (name, radius) in [
            ("text_search_radius_m", self.text_search_radius_m),
            ("nearby_radius_m", self.nearby_radius_m),
        ] {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(PlaceSeekError::ConfigError(format!(
                    "{name} must be a positive finite radius, got {radius}"
                )));
            }
        }
        if !self.default_region.is_valid() {
            return Err(PlaceSeekError::ConfigError(format!(
                "Default region is invalid: center {} radius {}m",
                self.default_region.center, self.default_region.radius_m
            )));
        }
        if self.nearby_terms.is_empty() {
            return Err(PlaceSeekError::ConfigError(
                "At least one nearby search term is required".into(),
            ));
        }
        if let Some(index) = self.nearby_terms.iter().position(|term| term.trim().is_empty()) {
            return Err(PlaceSeekError::ConfigError(format!(
                "Nearby search term {index} is blank"
            )));
        }
        if self.nearby_marker.trim().is_empty() {
            return Err(PlaceSeekError::ConfigError(
                "Nearby marker text must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_delay: Duration::from_millis(500),
            location_poll_interval: Duration::from_millis(200),
            location_wait_timeout: Duration::from_secs(5),
            default_region: BiasRegion::new(DEFAULT_CENTER, 1_000.0),
            text_search_radius_m: 5_000.0,
            nearby_radius_m: 1_000.0,
            nearby_terms: ["restaurant", "drinks", "cafe", "snack", "bakery", "dessert"]
                .into_iter()
                .map(String::from)
                .collect(),
            nearby_marker: "nearby".to_string(),
            voice_silence_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for creating engine configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Snappier typeahead and location polling
    pub fn responsive() -> Self {
        let mut builder = Self::new();
        builder.config.debounce_delay = Duration::from_millis(250);
        builder.config.location_poll_interval = Duration::from_millis(100);
        builder
    }

    /// Fewer searches while typing and more time to obtain a fix
    pub fn patient() -> Self {
        let mut builder = Self::new();
        builder.config.debounce_delay = Duration::from_millis(800);
        builder.config.location_wait_timeout = Duration::from_secs(10);
        builder
    }

    #[must_use]
    pub fn debounce_delay(mut self, delay: Duration) -> Self {
        self.config.debounce_delay = delay;
        self
    }

    /// Set the poll interval and upper bound of the nearby location wait
    #[must_use]
    pub fn location_wait(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.config.location_poll_interval = poll_interval;
        self.config.location_wait_timeout = timeout;
        self
    }

    /// Set the free-text bias region used before a fix exists
    #[must_use]
    pub fn default_region(mut self, region: BiasRegion) -> Self {
        self.config.default_region = region;
        self
    }

    #[must_use]
    pub fn text_search_radius(mut self, radius_m: f64) -> Self {
        self.config.text_search_radius_m = radius_m;
        self
    }

    #[must_use]
    pub fn voice_silence_timeout(mut self, timeout: Duration) -> Self {
        self.config.voice_silence_timeout = timeout;
        self
    }

    /// Configure the nearby search
    pub fn nearby(self) -> NearbyBuilder {
        NearbyBuilder::new(self)
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Builder for the nearby search settings
pub struct NearbyBuilder {
    parent: EngineConfigBuilder,
}

impl NearbyBuilder {
    fn new(parent: EngineConfigBuilder) -> Self {
        Self { parent }
    }

    #[must_use]
    pub fn radius(mut self, radius_m: f64) -> Self {
        self.parent.config.nearby_radius_m = radius_m;
        self
    }

    /// Replace the canned search terms
    #[must_use]
    pub fn terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent.config.nearby_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.parent.config.nearby_marker = marker.into();
        self
    }

    /// Return to the main configuration builder
    pub fn done(self) -> EngineConfigBuilder {
        self.parent
    }
}
