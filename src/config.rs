use std::path::Path;
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

/// Default Flickr REST endpoint queried for photo pages.
pub const FLICKR_API_URL: &str = "https://api.flickr.com/services/rest/";

/// Demo API credential carried over from the original widget.
pub const DEMO_API_KEY: &str = "6437e920f7debd7ab4439a0cc0914f73";

/// Autoplay intervals below this floor are clamped up to it.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// How the hosting surface letterboxes slide images. Consumed by the
/// external slide builder, not by the carousel core itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundSize {
    #[default]
    Cover,
    Contain,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CarouselConfig {
    /// CSS-style sizing keyword handed through to the slide builder.
    pub background_size: BackgroundSize,
    /// Photos fetched per page request.
    pub slides_per_request: u32,
    /// Search term the collection is bound to for its whole lifetime.
    pub search_text: String,
    /// Autoplay interval between automatic advances. Floored at 1s.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Search endpoint; override to point at a local proxy.
    pub host: String,
    /// API credential sent with every page request.
    pub api_key: String,
    /// Upper bound on a single page request before it fails as transport error.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            background_size: BackgroundSize::Cover,
            slides_per_request: 15,
            search_text: "landscape".to_owned(),
            interval: Duration::from_secs(5),
            host: FLICKR_API_URL.to_owned(),
            api_key: DEMO_API_KEY.to_owned(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl CarouselConfig {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.slides_per_request > 0,
            "slides-per-request must be greater than zero"
        );
        ensure!(!self.search_text.is_empty(), "search-text must not be empty");
        ensure!(!self.host.is_empty(), "host must not be empty");
        ensure!(!self.api_key.is_empty(), "api-key must not be empty");
        ensure!(
            self.request_timeout > Duration::ZERO,
            "request-timeout must be greater than zero"
        );
        Ok(self)
    }

    /// Interval actually used for autoplay, after clamping to the floor.
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }
}
