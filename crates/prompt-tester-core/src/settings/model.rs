use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PRICING_URL: &str = "https://openrouter.ai/api/v1/models";

/// Application settings persisted as JSON. Missing fields take their
/// defaults so older files keep loading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the OpenAI-compatible aggregation API
    pub api_base_url: String,
    /// Models catalog endpoint used for pricing
    pub pricing_url: String,
    /// Database location; `None` uses the platform config directory
    pub database_path: Option<PathBuf>,
    pub http_referer: String,
    pub app_title: String,
    pub pricing_ttl_secs: u64,
    /// Request timeout for the pricing catalog fetch
    pub pricing_timeout_secs: u64,
    pub max_stream_duration_secs: u64,
    pub max_repeat_count: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            pricing_url: DEFAULT_PRICING_URL.to_string(),
            database_path: None,
            http_referer: "http://localhost:3000".to_string(),
            app_title: "Prompt Tester".to_string(),
            pricing_ttl_secs: 24 * 60 * 60,
            pricing_timeout_secs: 10,
            max_stream_duration_secs: 300,
            max_repeat_count: 10,
        }
    }
}

impl Settings {
    pub fn pricing_ttl(&self) -> Duration {
        Duration::from_secs(self.pricing_ttl_secs)
    }

    pub fn pricing_timeout(&self) -> Duration {
        Duration::from_secs(self.pricing_timeout_secs)
    }

    pub fn max_stream_duration(&self) -> Duration {
        Duration::from_secs(self.max_stream_duration_secs)
    }
}
