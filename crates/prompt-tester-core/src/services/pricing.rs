use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::TokenUsage;
use crate::settings::Settings;

/// Per-token prices in USD
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ModelPricing {
    pub prompt: f64,
    pub completion: f64,
}

impl ModelPricing {
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        f64::from(usage.input_tokens) * self.prompt + f64::from(usage.output_tokens) * self.completion
    }
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: Option<String>,
    pricing: Option<PriceStrings>,
}

/// Prices arrive as decimal strings
#[derive(Deserialize)]
struct PriceStrings {
    prompt: Option<String>,
    completion: Option<String>,
}

fn parse_price(raw: Option<&str>) -> f64 {
    raw.and_then(|p| p.trim().parse::<f64>().ok()).unwrap_or(0.0)
}

#[derive(Default)]
struct PricingState {
    prices: HashMap<String, ModelPricing>,
    fetched_at: Option<Instant>,
}

/// Process-wide model price table.
///
/// Refreshed from the models catalog endpoint when empty or older than the
/// TTL. A failed refresh keeps serving the previous table. Two callers may
/// refresh at the same time; the later write wins.
#[derive(Clone)]
pub struct PricingCache {
    http: reqwest::Client,
    url: String,
    ttl: Duration,
    /// Fixed table that is never refreshed
    fixed: bool,
    state: Arc<Mutex<PricingState>>,
}

impl PricingCache {
    pub fn new(settings: &Settings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(settings.pricing_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build pricing client; requests have no timeout");
                reqwest::Client::new()
            });
        Self {
            http,
            url: settings.pricing_url.clone(),
            ttl: settings.pricing_ttl(),
            fixed: false,
            state: Arc::new(Mutex::new(PricingState::default())),
        }
    }

    /// Cache over a fixed table; no network access
    pub fn with_prices(prices: HashMap<String, ModelPricing>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: String::new(),
            ttl: Duration::MAX,
            fixed: true,
            state: Arc::new(Mutex::new(PricingState {
                prices,
                fetched_at: Some(Instant::now()),
            })),
        }
    }

    fn is_fresh(&self) -> bool {
        let state = self.state.lock();
        !state.prices.is_empty() && state.fetched_at.is_some_and(|at| at.elapsed() < self.ttl)
    }

    async fn fetch(&self) -> Result<HashMap<String, ModelPricing>, reqwest::Error> {
        let response: ModelsResponse = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .data
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id?;
                let pricing = entry.pricing?;
                Some((
                    id,
                    ModelPricing {
                        prompt: parse_price(pricing.prompt.as_deref()),
                        completion: parse_price(pricing.completion.as_deref()),
                    },
                ))
            })
            .collect())
    }

    /// Refresh if stale; never fails
    pub async fn refresh(&self) {
        if self.fixed || self.is_fresh() {
            return;
        }

        match self.fetch().await {
            Ok(prices) => {
                info!(models = prices.len(), "Cached model pricing");
                let mut state = self.state.lock();
                state.prices = prices;
                state.fetched_at = Some(Instant::now());
            }
            Err(e) => warn!(error = %e, "Failed to fetch model pricing; keeping cached prices"),
        }
    }

    pub async fn pricing(&self, model_id: &str) -> Option<ModelPricing> {
        self.refresh().await;
        self.state.lock().prices.get(model_id).copied()
    }

    /// Cost of a completion; 0 when the model has no known price
    pub async fn cost(&self, model_id: &str, usage: TokenUsage) -> f64 {
        self.pricing(model_id)
            .await
            .map(|p| p.cost(usage))
            .unwrap_or(0.0)
    }

    /// Like `cost` but from the current table only, without refreshing
    pub fn cached_cost(&self, model_id: &str, usage: TokenUsage) -> f64 {
        self.state
            .lock()
            .prices
            .get(model_id)
            .map(|p| p.cost(usage))
            .unwrap_or(0.0)
    }
}
