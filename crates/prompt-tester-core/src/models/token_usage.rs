use serde::{Deserialize, Serialize};

/// Token usage reported by the provider for a single completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TokenUsage {
    /// Prompt tokens consumed
    pub input_tokens: u32,

    /// Completion tokens generated
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Running statistics for one in-memory thread.
///
/// Token counts and cost accumulate across turns; `latency_ms` is the mean
/// latency of the thread's assistant turns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ThreadStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub latency_ms: f64,
}

impl ThreadStats {
    /// Fold one completed turn into the running totals.
    ///
    /// `previous_turns` is the number of assistant turns already reflected in
    /// `latency_ms`.
    pub fn record_turn(
        &self,
        usage: TokenUsage,
        cost: f64,
        latency_ms: u64,
        previous_turns: usize,
    ) -> Self {
        let n = previous_turns as f64;
        Self {
            input_tokens: self.input_tokens + u64::from(usage.input_tokens),
            output_tokens: self.output_tokens + u64::from(usage.output_tokens),
            cost: self.cost + cost,
            latency_ms: (self.latency_ms * n + latency_ms as f64) / (n + 1.0),
        }
    }
}

/// Aggregate statistics across all threads of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub thread_count: usize,
}
