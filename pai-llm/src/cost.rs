//! Cost tracking: asynchronous recording of `Usage` per LLM call (spec.md
//! §4.4 step f "record usage to the cost tracker asynchronously").

use pai_core::{ModelPricing, Usage};
use std::collections::HashMap;
use std::sync::RwLock;

/// Per-model pricing, used to compute `total_cost` on every recorded call.
#[derive(Debug, Default)]
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, model_id: impl Into<String>, pricing: ModelPricing) {
        self.prices.write().expect("pricing table poisoned").insert(model_id.into(), pricing);
    }

    pub fn get(&self, model_id: &str) -> Option<ModelPricing> {
        self.prices.read().ok()?.get(model_id).copied()
    }
}

/// Cumulative usage tracker across every LLM call made through this process
/// (spec.md §4.4 step f "increment Prometheus counters").
#[derive(Debug, Default)]
pub struct TrackedCostTracker {
    total: RwLock<Usage>,
    pricing: PricingTable,
}

impl TrackedCostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pricing(&self, model_id: impl Into<String>, pricing: ModelPricing) {
        self.pricing.set(model_id, pricing);
    }

    /// Record one call's token usage, computing cost from the registered
    /// pricing table if present (defaulting to zero cost otherwise).
    pub fn record(&self, model_id: &str, input_tokens: i64, output_tokens: i64, cached_tokens: i64) -> Usage {
        let cost = self
            .pricing
            .get(model_id)
            .map(|p| p.cost_for(input_tokens, output_tokens))
            .unwrap_or(0.0);
        let usage = Usage::new(input_tokens, output_tokens, cached_tokens, cost);
        self.total.write().expect("cost tracker poisoned").accumulate(&usage);
        usage
    }

    pub fn total(&self) -> Usage {
        *self.total.read().expect("cost tracker poisoned")
    }

    pub fn reset(&self) {
        *self.total.write().expect("cost tracker poisoned") = Usage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_computes_cost_from_pricing_table() {
        let tracker = TrackedCostTracker::new();
        tracker.set_pricing("claude-balanced", ModelPricing::new(3.0, 15.0));
        let usage = tracker.record("claude-balanced", 1000, 500, 0);
        assert!((usage.total_cost - 10.5).abs() < 1e-9);
        assert_eq!(tracker.total().input_tokens, 1000);
    }

    #[test]
    fn record_without_pricing_is_zero_cost() {
        let tracker = TrackedCostTracker::new();
        let usage = tracker.record("unknown-model", 100, 50, 0);
        assert_eq!(usage.total_cost, 0.0);
    }

    #[test]
    fn total_accumulates_across_calls() {
        let tracker = TrackedCostTracker::new();
        tracker.set_pricing("m", ModelPricing::new(1.0, 1.0));
        tracker.record("m", 100, 100, 0);
        tracker.record("m", 100, 100, 0);
        assert_eq!(tracker.total().input_tokens, 200);
    }
}
