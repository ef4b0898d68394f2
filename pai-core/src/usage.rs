//! Token and cost accounting for LLM calls (spec.md §4.4 "Accumulate
//! input/output/cached tokens, total cost").

use serde::{Deserialize, Serialize};

/// Per-1k-token pricing for a model, used to compute `total_cost`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
}

impl ModelPricing {
    pub fn new(input_price_per_1k: f64, output_price_per_1k: f64) -> Self {
        Self {
            input_price_per_1k,
            output_price_per_1k,
        }
    }

    /// `cost = input_tokens*input_price_per_1k/1000 + output_tokens*output_price_per_1k/1000`.
    pub fn cost_for(&self, input_tokens: i64, output_tokens: i64) -> f64 {
        (input_tokens as f64) * self.input_price_per_1k / 1000.0
            + (output_tokens as f64) * self.output_price_per_1k / 1000.0
    }
}

/// Cumulative token and cost usage, additive across LLM calls within a task
/// (spec.md §8 S1: `usage:{input_tokens,output_tokens,total_cost}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Usage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_tokens: i64,
    pub total_cost: f64,
}

impl Usage {
    pub fn new(input_tokens: i64, output_tokens: i64, cached_tokens: i64, total_cost: f64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            cached_tokens,
            total_cost,
        }
    }

    /// Record one LLM call's usage into the running total.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cached_tokens += other.cached_tokens;
        self.total_cost += other.total_cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_computes_additive_cost() {
        let pricing = ModelPricing::new(3.0, 15.0);
        let cost = pricing.cost_for(1000, 500);
        assert!((cost - (3.0 + 7.5)).abs() < 1e-9);
    }

    #[test]
    fn usage_accumulates_across_calls() {
        let mut total = Usage::default();
        total.accumulate(&Usage::new(100, 50, 0, 0.01));
        total.accumulate(&Usage::new(200, 75, 10, 0.02));
        assert_eq!(total.input_tokens, 300);
        assert_eq!(total.output_tokens, 125);
        assert_eq!(total.cached_tokens, 10);
        assert!((total.total_cost - 0.03).abs() < 1e-9);
    }
}
