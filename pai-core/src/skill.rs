//! Skill Library entry types (spec.md §3 "Skill", §4.11).

use crate::{EntityIdType, SkillAbstractionLevel, SkillId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A precondition or postcondition predicate over context: either a bare
/// `key` presence check or a `key:value` equality check (spec.md §3 "Skill").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub key: String,
    pub value: Option<String>,
}

impl Predicate {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn key_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
        }
    }

    pub fn matches(&self, context: &HashMap<String, String>) -> bool {
        match (&self.value, context.get(&self.key)) {
            (Some(expected), Some(actual)) => expected == actual,
            (None, present) => present.is_some(),
            _ => false,
        }
    }
}

/// One ordered step of a skill's execution template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillStep {
    pub description: String,
    pub file_patterns: Vec<String>,
    pub agent_hint: Option<String>,
}

/// Describes one named parameter a skill accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub param_type: String,
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub description: String,
}

/// A reusable, learned procedure (spec.md §3 "Skill").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    /// Short natural-language description; `"<name> - <description>"` is
    /// the document text embedded for semantic search (spec.md §4.11).
    pub description: String,
    pub abstraction_level: SkillAbstractionLevel,
    pub preconditions: Vec<Predicate>,
    pub postconditions: Vec<Predicate>,
    pub steps: Vec<SkillStep>,
    pub param_specs: HashMap<String, ParamSpec>,
    /// Exponentially-weighted moving average of execution success.
    pub success_rate: f32,
    /// Exponentially-weighted moving average of execution duration.
    pub avg_duration_ms: f64,
    pub use_count: u64,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub last_used: Option<Timestamp>,
}

impl Skill {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        abstraction_level: SkillAbstractionLevel,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SkillId::now_v7(),
            name: name.into(),
            description: description.into(),
            abstraction_level,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            steps: Vec::new(),
            param_specs: HashMap::new(),
            success_rate: 0.0,
            avg_duration_ms: 0.0,
            use_count: 0,
            tags: Vec::new(),
            created_at: now,
            last_used: None,
        }
    }

    pub fn preconditions_met(&self, context: &HashMap<String, String>) -> bool {
        self.preconditions.iter().all(|p| p.matches(context))
    }

    /// The text embedded for semantic search (spec.md §4.11).
    pub fn document_text(&self) -> String {
        format!("{} - {}", self.name, self.description)
    }

    /// Record one execution outcome with an EWMA of weight `alpha` for both
    /// success rate and duration.
    pub fn record_execution(&mut self, succeeded: bool, duration_ms: f64, alpha: f32, now: Timestamp) {
        let sample = if succeeded { 1.0 } else { 0.0 };
        self.success_rate = if self.use_count == 0 {
            sample
        } else {
            alpha * sample + (1.0 - alpha) * self.success_rate
        };
        self.avg_duration_ms = if self.use_count == 0 {
            duration_ms
        } else {
            (alpha as f64) * duration_ms + (1.0 - alpha as f64) * self.avg_duration_ms
        };
        self.use_count += 1;
        self.last_used = Some(now);
    }
}
