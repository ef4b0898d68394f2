//! Learning record stored by PAI Memory (spec.md §3 "Learning", §4.6-§4.9).

use crate::{
    AgentInstanceId, DomainId, EntityIdType, LearningId, MemoryError, MemoryScope, Phase, ProjectId,
    Sensitivity, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single unit of extracted knowledge, routed through the quality gate and
/// deduplication before it lands in a tier (spec.md §4.6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Learning {
    pub id: LearningId,
    pub content: String,
    pub phase: Phase,
    pub category: String,
    pub task_id: Option<crate::TaskId>,
    pub agent_type: Option<String>,
    pub confidence: f32,
    pub tags: Vec<String>,
    pub creator_agent: AgentInstanceId,
    pub required_permission_level: u8,
    pub sensitivity: Sensitivity,
    pub allowed_agents: Option<Vec<String>>,
    pub scope: MemoryScope,
    pub project_id: Option<ProjectId>,
    pub domain_id: Option<DomainId>,
    pub utility_score: f32,
    pub access_count: u64,
    pub last_accessed: Timestamp,
    pub created_at: Timestamp,
    pub metadata: HashMap<String, Value>,
}

impl Learning {
    pub fn new(
        content: impl Into<String>,
        phase: Phase,
        category: impl Into<String>,
        creator_agent: AgentInstanceId,
        scope: MemoryScope,
        now: Timestamp,
    ) -> Self {
        Self {
            id: LearningId::now_v7(),
            content: content.into(),
            phase,
            category: category.into(),
            task_id: None,
            agent_type: None,
            confidence: 0.5,
            tags: Vec::new(),
            creator_agent,
            required_permission_level: 0,
            sensitivity: Sensitivity::default(),
            allowed_agents: None,
            scope,
            project_id: None,
            domain_id: None,
            utility_score: 0.5,
            access_count: 0,
            last_accessed: now,
            created_at: now,
            metadata: HashMap::new(),
        }
    }

    /// spec.md §3 invariants: scope=PROJECT requires a project id; scope=DOMAIN
    /// requires a domain id; sensitivity=restricted requires a non-empty
    /// allowed-agent list to be meaningful.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.scope == MemoryScope::Project && self.project_id.is_none() {
            return Err(MemoryError::InvalidScope {
                reason: "scope=PROJECT requires project_id".to_string(),
            });
        }
        if self.scope == MemoryScope::Domain && self.domain_id.is_none() {
            return Err(MemoryError::InvalidScope {
                reason: "scope=DOMAIN requires domain_id".to_string(),
            });
        }
        if self.sensitivity == Sensitivity::Restricted {
            let has_allowed = self
                .allowed_agents
                .as_ref()
                .map(|agents| !agents.is_empty())
                .unwrap_or(false);
            if !has_allowed {
                return Err(MemoryError::InvalidScope {
                    reason: "sensitivity=restricted requires a non-empty allowed-agent list"
                        .to_string(),
                });
            }
        }
        Ok(())
    }

    /// Quality gate thresholds (spec.md §4.6 "store_learning"): content length
    /// at least 20, confidence at least 0.40, and an alpha-character ratio of
    /// at least 0.40.
    pub fn passes_quality_gate(&self, min_content_length: usize, min_confidence: f32, min_alpha_ratio: f32) -> bool {
        if self.content.len() < min_content_length {
            return false;
        }
        if self.confidence < min_confidence {
            return false;
        }
        alpha_ratio(&self.content) >= min_alpha_ratio
    }

    pub fn record_access(&mut self, now: Timestamp) {
        self.access_count += 1;
        self.last_accessed = now;
    }

    /// spec.md §4.9 utility feedback: boost on retrieval-and-use, decay on
    /// retrieval-and-ignore, clamped to [0, 1].
    pub fn boost_utility(&mut self, amount: f32) {
        self.utility_score = (self.utility_score + amount).clamp(0.0, 1.0);
    }

    pub fn decay_utility(&mut self, amount: f32) {
        self.utility_score = (self.utility_score - amount).clamp(0.0, 1.0);
    }

    /// spec.md §4.6 step 4: `category ∈ {tool_success, tool_error, tool_pattern}`
    /// is classified as a pattern, else a learning.
    pub fn is_pattern(&self) -> bool {
        matches!(
            self.category.as_str(),
            "tool_success" | "tool_error" | "tool_pattern"
        )
    }
}

fn alpha_ratio(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    alpha as f32 / text.chars().count() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Learning {
        Learning::new(
            "Use -y flag for noninteractive apt",
            Phase::Execute,
            "cli",
            AgentInstanceId::now_v7(),
            MemoryScope::Global,
            Timestamp::from_timestamp(0, 0).unwrap(),
        )
    }

    #[test]
    fn global_scope_needs_no_project_or_domain() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn project_scope_requires_project_id() {
        let mut l = sample();
        l.scope = MemoryScope::Project;
        assert!(l.validate().is_err());
        l.project_id = Some(ProjectId::now_v7());
        assert!(l.validate().is_ok());
    }

    #[test]
    fn restricted_sensitivity_requires_allowed_agents() {
        let mut l = sample();
        l.sensitivity = Sensitivity::Restricted;
        assert!(l.validate().is_err());
        l.allowed_agents = Some(vec!["infra".to_string()]);
        assert!(l.validate().is_ok());
    }

    #[test]
    fn quality_gate_rejects_short_content() {
        let mut l = sample();
        l.content = "ok".to_string();
        assert!(!l.passes_quality_gate(20, 0.40, 0.40));
    }

    #[test]
    fn quality_gate_rejects_low_confidence() {
        let mut l = sample();
        l.confidence = 0.1;
        assert!(!l.passes_quality_gate(20, 0.40, 0.40));
    }

    #[test]
    fn quality_gate_accepts_well_formed_learning() {
        assert!(sample().passes_quality_gate(20, 0.40, 0.40));
    }

    #[test]
    fn utility_score_clamps_to_unit_interval() {
        let mut l = sample();
        l.utility_score = 0.95;
        l.boost_utility(0.1);
        assert_eq!(l.utility_score, 1.0);
        l.decay_utility(2.0);
        assert_eq!(l.utility_score, 0.0);
    }

    #[test]
    fn pattern_categories_are_classified() {
        let mut l = sample();
        l.category = "tool_success".to_string();
        assert!(l.is_pattern());
        l.category = "insight".to_string();
        assert!(!l.is_pattern());
    }
}
