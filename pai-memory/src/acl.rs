//! Access control evaluation over learnings (spec.md §4.9): a fixed,
//! ordered rule set, biased toward allowing access rather than denying it.

use pai_core::{Learning, Sensitivity};

/// The requesting side of an ACL check: who is asking, and at what
/// permission level.
#[derive(Debug, Clone, Copy)]
pub struct Requester<'a> {
    pub agent_type: &'a str,
    pub permission_level: u8,
}

/// spec.md §4.9, evaluated in order:
/// 1. creator always allowed; 2. supervisor (level >= 4) always allowed;
/// 3. public learnings always allowed; 4. internal learnings require
/// `permission_level >= L.required_permission_level`; 5. restricted
/// learnings require `agent_type` to be in the allow list; 6. default
/// allow (bias toward productivity).
pub fn can_access(learning: &Learning, requester: Requester<'_>) -> bool {
    if learning.agent_type.as_deref() == Some(requester.agent_type) {
        return true;
    }
    if requester.permission_level >= 4 {
        return true;
    }
    match learning.sensitivity {
        Sensitivity::Public => true,
        Sensitivity::Internal => requester.permission_level >= learning.required_permission_level,
        Sensitivity::Restricted => learning
            .allowed_agents
            .as_ref()
            .map(|agents| agents.iter().any(|a| a == requester.agent_type))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_core::{AgentInstanceId, EntityIdType, MemoryScope, Phase, Timestamp};

    fn base_learning() -> Learning {
        let mut l = Learning::new(
            "Use -y for noninteractive apt installs",
            Phase::Execute,
            "cli",
            AgentInstanceId::now_v7(),
            MemoryScope::Global,
            Timestamp::from_timestamp(0, 0).unwrap(),
        );
        l.agent_type = Some("infra".to_string());
        l
    }

    fn requester(agent_type: &str, level: u8) -> Requester<'_> {
        Requester { agent_type, permission_level: level }
    }

    #[test]
    fn creator_agent_type_always_allowed() {
        let mut l = base_learning();
        l.sensitivity = Sensitivity::Restricted;
        assert!(can_access(&l, requester("infra", 0)));
    }

    #[test]
    fn supervisor_level_bypasses_sensitivity() {
        let mut l = base_learning();
        l.agent_type = Some("infra".to_string());
        l.sensitivity = Sensitivity::Restricted;
        assert!(can_access(&l, requester("other", 4)));
    }

    #[test]
    fn public_learning_is_always_allowed() {
        let l = base_learning();
        assert!(can_access(&l, requester("other", 0)));
    }

    #[test]
    fn internal_requires_sufficient_permission_level() {
        let mut l = base_learning();
        l.sensitivity = Sensitivity::Internal;
        l.required_permission_level = 2;
        assert!(!can_access(&l, requester("other", 1)));
        assert!(can_access(&l, requester("other", 2)));
    }

    #[test]
    fn restricted_requires_membership_in_allow_list() {
        let mut l = base_learning();
        l.sensitivity = Sensitivity::Restricted;
        l.allowed_agents = Some(vec!["qa".to_string()]);
        assert!(!can_access(&l, requester("other", 0)));
        assert!(can_access(&l, requester("qa", 0)));
    }

    #[test]
    fn restricted_without_an_allow_list_denies_non_creators() {
        let mut l = base_learning();
        l.sensitivity = Sensitivity::Restricted;
        l.allowed_agents = None;
        assert!(!can_access(&l, requester("other", 0)));
    }
}
