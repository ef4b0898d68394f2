//! Permission context and elevation grants (spec.md §3 "Permission Context",
//! "Elevation Grant", §4.13).

use crate::{CapabilityCategory, ElevationGrantId, EntityIdType, TaskId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An issued (or pending) permission elevation. Immutable once issued;
/// revocation is modeled as expiry, never mutation (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationGrant {
    pub id: ElevationGrantId,
    pub target_level: u8,
    pub tool_name: String,
    pub task_id: TaskId,
    pub reason_tag: String,
    pub justification: String,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ElevationGrant {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Per-agent permission state (spec.md §3 "Permission Context").
///
/// Created at agent start and active for the lifetime of the agent; grants
/// are issued and expire independently of the context's own lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionContext {
    pub agent_type: String,
    pub base_level: u8,
    /// Empty set means all capabilities are allowed.
    pub allowed_capabilities: HashSet<CapabilityCategory>,
    pub elevation_ceiling: Option<u8>,
    pub active_grant: Option<ElevationGrant>,
}

impl PermissionContext {
    pub fn new(agent_type: impl Into<String>, base_level: u8) -> Self {
        Self {
            agent_type: agent_type.into(),
            base_level,
            allowed_capabilities: HashSet::new(),
            elevation_ceiling: None,
            active_grant: None,
        }
    }

    pub fn with_allowed_capabilities(mut self, capabilities: impl IntoIterator<Item = CapabilityCategory>) -> Self {
        self.allowed_capabilities = capabilities.into_iter().collect();
        self
    }

    pub fn with_elevation_ceiling(mut self, ceiling: u8) -> Self {
        self.elevation_ceiling = Some(ceiling);
        self
    }

    /// The active grant's level if one exists and has not expired as of `now`,
    /// otherwise the base level (spec.md §3).
    pub fn current_level(&self, now: Timestamp) -> u8 {
        match &self.active_grant {
            Some(grant) if !grant.is_expired_at(now) => grant.target_level,
            _ => self.base_level,
        }
    }

    pub fn allows_capability(&self, capability: CapabilityCategory) -> bool {
        self.allowed_capabilities.is_empty() || self.allowed_capabilities.contains(&capability)
    }

    pub fn install_grant(&mut self, grant: ElevationGrant) {
        self.active_grant = Some(grant);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn grant(target_level: u8, issued_at: Timestamp, ttl_secs: i64) -> ElevationGrant {
        ElevationGrant {
            id: ElevationGrantId::now_v7(),
            target_level,
            tool_name: "write_file".to_string(),
            task_id: TaskId::now_v7(),
            reason_tag: "auto".to_string(),
            justification: "needed to write config".to_string(),
            issued_at,
            expires_at: issued_at + Duration::seconds(ttl_secs),
        }
    }

    #[test]
    fn current_level_falls_back_to_base_when_no_grant() {
        let ctx = PermissionContext::new("infra", 1);
        assert_eq!(ctx.current_level(Timestamp::from_timestamp(0, 0).unwrap()), 1);
    }

    #[test]
    fn current_level_uses_active_unexpired_grant() {
        let now = Timestamp::from_timestamp(1000, 0).unwrap();
        let mut ctx = PermissionContext::new("infra", 1);
        ctx.install_grant(grant(3, now, 60));
        assert_eq!(ctx.current_level(now), 3);
    }

    #[test]
    fn current_level_ignores_expired_grant() {
        let issued = Timestamp::from_timestamp(1000, 0).unwrap();
        let later = issued + Duration::seconds(120);
        let mut ctx = PermissionContext::new("infra", 1);
        ctx.install_grant(grant(3, issued, 60));
        assert_eq!(ctx.current_level(later), 1);
    }

    #[test]
    fn empty_capability_set_allows_everything() {
        let ctx = PermissionContext::new("infra", 1);
        assert!(ctx.allows_capability(CapabilityCategory::System));
    }

    #[test]
    fn nonempty_capability_set_restricts() {
        let ctx = PermissionContext::new("infra", 1)
            .with_allowed_capabilities([CapabilityCategory::File]);
        assert!(ctx.allows_capability(CapabilityCategory::File));
        assert!(!ctx.allows_capability(CapabilityCategory::Network));
    }
}
