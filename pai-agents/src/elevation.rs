//! Elevation Manager (SPEC_FULL.md §4.13): requests a temporary permission
//! bump for one tool call, auto-approving low-risk requests and mirroring
//! every issued grant to the key-value store under `pai:elevation:<id>`.

use pai_core::{
    is_critical_tool, CapabilityCategory, ElevationGrant, ElevationGrantId, EntityIdType, PaiResult,
    PermissionContext, TaskId, Timestamp,
};
use pai_storage::KeyValueStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Decision returned by `request_elevation` (SPEC_FULL.md §3.1/§4.13).
#[derive(Debug, Clone, PartialEq)]
pub enum ElevationDecision {
    /// Granted immediately; the grant is already installed on the context.
    Approved(ElevationGrant),
    /// Needs supervisor sign-off, published to `agent:responses`.
    Pending { grant_id: ElevationGrantId },
}

const DEFAULT_GRANT_TTL_SECS: i64 = 300;

/// Tracks in-flight elevation grants for one agent instance and mirrors them
/// to the key-value store so another process can observe pending requests.
pub struct ElevationManager {
    kv: Arc<dyn KeyValueStore>,
    grants: Mutex<HashMap<ElevationGrantId, ElevationGrant>>,
}

fn elevation_key(id: ElevationGrantId) -> String {
    format!("pai:elevation:{id}")
}

impl ElevationManager {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv, grants: Mutex::new(HashMap::new()) }
    }

    /// spec.md §3.1 resolved Open Question: auto-approved iff the requested
    /// bump is at most one level above the context's base level AND the
    /// tool is not in the fixed critical-tools set; otherwise the request
    /// is left `Pending` for a supervisor to approve out of band.
    fn auto_approved(base_level: u8, target_level: u8, tool_name: &str) -> bool {
        target_level.saturating_sub(base_level) <= 1 && !is_critical_tool(tool_name)
    }

    /// Requests a bump to `target_level` for `tool_name` on behalf of
    /// `task_id`. On approval, installs the grant onto `context` directly so
    /// the caller's next `current_level` call reflects it.
    pub async fn request_elevation(
        &self,
        context: &mut PermissionContext,
        target_level: u8,
        tool_name: &str,
        task_id: TaskId,
        reason_tag: impl Into<String>,
        justification: impl Into<String>,
        now: Timestamp,
    ) -> PaiResult<ElevationDecision> {
        let grant = ElevationGrant {
            id: ElevationGrantId::now_v7(),
            target_level,
            tool_name: tool_name.to_string(),
            task_id,
            reason_tag: reason_tag.into(),
            justification: justification.into(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(DEFAULT_GRANT_TTL_SECS),
        };

        self.mirror_grant(&grant).await?;
        self.grants.lock().await.insert(grant.id, grant.clone());

        if Self::auto_approved(context.base_level, target_level, tool_name) {
            context.install_grant(grant.clone());
            Ok(ElevationDecision::Approved(grant))
        } else {
            Ok(ElevationDecision::Pending { grant_id: grant.id })
        }
    }

    /// Supervisor approval path for a `Pending` grant: installs it onto
    /// `context` if it has not already expired.
    pub async fn approve(&self, context: &mut PermissionContext, grant_id: ElevationGrantId, now: Timestamp) -> PaiResult<bool> {
        let grant = { self.grants.lock().await.get(&grant_id).cloned() };
        match grant {
            Some(grant) if !grant.is_expired_at(now) => {
                context.install_grant(grant);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn revoke(&self, grant_id: ElevationGrantId) -> PaiResult<()> {
        self.grants.lock().await.remove(&grant_id);
        self.kv.delete(&elevation_key(grant_id)).await?;
        Ok(())
    }

    async fn mirror_grant(&self, grant: &ElevationGrant) -> PaiResult<()> {
        let serialized = serde_json::to_string(grant).unwrap_or_default();
        let ttl = (grant.expires_at - grant.issued_at).num_seconds().max(1);
        self.kv.set(&elevation_key(grant.id), &serialized, Some(ttl)).await
    }
}

/// Whether `capability` is permitted for `context` at `now`, combining the
/// capability allow-list with the effective (possibly elevated) level.
pub fn capability_allowed(context: &PermissionContext, capability: CapabilityCategory, required_level: u8, now: Timestamp) -> bool {
    context.allows_capability(capability) && context.current_level(now) >= required_level
}

#[cfg(test)]
mod tests {
    use super::*;
    use pai_storage::MemoryKeyValueStore;

    fn manager() -> ElevationManager {
        ElevationManager::new(Arc::new(MemoryKeyValueStore::new()))
    }

    #[tokio::test]
    async fn small_bump_on_non_critical_tool_auto_approves() {
        let manager = manager();
        let mut context = PermissionContext::new("build", 1);
        let now = Timestamp::from_timestamp(1000, 0).unwrap();

        let decision = manager
            .request_elevation(&mut context, 2, "list_files", TaskId::now_v7(), "auto", "need to list files", now)
            .await
            .unwrap();

        assert!(matches!(decision, ElevationDecision::Approved(_)));
        assert_eq!(context.current_level(now), 2);
    }

    #[tokio::test]
    async fn critical_tool_always_pends() {
        let manager = manager();
        let mut context = PermissionContext::new("build", 1);
        let now = Timestamp::from_timestamp(1000, 0).unwrap();

        let decision = manager
            .request_elevation(&mut context, 2, "execute_shell", TaskId::now_v7(), "auto", "run a command", now)
            .await
            .unwrap();

        assert!(matches!(decision, ElevationDecision::Pending { .. }));
        assert_eq!(context.current_level(now), 1);
    }

    #[tokio::test]
    async fn large_jump_pends_even_for_noncritical_tool() {
        let manager = manager();
        let mut context = PermissionContext::new("build", 0);
        let now = Timestamp::from_timestamp(1000, 0).unwrap();

        let decision = manager
            .request_elevation(&mut context, 3, "list_files", TaskId::now_v7(), "auto", "need deep access", now)
            .await
            .unwrap();

        assert!(matches!(decision, ElevationDecision::Pending { .. }));
    }

    #[tokio::test]
    async fn supervisor_can_approve_a_pending_grant() {
        let manager = manager();
        let mut context = PermissionContext::new("build", 1);
        let now = Timestamp::from_timestamp(1000, 0).unwrap();

        let decision = manager
            .request_elevation(&mut context, 2, "execute_shell", TaskId::now_v7(), "auto", "run a command", now)
            .await
            .unwrap();
        let grant_id = match decision {
            ElevationDecision::Pending { grant_id } => grant_id,
            _ => panic!("expected pending"),
        };

        let approved = manager.approve(&mut context, grant_id, now).await.unwrap();
        assert!(approved);
        assert_eq!(context.current_level(now), 2);
    }
}
