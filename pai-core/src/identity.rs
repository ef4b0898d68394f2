//! Identity types for agent-core entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ENTITY ID TYPE SYSTEM
// ============================================================================

/// Trait for type-safe entity IDs.
///
/// Provides compile-time safety so that, e.g., a `TaskId` can never be passed
/// where a `LearningId` is expected, even though both wrap a `Uuid`.
pub trait EntityIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the entity type (e.g., "task", "learning").
    const ENTITY_NAME: &'static str;

    /// Create a new ID from a UUID.
    fn new(uuid: Uuid) -> Self;

    /// Get the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Create a nil (all zeros) ID.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }

    /// Create a new timestamp-sortable UUIDv7 ID.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// Create a new random UUIDv4 ID.
    fn new_v4() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Error type for parsing entity IDs from strings.
#[derive(Debug, Clone)]
pub struct EntityIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub source: uuid::Error,
}

impl fmt::Display for EntityIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse {} ID from '{}': {}",
            self.entity_name, self.input, self.source
        )
    }
}

impl std::error::Error for EntityIdParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Macro to define a type-safe entity ID newtype.
macro_rules! define_entity_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = EntityIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s)
                    .map(Self::new)
                    .map_err(|e| EntityIdParseError {
                        entity_name: Self::ENTITY_NAME,
                        input: s.to_string(),
                        source: e,
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                self.0.serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                Uuid::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

// ============================================================================
// ENTITY ID TYPES
// ============================================================================

define_entity_id!(AgentInstanceId, "agent_instance", "Type-safe ID for a running agent instance.");
define_entity_id!(TaskId, "task", "Type-safe ID for a task request/response pair.");
define_entity_id!(ConversationId, "conversation", "Type-safe ID for a chat conversation.");
define_entity_id!(ProjectId, "project", "Type-safe ID for a project scope.");
define_entity_id!(DomainId, "domain", "Type-safe ID for a domain scope.");
define_entity_id!(UserId, "user", "Type-safe ID for a user.");
define_entity_id!(LearningId, "learning", "Type-safe ID for a stored learning.");
define_entity_id!(SkillId, "skill", "Type-safe ID for a skill library entry.");
define_entity_id!(ElevationGrantId, "elevation_grant", "Type-safe ID for a permission elevation grant.");
define_entity_id!(ToolCallId, "tool_call", "Type-safe ID correlating a tool_use block with its tool_result.");
define_entity_id!(GoalId, "goal", "Type-safe ID for a goal, strategy, challenge, or idea record.");

// ============================================================================
// OTHER IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL and timeout values.
pub type DurationMs = i64;

/// SHA-256 content hash, used by the warm tier's deduplication probe.
pub type ContentHash = [u8; 32];

/// Compute a SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_type_safety() {
        let task_id = TaskId::now_v7();
        let learning_id = LearningId::now_v7();
        assert_ne!(task_id.as_uuid(), learning_id.as_uuid());
    }

    #[test]
    fn entity_id_display() {
        let id = TaskId::new(Uuid::nil());
        assert_eq!(format!("{:?}", id), "TaskId(00000000-0000-0000-0000-000000000000)");
        assert_eq!(format!("{}", id), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn entity_id_from_str_roundtrip() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: TaskId = uuid_str.parse().expect("valid UUID should parse");
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn entity_id_parse_error() {
        let result: Result<TaskId, _> = "not-a-uuid".parse();
        let err = result.unwrap_err();
        assert_eq!(err.entity_name, "task");
    }

    #[test]
    fn entity_id_serde_is_transparent() {
        let id = LearningId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with('"') && json.ends_with('"'));
        let back: LearningId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn content_hash_is_deterministic() {
        assert_eq!(compute_content_hash(b"hello"), compute_content_hash(b"hello"));
        assert_ne!(compute_content_hash(b"hello"), compute_content_hash(b"world"));
    }
}
