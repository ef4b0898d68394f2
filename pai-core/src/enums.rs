//! Enum types shared by the agent execution core and the memory pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a running agent instance (spec.md §3 "Agent State").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Offline,
}

impl AgentStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgentStatus::Idle => "IDLE",
            AgentStatus::Busy => "BUSY",
            AgentStatus::Offline => "OFFLINE",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "IDLE" => Ok(AgentStatus::Idle),
            "BUSY" => Ok(AgentStatus::Busy),
            "OFFLINE" => Ok(AgentStatus::Offline),
            _ => Err(EnumParseError::new("AgentStatus", s)),
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for AgentStatus {
    type Err = EnumParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Task-control state of the agentic loop (spec.md §4.4 "Task control semantics").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskControlState {
    #[default]
    Running,
    Paused,
    Cancelled,
    Completed,
}

impl TaskControlState {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            TaskControlState::Running => "RUNNING",
            TaskControlState::Paused => "PAUSED",
            TaskControlState::Cancelled => "CANCELLED",
            TaskControlState::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for TaskControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Status of a completed/failed task response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// One of the seven PAI abstraction phases (spec.md GLOSSARY "PAI phase").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Observe,
    Think,
    Plan,
    Build,
    Execute,
    Verify,
    Learn,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Observe,
        Phase::Think,
        Phase::Plan,
        Phase::Build,
        Phase::Execute,
        Phase::Verify,
        Phase::Learn,
    ];

    pub fn as_db_str(&self) -> &'static str {
        match self {
            Phase::Observe => "OBSERVE",
            Phase::Think => "THINK",
            Phase::Plan => "PLAN",
            Phase::Build => "BUILD",
            Phase::Execute => "EXECUTE",
            Phase::Verify => "VERIFY",
            Phase::Learn => "LEARN",
        }
    }

    pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
        match s.to_uppercase().as_str() {
            "OBSERVE" => Ok(Phase::Observe),
            "THINK" => Ok(Phase::Think),
            "PLAN" => Ok(Phase::Plan),
            "BUILD" => Ok(Phase::Build),
            "EXECUTE" => Ok(Phase::Execute),
            "VERIFY" => Ok(Phase::Verify),
            "LEARN" => Ok(Phase::Learn),
            _ => Err(EnumParseError::new("Phase", s)),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Phase {
    type Err = EnumParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Isolation scope of a stored learning (spec.md §3 "Learning", GLOSSARY "Scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryScope {
    Global,
    Project,
    Domain,
}

impl MemoryScope {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MemoryScope::Global => "GLOBAL",
            MemoryScope::Project => "PROJECT",
            MemoryScope::Domain => "DOMAIN",
        }
    }
}

impl fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Sensitivity tier that gates ACL evaluation (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Sensitivity {
    #[default]
    Public,
    Internal,
    Restricted,
}

impl Sensitivity {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Sensitivity::Public => "public",
            Sensitivity::Internal => "internal",
            Sensitivity::Restricted => "restricted",
        }
    }
}

impl fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Abstraction level of a skill (spec.md §3 "Skill").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkillAbstractionLevel {
    Primitive,
    Skill,
    Workflow,
}

/// Capability category a tool is tagged with (spec.md §3 "Tool").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityCategory {
    System,
    File,
    Network,
    Code,
    Web,
    Monitoring,
}

impl CapabilityCategory {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            CapabilityCategory::System => "SYSTEM",
            CapabilityCategory::File => "FILE",
            CapabilityCategory::Network => "NETWORK",
            CapabilityCategory::Code => "CODE",
            CapabilityCategory::Web => "WEB",
            CapabilityCategory::Monitoring => "MONITORING",
        }
    }
}

impl fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Stop reason reported by the LLM contract (spec.md §6 "LLM contract").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    Other,
}

/// Role of a conversation message (spec.md §3 "Conversation Message").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Named model tiers the LLM contract selects between (spec.md §2 row A, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Powerful,
}

/// Error returned when a `*_db_str` parse fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub enum_name: &'static str,
    pub input: String,
}

impl EnumParseError {
    fn new(enum_name: &'static str, input: &str) -> Self {
        Self {
            enum_name,
            input: input.to_string(),
        }
    }
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.enum_name, self.input)
    }
}

impl std::error::Error for EnumParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_status_roundtrip() {
        for s in [AgentStatus::Idle, AgentStatus::Busy, AgentStatus::Offline] {
            assert_eq!(AgentStatus::from_db_str(s.as_db_str()).unwrap(), s);
        }
    }

    #[test]
    fn phase_roundtrip_all_seven() {
        for p in Phase::ALL {
            assert_eq!(Phase::from_db_str(p.as_db_str()).unwrap(), p);
        }
    }

    #[test]
    fn phase_parse_is_case_insensitive() {
        assert_eq!(Phase::from_str("observe").unwrap(), Phase::Observe);
    }

    #[test]
    fn phase_parse_rejects_unknown() {
        assert!(Phase::from_db_str("SLEEP").is_err());
    }
}
