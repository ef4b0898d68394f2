//! PAI Agents: the Agent Execution Core (spec.md §2 rows G, I, K, L, M).
//!
//! Wires together the Tool Registry, Security Validator, Elevation Manager,
//! Parallel Tool Executor, Agent Runtime, and Subagent into the tool-use
//! loop that drives one agent instance against an abstract `LlmClient`.

mod elevation;
mod executor;
mod registry;
mod runtime;
mod security;
mod subagent;

pub use elevation::{capability_allowed, ElevationDecision, ElevationManager};
pub use executor::{execute_batch, ToolCall, ToolCallOutcome};
pub use registry::{ToolExecutor, ToolRegistry};
pub use runtime::{AgentRuntime, NoopHooks, RuntimeHooks};
pub use security::{SecurityRule, SecurityValidator, SecurityVerdict, ToolNamePattern};
pub use subagent::{read_only_view, Subagent, SubagentResult, DEFAULT_SUBAGENT_ITERATION_CAP};
