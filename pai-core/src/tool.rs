//! Tool Registry catalog types (spec.md §2 row G, §4.1).

use crate::CapabilityCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Tool names that are always treated as critical regardless of permission
/// level, per spec.md §3 "A tool is 'critical' iff its name is in a fixed,
/// static set." The security validator flags (but does not block) critical
/// tools that require confirmation (spec.md §4.12).
pub const CRITICAL_TOOLS: &[&str] = &[
    "execute_shell",
    "write_file",
    "delete_file",
    "run_code",
    "network_request",
];

pub fn is_critical_tool(name: &str) -> bool {
    CRITICAL_TOOLS.contains(&name)
}

/// The JSON-schema representation of a tool's callable parameters, shipped
/// to the LLM alongside the request (spec.md §6 "LLM contract").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A named capability registered in the Tool Registry (spec.md §3 "Tool").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub required_level: u8,
    pub capability: Option<CapabilityCategory>,
    pub side_effects: bool,
    pub allows_elevation: bool,
    pub max_elevation_level: Option<u8>,
    pub requires_confirmation: bool,
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            required_level: 0,
            capability: None,
            side_effects: false,
            allows_elevation: false,
            max_elevation_level: None,
            requires_confirmation: false,
        }
    }

    pub fn with_required_level(mut self, level: u8) -> Self {
        self.required_level = level;
        self
    }

    pub fn with_capability(mut self, capability: CapabilityCategory) -> Self {
        self.capability = Some(capability);
        self
    }

    pub fn with_side_effects(mut self, side_effects: bool) -> Self {
        self.side_effects = side_effects;
        self
    }

    pub fn with_elevation(mut self, max_level: u8) -> Self {
        self.allows_elevation = true;
        self.max_elevation_level = Some(max_level);
        self
    }

    pub fn with_requires_confirmation(mut self, requires_confirmation: bool) -> Self {
        self.requires_confirmation = requires_confirmation;
        self
    }

    pub fn is_critical(&self) -> bool {
        is_critical_tool(&self.name)
    }

    /// spec.md §3 invariant: "a tool's effective elevation ceiling is at most
    /// its permission level unless `allows_elevation` is true."
    pub fn effective_elevation_ceiling(&self) -> u8 {
        if self.allows_elevation {
            self.max_elevation_level.unwrap_or(self.required_level)
        } else {
            self.required_level
        }
    }

    pub fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Outcome of a single tool invocation (spec.md §3 "ToolResult", §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<Value>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stringified content for the `tool_result` content block (spec.md §8 S1).
    pub fn as_content_string(&self) -> String {
        if self.success {
            self.output
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default()
        } else {
            self.error.clone().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_tool_detection() {
        assert!(is_critical_tool("execute_shell"));
        assert!(!is_critical_tool("list_files"));
    }

    #[test]
    fn elevation_ceiling_respects_invariant() {
        let plain = Tool::new("list_files", "list", serde_json::json!({})).with_required_level(1);
        assert_eq!(plain.effective_elevation_ceiling(), 1);

        let elevatable =
            Tool::new("write_file", "write", serde_json::json!({})).with_required_level(1).with_elevation(3);
        assert_eq!(elevatable.effective_elevation_ceiling(), 3);
    }

    #[test]
    fn tool_result_ok_and_fail() {
        let ok = ToolResult::ok(serde_json::json!(["a", "b"]));
        assert!(ok.success);
        assert_eq!(ok.as_content_string(), "[\"a\",\"b\"]");

        let fail = ToolResult::fail("Permission denied: insufficient level");
        assert!(!fail.success);
        assert_eq!(fail.as_content_string(), "Permission denied: insufficient level");
    }
}
