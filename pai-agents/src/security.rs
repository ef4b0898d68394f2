//! Security Validator (spec.md §2 row I, SPEC_FULL.md §4.12): a pattern/rule
//! based pre-flight check on tool name + arguments, run before the tool
//! registry is even consulted.

use pai_core::{CapabilityCategory, Tool};
use serde_json::Value;

/// What a rule decided about one call.
#[derive(Debug, Clone, PartialEq)]
pub enum SecurityVerdict {
    Allowed,
    Blocked { reason: String },
}

impl SecurityVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked { .. })
    }
}

/// Which tools a rule applies to.
pub enum ToolNamePattern {
    Any,
    Capability(CapabilityCategory),
    Name(&'static str),
}

impl ToolNamePattern {
    fn matches(&self, tool: &Tool) -> bool {
        match self {
            Self::Any => true,
            Self::Capability(capability) => tool.capability == Some(*capability),
            Self::Name(name) => tool.name == *name,
        }
    }
}

/// One ordered check (SPEC_FULL.md §4.12 `SecurityRule`).
pub struct SecurityRule {
    pub name: &'static str,
    pub applies_to: ToolNamePattern,
    pub check: fn(&Value) -> SecurityVerdict,
}

const SHELL_METACHARACTERS: &[&str] = &[";", "&&", "`", "$("];

fn args_as_strings(args: &Value) -> Vec<&str> {
    match args {
        Value::Object(map) => map.values().filter_map(|v| v.as_str()).collect(),
        Value::String(s) => vec![s.as_str()],
        _ => Vec::new(),
    }
}

fn deny_shell_metacharacters(args: &Value) -> SecurityVerdict {
    for value in args_as_strings(args) {
        if let Some(found) = SHELL_METACHARACTERS.iter().find(|pat| value.contains(**pat)) {
            return SecurityVerdict::Blocked {
                reason: format!("argument contains shell metacharacter '{found}'"),
            };
        }
    }
    SecurityVerdict::Allowed
}

fn deny_path_traversal(args: &Value) -> SecurityVerdict {
    for value in args_as_strings(args) {
        if value.split('/').any(|segment| segment == "..") {
            return SecurityVerdict::Blocked {
                reason: format!("path argument '{value}' traverses outside its root"),
            };
        }
    }
    SecurityVerdict::Allowed
}

/// Ordered list of security rules, run against every tool call before
/// dispatch (spec.md §4.12).
pub struct SecurityValidator {
    rules: Vec<SecurityRule>,
}

impl SecurityValidator {
    /// The built-in rules grounded on `system_tools.py`'s shell-injection and
    /// path-traversal checks (SPEC_FULL.md §4.12).
    pub fn with_default_rules() -> Self {
        Self {
            rules: vec![
                SecurityRule {
                    name: "deny_shell_metacharacters",
                    applies_to: ToolNamePattern::Capability(CapabilityCategory::System),
                    check: deny_shell_metacharacters,
                },
                SecurityRule {
                    name: "deny_path_traversal",
                    applies_to: ToolNamePattern::Capability(CapabilityCategory::File),
                    check: deny_path_traversal,
                },
            ],
        }
    }

    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: SecurityRule) {
        self.rules.push(rule);
    }

    /// Runs every rule whose pattern matches `tool`, returning the first
    /// `Blocked` verdict, or `Allowed` if none blocked.
    pub fn validate(&self, tool: &Tool, args: &Value) -> SecurityVerdict {
        for rule in &self.rules {
            if !rule.applies_to.matches(tool) {
                continue;
            }
            let verdict = (rule.check)(args);
            if verdict.is_blocked() {
                return verdict;
            }
        }
        SecurityVerdict::Allowed
    }

    /// Whether `tool` should be flagged for confirmation regardless of a
    /// passing verdict (spec.md §4.12 "flag, not block").
    pub fn requires_confirmation_flag(&self, tool: &Tool) -> bool {
        tool.is_critical() && tool.requires_confirmation
    }
}

impl Default for SecurityValidator {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn system_tool(name: &str) -> Tool {
        Tool::new(name, "runs a shell command", json!({})).with_capability(CapabilityCategory::System)
    }

    fn file_tool(name: &str) -> Tool {
        Tool::new(name, "reads a file", json!({})).with_capability(CapabilityCategory::File)
    }

    #[test]
    fn blocks_shell_metacharacters_on_system_tools() {
        let validator = SecurityValidator::with_default_rules();
        let verdict = validator.validate(&system_tool("execute_shell"), &json!({"command": "ls; rm -rf /"}));
        assert!(verdict.is_blocked());
    }

    #[test]
    fn allows_clean_system_command() {
        let validator = SecurityValidator::with_default_rules();
        let verdict = validator.validate(&system_tool("execute_shell"), &json!({"command": "ls -la"}));
        assert_eq!(verdict, SecurityVerdict::Allowed);
    }

    #[test]
    fn blocks_path_traversal_on_file_tools() {
        let validator = SecurityValidator::with_default_rules();
        let verdict = validator.validate(&file_tool("read_file"), &json!({"path": "../../etc/passwd"}));
        assert!(verdict.is_blocked());
    }

    #[test]
    fn rules_do_not_apply_outside_their_capability() {
        let validator = SecurityValidator::with_default_rules();
        let network_tool = Tool::new("fetch_url", "fetch", json!({})).with_capability(CapabilityCategory::Network);
        let verdict = validator.validate(&network_tool, &json!({"url": "http://example.com/../x"}));
        assert_eq!(verdict, SecurityVerdict::Allowed);
    }

    #[test]
    fn critical_tool_flagged_for_confirmation() {
        let validator = SecurityValidator::with_default_rules();
        let tool = system_tool("execute_shell").with_requires_confirmation(true);
        assert!(validator.requires_confirmation_flag(&tool));
    }
}
