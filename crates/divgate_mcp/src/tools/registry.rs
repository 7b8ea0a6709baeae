//! Tool Registry - Tool Discovery and Dispatch
//!
//! Fixed set of tools, listed in registration order. Unknown names get
//! "did you mean" candidates ranked by edit distance.

use super::{packet, system, McpTool};
use crate::protocol::ToolDefinition;
use tracing::debug;

/// Candidates further than this are only offered on a substring match.
const MAX_SUGGESTION_DISTANCE: usize = 5;

const MAX_SUGGESTIONS: usize = 3;

/// Registry of available MCP tools
pub struct ToolRegistry {
    tools: Vec<Box<dyn McpTool>>,
}

impl ToolRegistry {
    /// Create a new tool registry with all tools registered
    pub fn new() -> Self {
        let mut registry = Self { tools: Vec::new() };

        registry.register(Box::new(packet::ListQueueTool));
        registry.register(Box::new(packet::GetDetailsTool));
        registry.register(Box::new(packet::CreateDraftTool));
        registry.register(Box::new(packet::ValidateTool));
        registry.register(Box::new(packet::ApplyTool));
        registry.register(Box::new(packet::RollbackTool));
        registry.register(Box::new(system::StatusTool));
        registry.register(Box::new(system::LogsTool));

        debug!("Registered {} tools", registry.tools.len());

        registry
    }

    fn register(&mut self, tool: Box<dyn McpTool>) {
        debug!("Registering tool: {}", tool.name());
        self.tools.push(tool);
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Get a tool by name
    pub fn get_tool(&self, name: &str) -> Option<&dyn McpTool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.get_tool(name).is_some()
    }

    /// Up to three known names close to `requested`, nearest first.
    pub fn suggest(&self, requested: &str) -> Vec<String> {
        let mut candidates: Vec<(usize, &str)> = self
            .tools
            .iter()
            .map(|t| t.name())
            .map(|name| (strsim::levenshtein(requested, name), name))
            .filter(|(distance, name)| {
                *distance <= MAX_SUGGESTION_DISTANCE
                    || name.contains(requested)
                    || requested.contains(name)
            })
            .collect();

        // Stable sort keeps registration order among equal distances.
        candidates.sort_by_key(|(distance, _)| *distance);
        candidates
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(_, name)| name.to_string())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_has_core_tools() {
        let registry = ToolRegistry::new();

        for name in [
            "div.list_queue",
            "div.get_details",
            "div.create_draft",
            "div.validate",
            "div.apply",
            "div.rollback",
            "system.get_status",
            "system.get_logs",
        ] {
            assert!(registry.has_tool(name), "missing {}", name);
        }
        assert!(!registry.has_tool("div.aply"));
    }

    #[test]
    fn test_list_tools_carry_schema() {
        let registry = ToolRegistry::new();
        let tools = registry.list_tools();

        assert_eq!(tools.len(), 8);
        assert_eq!(tools[0].name, "div.list_queue");
        assert!(tools.iter().all(|t| t.input_schema["type"] == "object"));
        assert!(tools.iter().all(|t| !t.title.is_empty()));
    }

    #[test]
    fn test_suggest_ranks_by_distance() {
        let registry = ToolRegistry::new();
        let suggestions = registry.suggest("div.aply");

        assert_eq!(suggestions.first().map(String::as_str), Some("div.apply"));
        assert!(suggestions.len() <= 3);
    }

    #[test]
    fn test_suggest_substring_match() {
        let registry = ToolRegistry::new();
        // Far by edit distance from everything but contained in one name.
        let suggestions = registry.suggest("get_status");
        assert!(suggestions.contains(&"system.get_status".to_string()));

        let suggestions = registry.suggest("please.run.system.get_logs.now");
        assert_eq!(suggestions, vec!["system.get_logs".to_string()]);
    }

    #[test]
    fn test_suggest_nothing_close() {
        let registry = ToolRegistry::new();
        assert!(registry.suggest("completely_unrelated_request").is_empty());
    }
}
