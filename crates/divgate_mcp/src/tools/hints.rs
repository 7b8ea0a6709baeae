//! Fault hints for tool errors
//!
//! Turns a faulted tool call into an `isError` result whose text says what
//! likely went wrong and which tool to try next.

use crate::protocol::ToolCallResult;
use serde_json::json;

const CONNECTION_MARKERS: &[&str] = &["not connected", "Session missing"];
const MISSING_MARKERS: &[&str] = &["not found", "No such file"];

const CONNECTION_HINT: &str =
    "(The engine does not seem to be connected. Check it with system.get_status.)";
const MISSING_HINT: &str =
    "(A file or resource is missing. Check the path, or call div.list_queue for valid ids.)";

/// Build the `isError` result for a faulted tool call.
pub fn fault_result(message: &str) -> ToolCallResult {
    let mut text = format!("Internal Error: {}", message);
    let mut suggested: Vec<&str> = Vec::new();

    if CONNECTION_MARKERS.iter().any(|m| message.contains(m)) {
        text.push_str("\n\n");
        text.push_str(CONNECTION_HINT);
        suggested.push("system.get_status");
    }
    if MISSING_MARKERS.iter().any(|m| message.contains(m)) {
        text.push_str("\n\n");
        text.push_str(MISSING_HINT);
        suggested.push("div.list_queue");
    }

    let mut result = ToolCallResult::error_text(text);
    result.meta = Some(json!({ "suggestedTools": suggested }));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_fault() {
        let result = fault_result("disk on fire");
        assert!(result.is_error);
        assert_eq!(result.content[0].as_text(), "Internal Error: disk on fire");
        assert_eq!(result.meta.unwrap()["suggestedTools"], json!([]));
    }

    #[test]
    fn test_connection_hint() {
        let result = fault_result("Session missing for stream");
        assert!(result.content[0].as_text().contains("system.get_status"));
        assert_eq!(
            result.meta.unwrap()["suggestedTools"],
            json!(["system.get_status"])
        );
    }

    #[test]
    fn test_missing_resource_hint() {
        let result = fault_result("DIV not found: div_1");
        let text = result.content[0].as_text();
        assert!(text.starts_with("Internal Error: DIV not found: div_1"));
        assert!(text.contains("div.list_queue"));
        assert_eq!(
            result.meta.unwrap()["suggestedTools"],
            json!(["div.list_queue"])
        );
    }
}
