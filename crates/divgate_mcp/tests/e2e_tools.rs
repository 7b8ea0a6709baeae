//! End-to-End tests for the packet engine over JSON-RPC
//!
//! These tests drive the dispatcher with raw JSON lines against REAL files in
//! a temporary working tree. No mocks.

use divgate_mcp::{McpServer, McpServerConfig};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct Harness {
    temp: TempDir,
    server: McpServer,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let config = McpServerConfig::for_root(temp.path().to_path_buf());
        let server = McpServer::new(config).unwrap();
        Self { temp, server }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(&self, rel: &str) -> Option<String> {
        fs::read_to_string(self.root().join(rel)).ok()
    }

    /// Send one request and return the whole response envelope.
    fn rpc(&self, method: &str, params: Value) -> Value {
        let line = json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params});
        let response = self
            .server
            .handle_line(&line.to_string())
            .expect("request with id must be answered");
        serde_json::to_value(response).unwrap()
    }

    /// Call a tool and return its result payload.
    fn call(&self, name: &str, arguments: Value) -> Value {
        let response = self.rpc("tools/call", json!({"name": name, "arguments": arguments}));
        assert!(
            response.get("error").is_none(),
            "unexpected protocol error: {}",
            response
        );
        response["result"].clone()
    }

    fn create(&self, draft: Value) -> String {
        let result = self.call("div.create_draft", draft);
        result["structuredContent"]["id"].as_str().unwrap().to_string()
    }
}

fn text(result: &Value) -> &str {
    result["content"][0]["text"].as_str().unwrap()
}

// =============================================================================
// APPLY / ROLLBACK
// =============================================================================

#[test]
fn test_apply_then_rollback_restores_tree() {
    let h = Harness::new();
    h.write("addons/widget/main.js", "console.log('v1');\n");
    h.write("addons/old/legacy.js", "legacy\n");
    h.write("public/index.html", "<h1>one</h1>\ntwo\nthree\n");

    let patch = diffy::create_patch(
        "<h1>one</h1>\ntwo\nthree\n",
        "<h1>one</h1>\nTWO\nthree\n",
    )
    .to_string();

    let id = h.create(json!({
        "title": "Widget refresh",
        "author": "agent",
        "role": "addon_dev",
        "changes": [
            {"operation": "modify", "path": "addons/widget/main.js", "content": "console.log('v2');\n"},
            {"operation": "modify", "path": "public/index.html", "patch": patch},
            {"operation": "delete", "path": "addons/old/legacy.js"},
            {"operation": "create", "path": "addons/widget/new.css", "content": "body{}"}
        ]
    }));

    let result = h.call("div.apply", json!({"id": id}));
    assert!(result.get("isError").is_none(), "{}", result);
    assert_eq!(result["structuredContent"]["status"], "applied");

    assert_eq!(h.read("addons/widget/main.js").unwrap(), "console.log('v2');\n");
    assert_eq!(h.read("public/index.html").unwrap(), "<h1>one</h1>\nTWO\nthree\n");
    assert!(h.read("addons/old/legacy.js").is_none());
    assert_eq!(h.read("addons/widget/new.css").unwrap(), "body{}");

    let result = h.call("div.rollback", json!({"id": id}));
    assert!(result.get("isError").is_none(), "{}", result);
    assert_eq!(result["structuredContent"]["status"], "rolled_back");

    assert_eq!(h.read("addons/widget/main.js").unwrap(), "console.log('v1');\n");
    assert_eq!(h.read("public/index.html").unwrap(), "<h1>one</h1>\ntwo\nthree\n");
    assert_eq!(h.read("addons/old/legacy.js").unwrap(), "legacy\n");
    assert!(h.read("addons/widget/new.css").is_none());

    let details = h.call("div.get_details", json!({"id": id}));
    assert_eq!(details["structuredContent"]["review"]["status"], "rolled_back");
}

#[test]
fn test_partial_apply_then_rollback() {
    let h = Harness::new();
    h.write("addons/a.js", "a0");
    h.write("addons/c.js", "c0");

    let id = h.create(json!({
        "role": "addon_dev",
        "changes": [
            {"operation": "modify", "path": "addons/a.js", "content": "a1"},
            {"operation": "modify", "path": "addons/missing.js", "content": "b1"},
            {"operation": "modify", "path": "addons/c.js", "content": "c1"}
        ]
    }));

    let result = h.call("div.apply", json!({"id": id}));
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["success"], false);
    assert_eq!(
        result["structuredContent"]["error"],
        "File addons/missing.js not found"
    );

    // Prefix applied, failing change and tail untouched.
    assert_eq!(h.read("addons/a.js").unwrap(), "a1");
    assert_eq!(h.read("addons/c.js").unwrap(), "c0");

    let details = h.call("div.get_details", json!({"id": id}));
    assert_eq!(details["structuredContent"]["review"]["status"], "draft");

    let result = h.call("div.rollback", json!({"id": id}));
    assert!(result.get("isError").is_none(), "{}", result);
    assert_eq!(h.read("addons/a.js").unwrap(), "a0");
    assert_eq!(h.read("addons/c.js").unwrap(), "c0");
    assert!(h.read("addons/missing.js").is_none());
}

#[test]
fn test_config_mgr_roundtrip() {
    let h = Harness::new();
    h.write("data/config.json", r#"{"volume": 3}"#);

    let id = h.create(json!({
        "role": "config_mgr",
        "changes": [{"operation": "modify", "path": "data/config.json", "content": "{}"}]
    }));

    let validated = h.call("div.validate", json!({"id": id}));
    assert_eq!(validated["structuredContent"], json!({"valid": true}));

    h.call("div.apply", json!({"id": id}));
    assert_eq!(h.read("data/config.json").unwrap(), "{}");

    let backup = h
        .root()
        .join("mcp-data/backups")
        .join(&id)
        .join("data/config.json");
    assert_eq!(fs::read_to_string(backup).unwrap(), r#"{"volume": 3}"#);

    h.call("div.rollback", json!({"id": id}));
    assert_eq!(h.read("data/config.json").unwrap(), r#"{"volume": 3}"#);
}

#[test]
fn test_invalid_packet_never_touches_tree() {
    let h = Harness::new();
    h.write("src/x.ts", "original");

    let id = h.create(json!({
        "role": "addon_dev",
        "changes": [{"operation": "modify", "path": "src/x.ts", "content": "hacked"}]
    }));

    let validated = h.call("div.validate", json!({"id": id}));
    assert_eq!(validated["isError"], true);
    assert_eq!(
        validated["structuredContent"]["error"],
        "Access denied to src/x.ts for role addon_dev"
    );

    let applied = h.call("div.apply", json!({"id": id}));
    assert_eq!(applied["isError"], true);
    assert!(text(&applied).starts_with("Internal Error: Cannot apply invalid DIV"));
    assert_eq!(h.read("src/x.ts").unwrap(), "original");
}

#[test]
fn test_traversal_is_rejected() {
    let h = Harness::new();
    let id = h.create(json!({
        "role": "addon_dev",
        "changes": [{"operation": "create", "path": "addons/../../escape.txt", "content": "x"}]
    }));

    let validated = h.call("div.validate", json!({"id": id}));
    assert_eq!(
        validated["structuredContent"]["error"],
        "Unsafe path addons/../../escape.txt"
    );
    assert!(!h.root().parent().unwrap().join("escape.txt").exists());
}

// =============================================================================
// QUEUE
// =============================================================================

#[test]
fn test_list_queue_newest_first() {
    let h = Harness::new();
    let first = h.create(json!({"title": "first"}));
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = h.create(json!({"title": "second"}));

    let result = h.call("div.list_queue", json!({}));
    assert_eq!(text(&result), "Found 2 DIVs in queue.");

    let divs = result["structuredContent"]["divs"].as_array().unwrap();
    assert_eq!(divs[0]["id"], second.as_str());
    assert_eq!(divs[1]["id"], first.as_str());
    assert_eq!(divs[0]["status"], "draft");
    assert_eq!(divs[0]["role"], "addon_dev");

    // Records are plain JSON files keyed by id.
    assert!(h
        .root()
        .join("mcp-data/queue")
        .join(format!("{}.json", first))
        .exists());
}

#[test]
fn test_unknown_id_gets_hint() {
    let h = Harness::new();
    let result = h.call("div.get_details", json!({"id": "div_missing"}));

    assert_eq!(result["isError"], true);
    assert!(text(&result).contains("not found"));
    assert_eq!(result["_meta"]["suggestedTools"], json!(["div.list_queue"]));
}

// =============================================================================
// PROTOCOL
// =============================================================================

#[test]
fn test_misspelled_tool_suggests() {
    let h = Harness::new();
    let response = h.rpc(
        "tools/call",
        json!({"name": "div.aply", "arguments": {"id": "x"}}),
    );

    assert!(response.get("result").is_none());
    let error = &response["error"];
    assert_eq!(error["code"], -32601);
    assert_eq!(error["message"], "Unknown tool: div.aply");
    assert_eq!(error["data"]["didYouMean"][0], "div.apply");
    assert_eq!(
        error["data"]["availableToolsHint"],
        "Call tools/list to see all available tools."
    );
}

#[test]
fn test_tools_list_describes_every_tool() {
    let h = Harness::new();
    let response = h.rpc("tools/list", json!({}));

    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 8);
    for tool in tools {
        assert!(tool["name"].is_string());
        assert!(tool["title"].is_string());
        assert!(tool["description"].is_string());
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[test]
fn test_ping_and_initialize() {
    let h = Harness::new();
    assert_eq!(h.rpc("ping", json!({}))["result"], json!({}));

    let init = h.rpc("initialize", json!({"clientInfo": {"name": "test", "version": "0"}}));
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
}

#[test]
fn test_audit_log_written() {
    let h = Harness::new();
    h.call("div.list_queue", json!({}));

    let audit = fs::read_to_string(h.root().join("mcp-data/audit.ndjson")).unwrap();
    let lines: Vec<&str> = audit.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"tool\":\"div.list_queue\""));
    assert!(lines[1].contains("\"success\":true"));
}
