//! Packet Tools - Queue, Details, Drafts, Validate, Apply, Rollback
//!
//! Unknown ids and invalid-on-apply are faults (`Err`). Executor failures
//! come back as `isError` results carrying `{success: false, error}`.

use super::{id_schema, require_param, structured, McpTool, ToolContext};
use crate::packets::{PacketDraft, PacketId, ReviewStatus};
use crate::protocol::ToolCallResult;
use crate::service::EngineError;
use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
struct ExecutionOutcome {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ReviewStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ExecutionOutcome {
    fn done(status: ReviewStatus) -> Self {
        Self {
            success: true,
            status: Some(status),
            error: None,
        }
    }

    fn failed(error: &EngineError) -> Self {
        Self {
            success: false,
            status: None,
            error: Some(error.to_string()),
        }
    }
}

// ============================================================================
// div.list_queue
// ============================================================================

pub struct ListQueueTool;

impl McpTool for ListQueueTool {
    fn name(&self) -> &'static str {
        "div.list_queue"
    }

    fn title(&self) -> &'static str {
        "List DIV Queue"
    }

    fn description(&self) -> &'static str {
        "Lists all DIV packets in the queue with their status, newest first."
    }

    fn input_schema(&self) -> Value {
        super::empty_schema()
    }

    fn execute(&self, _args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let divs: Vec<_> = ctx.service.list()?.iter().map(|p| p.summary()).collect();

        structured(
            format!("Found {} DIVs in queue.", divs.len()),
            &json!({ "count": divs.len(), "divs": divs }),
            false,
        )
    }
}

// ============================================================================
// div.get_details
// ============================================================================

pub struct GetDetailsTool;

impl McpTool for GetDetailsTool {
    fn name(&self) -> &'static str {
        "div.get_details"
    }

    fn title(&self) -> &'static str {
        "Get DIV Details"
    }

    fn description(&self) -> &'static str {
        "Gets the full JSON content of a DIV packet."
    }

    fn input_schema(&self) -> Value {
        id_schema()
    }

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let id = require_param!(args, "id", PacketId);
        let packet = ctx.service.get(&id)?;

        structured(serde_json::to_string_pretty(&packet)?, &packet, false)
    }
}

// ============================================================================
// div.create_draft
// ============================================================================

pub struct CreateDraftTool;

impl McpTool for CreateDraftTool {
    fn name(&self) -> &'static str {
        "div.create_draft"
    }

    fn title(&self) -> &'static str {
        "Create DIV Draft"
    }

    fn description(&self) -> &'static str {
        "Creates a new DIV packet in draft status. Missing fields get defaults. Returns the id."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string" },
                "title": { "type": "string" },
                "author": { "type": "string" },
                "role": {
                    "type": "string",
                    "enum": ["addon_dev", "core_fix", "config_mgr", "qa_only"]
                },
                "intent": { "type": "string" },
                "scope": {
                    "type": "object",
                    "properties": {
                        "paths": { "type": "array", "items": { "type": "string" } },
                        "risk": { "type": "string" }
                    }
                },
                "plan": { "type": "array", "items": { "type": "string" } },
                "changes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "operation": { "type": "string", "enum": ["create", "modify", "delete"] },
                            "path": { "type": "string" },
                            "content": { "type": "string" },
                            "patch": { "type": "string", "description": "Unified diff" }
                        },
                        "required": ["operation", "path"]
                    }
                }
            }
        })
    }

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let draft: PacketDraft = if args.is_null() {
            PacketDraft::default()
        } else {
            serde_json::from_value(args)?
        };
        let packet = ctx.service.create_draft(draft)?;

        structured(
            format!("DIV {} created as draft.", packet.id),
            &json!({ "id": packet.id, "status": packet.status() }),
            false,
        )
    }
}

// ============================================================================
// div.validate
// ============================================================================

pub struct ValidateTool;

impl McpTool for ValidateTool {
    fn name(&self) -> &'static str {
        "div.validate"
    }

    fn title(&self) -> &'static str {
        "Validate DIV"
    }

    fn description(&self) -> &'static str {
        "Checks a DIV packet against the role path policy. Does not modify it."
    }

    fn input_schema(&self) -> Value {
        id_schema()
    }

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let id = require_param!(args, "id", PacketId);
        let report = ctx.service.validate(&id)?;

        match &report.error {
            None => structured("Validation passed.", &report, false),
            Some(error) => structured(format!("Validation failed: {}", error), &report, true),
        }
    }
}

// ============================================================================
// div.apply
// ============================================================================

pub struct ApplyTool;

impl McpTool for ApplyTool {
    fn name(&self) -> &'static str {
        "div.apply"
    }

    fn title(&self) -> &'static str {
        "Apply DIV"
    }

    fn description(&self) -> &'static str {
        "Re-validates a DIV packet and applies its changes to the working tree, backing up every file it modifies or deletes."
    }

    fn input_schema(&self) -> Value {
        id_schema()
    }

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let id = require_param!(args, "id", PacketId);

        match ctx.service.apply(&id) {
            Ok(packet) => structured(
                format!("DIV {} applied successfully.", packet.id),
                &ExecutionOutcome::done(packet.status()),
                false,
            ),
            Err(e) if e.is_execution_failure() => structured(
                format!("Apply failed: {}", e),
                &ExecutionOutcome::failed(&e),
                true,
            ),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// div.rollback
// ============================================================================

pub struct RollbackTool;

impl McpTool for RollbackTool {
    fn name(&self) -> &'static str {
        "div.rollback"
    }

    fn title(&self) -> &'static str {
        "Rollback DIV"
    }

    fn description(&self) -> &'static str {
        "Reverts the changes of a DIV packet from its backup set."
    }

    fn input_schema(&self) -> Value {
        id_schema()
    }

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let id = require_param!(args, "id", PacketId);

        match ctx.service.rollback(&id) {
            Ok(packet) => structured(
                format!("DIV {} rolled back successfully.", packet.id),
                &ExecutionOutcome::done(packet.status()),
                false,
            ),
            Err(e) if e.is_execution_failure() => structured(
                format!("Rollback failed: {}", e),
                &ExecutionOutcome::failed(&e),
                true,
            ),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::BackupVault;
    use crate::packets::MemoryPacketStore;
    use crate::server::McpServerConfig;
    use crate::service::PacketService;
    use std::time::Instant;
    use tempfile::TempDir;

    fn run(tool: &dyn McpTool, svc: &PacketService, args: Value) -> Result<ToolCallResult> {
        let config = McpServerConfig::default();
        let ctx = ToolContext {
            service: svc,
            config: &config,
            started_at: Instant::now(),
        };
        tool.execute(args, &ctx)
    }

    fn service(temp: &TempDir) -> PacketService {
        PacketService::new(
            Box::new(MemoryPacketStore::new()),
            BackupVault::new(temp.path().join("backups")),
            temp.path().to_path_buf(),
        )
    }

    #[test]
    fn test_create_draft_defaults() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let result = run(&CreateDraftTool, &svc, json!({})).unwrap();
        let payload = result.structured_content.unwrap();
        assert_eq!(payload["status"], "draft");

        let id = PacketId::from_string(payload["id"].as_str().unwrap());
        let packet = svc.get(&id).unwrap();
        assert_eq!(packet.title, "Untitled");
        assert_eq!(packet.author, "mcp");
        assert_eq!(packet.role.to_string(), "addon_dev");
        assert_eq!(packet.qa.required, vec!["test:unit".to_string()]);
        assert_eq!(packet.rollback.notes, "Auto-generated");
    }

    #[test]
    fn test_create_draft_rejects_non_array_changes() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let err = run(&CreateDraftTool, &svc, json!({"changes": "oops"})).unwrap_err();
        assert!(err.to_string().contains("Changes must be an array"));
        assert!(svc.list().unwrap().is_empty());
    }

    #[test]
    fn test_get_details_unknown_is_fault() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let err = run(&GetDetailsTool, &svc, json!({"id": "div_missing"})).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_missing_id_param() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);

        let err = run(&ValidateTool, &svc, json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter: id");
    }

    #[test]
    fn test_validate_failure_is_business_error() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let created = run(
            &CreateDraftTool,
            &svc,
            json!({"role": "addon_dev", "changes": [{"operation": "modify", "path": "src/x.ts"}]}),
        )
        .unwrap();
        let id = created.structured_content.unwrap()["id"].clone();

        let result = run(&ValidateTool, &svc, json!({"id": id})).unwrap();
        assert!(result.is_error);
        assert_eq!(
            result.structured_content.unwrap(),
            json!({"valid": false, "error": "Access denied to src/x.ts for role addon_dev"})
        );
    }

    #[test]
    fn test_apply_invalid_is_fault() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let created = run(
            &CreateDraftTool,
            &svc,
            json!({"role": "qa_only", "changes": [{"operation": "delete", "path": "x"}]}),
        )
        .unwrap();
        let id = created.structured_content.unwrap()["id"].clone();

        let err = run(&ApplyTool, &svc, json!({"id": id})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot apply invalid DIV: QA role cannot make changes"
        );
    }

    #[test]
    fn test_rollback_without_backup_is_business_error() {
        let temp = TempDir::new().unwrap();
        let svc = service(&temp);
        let created = run(&CreateDraftTool, &svc, json!({"id": "div_fresh"})).unwrap();
        assert!(!created.is_error);

        let result = run(&RollbackTool, &svc, json!({"id": "div_fresh"})).unwrap();
        assert!(result.is_error);
        let payload = result.structured_content.unwrap();
        assert_eq!(payload["success"], false);
        assert_eq!(payload["error"], "No backup found for packet div_fresh");
    }
}
