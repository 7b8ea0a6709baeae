//! System Tools - Process Status and Log Tail

use super::{empty_schema, structured, McpTool, ToolContext};
use crate::protocol::ToolCallResult;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const DEFAULT_LOG_LINES: usize = 100;

// ============================================================================
// system.get_status
// ============================================================================

pub struct StatusTool;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusResult {
    status: &'static str,
    pid: u32,
    uptime_secs: u64,
    cwd: String,
    root: String,
    packet_count: usize,
}

impl McpTool for StatusTool {
    fn name(&self) -> &'static str {
        "system.get_status"
    }

    fn title(&self) -> &'static str {
        "System Status"
    }

    fn description(&self) -> &'static str {
        "Returns process status, working root and queue size."
    }

    fn input_schema(&self) -> Value {
        empty_schema()
    }

    fn execute(&self, _args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let status = StatusResult {
            status: "running",
            pid: std::process::id(),
            uptime_secs: ctx.started_at.elapsed().as_secs(),
            cwd: cwd.display().to_string(),
            root: ctx.service.root().display().to_string(),
            packet_count: ctx.service.list()?.len(),
        };

        structured("System running.", &status, false)
    }
}

// ============================================================================
// system.get_logs
// ============================================================================

pub struct LogsTool;

#[derive(Debug, Default, Deserialize)]
struct LogsArgs {
    #[serde(default)]
    lines: Option<usize>,
}

impl McpTool for LogsTool {
    fn name(&self) -> &'static str {
        "system.get_logs"
    }

    fn title(&self) -> &'static str {
        "System Logs"
    }

    fn description(&self) -> &'static str {
        "Returns the most recent lines of the engine's own log file."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lines": {
                    "type": "integer",
                    "minimum": 0,
                    "default": DEFAULT_LOG_LINES
                }
            },
            "additionalProperties": false
        })
    }

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult> {
        let args: LogsArgs = if args.is_null() {
            LogsArgs::default()
        } else {
            serde_json::from_value(args)?
        };
        let lines = args.lines.unwrap_or(DEFAULT_LOG_LINES);
        let logs = divgate_logging::tail_file(&ctx.config.log_path, lines)?;

        structured(
            format!("{} log lines.", logs.len()),
            &json!({ "logs": logs }),
            false,
        )
    }
}
