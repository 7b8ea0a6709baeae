//! MCP Tool Implementations
//!
//! Each tool exposes one engine operation. Tools are registered in the
//! [`ToolRegistry`] and dispatched by name.
//!
//! # Tool Categories
//!
//! - **Packets**: div.list_queue, div.get_details, div.create_draft
//! - **Policy**: div.validate
//! - **Execution**: div.apply, div.rollback
//! - **System**: system.get_status, system.get_logs
//!
//! # Two Kinds of Failure
//!
//! A tool that returns `Ok` with `isError: true` reports that the requested
//! action failed (invalid packet, apply stopped part way). A tool that
//! returns `Err` has faulted; the server turns the error into an
//! `Internal Error` result with hints (see [`hints`]).

pub mod hints;
mod packet;
mod registry;
mod system;

pub use registry::ToolRegistry;

use crate::protocol::{ToolCallResult, ToolDefinition};
use crate::server::McpServerConfig;
use crate::service::PacketService;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

/// What a tool can reach while executing
pub struct ToolContext<'a> {
    pub service: &'a PacketService,
    pub config: &'a McpServerConfig,
    pub started_at: Instant,
}

/// Trait for MCP tools
///
/// Execution is synchronous; the server runs one call at a time.
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "div.apply")
    fn name(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    fn execute(&self, args: Value, ctx: &ToolContext<'_>) -> Result<ToolCallResult>;

    /// Get the tool definition for tools/list
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Text plus the same payload as `structuredContent`.
pub(crate) fn structured<T: Serialize>(
    text: impl Into<String>,
    payload: &T,
    is_error: bool,
) -> Result<ToolCallResult> {
    let mut result = if is_error {
        ToolCallResult::error_text(text)
    } else {
        ToolCallResult::text(text)
    };
    result.structured_content = Some(serde_json::to_value(payload)?);
    Ok(result)
}

/// Schema for tools taking a single packet id
pub(crate) fn id_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": {
                "type": "string",
                "description": "Packet id"
            }
        },
        "required": ["id"]
    })
}

/// Schema for tools without arguments
pub(crate) fn empty_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {},
        "additionalProperties": false
    })
}

// Pull a typed parameter out of the arguments object, failing the call.
macro_rules! require_param {
    ($args:expr, $name:literal, $ty:ty) => {
        match $args.get($name) {
            None | Some(Value::Null) => {
                return Err(anyhow::anyhow!("Missing required parameter: {}", $name))
            }
            Some(value) => serde_json::from_value::<$ty>(value.clone())
                .map_err(|e| anyhow::anyhow!("Invalid parameter '{}': {}", $name, e))?,
        }
    };
}

pub(crate) use require_param;
