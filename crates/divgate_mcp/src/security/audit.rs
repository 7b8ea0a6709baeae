//! Audit Logging - Request/Response Recording
//!
//! Records every dispatched JSON-RPC call for later review of what an agent
//! asked the engine to do. Append-only NDJSON.
//!
//! # Log Format
//!
//! ```json
//! {"ts":"2026-01-21T10:30:00Z","type":"request","method":"tools/call","tool":"div.apply","params_summary":"{keys: [name, arguments]}"}
//! {"ts":"2026-01-21T10:30:01Z","type":"response","success":true}
//! ```

use super::SecurityError;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Audit log for recording dispatcher traffic
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl AuditLog {
    /// Open (or create) an audit log in append mode
    pub fn new(path: PathBuf) -> Result<Self, SecurityError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SecurityError::AuditError(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SecurityError::AuditError(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn log_request(&self, request: &JsonRpcRequest) -> Result<(), SecurityError> {
        let tool = request
            .params
            .as_ref()
            .filter(|_| request.method == crate::protocol::methods::TOOLS_CALL)
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string);

        let entry = AuditEntry::Request {
            ts: Utc::now(),
            method: request.method.clone(),
            id: request.id.as_ref().map(|id| id.to_string()),
            tool,
            params_summary: request.params.as_ref().map(summarize_params),
        };

        self.write_entry(&entry)
    }

    pub fn log_response(&self, response: &JsonRpcResponse) -> Result<(), SecurityError> {
        let tool_error = response
            .result
            .as_ref()
            .and_then(|r| r.get("isError"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let entry = AuditEntry::Response {
            ts: Utc::now(),
            id: response.id.as_ref().map(|id| id.to_string()),
            success: response.error.is_none() && !tool_error,
            error_code: response.error.as_ref().map(|e| e.code),
        };

        self.write_entry(&entry)
    }

    fn write_entry(&self, entry: &AuditEntry) -> Result<(), SecurityError> {
        let json = serde_json::to_string(entry).map_err(|e| {
            SecurityError::AuditError(format!("Failed to serialize audit entry: {}", e))
        })?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SecurityError::AuditError(format!("Failed to lock audit log: {}", e)))?;

        writeln!(writer, "{}", json)
            .map_err(|e| SecurityError::AuditError(format!("Failed to write audit entry: {}", e)))?;
        writer
            .flush()
            .map_err(|e| SecurityError::AuditError(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }

    /// Get the log file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AuditEntry {
    Request {
        ts: DateTime<Utc>,
        method: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        params_summary: Option<String>,
    },
    Response {
        ts: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_code: Option<i32>,
    },
}

/// Summarize params for logging (keys only; packet contents stay out of the log)
fn summarize_params(params: &serde_json::Value) -> String {
    match params {
        serde_json::Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
            format!("{{keys: [{}]}}", keys.join(", "))
        }
        serde_json::Value::Array(arr) => format!("[{} items]", arr.len()),
        _ => "[value]".to_string(),
    }
}
