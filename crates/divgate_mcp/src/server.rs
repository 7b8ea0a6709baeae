//! MCP Server Implementation
//!
//! JSON-RPC 2.0 dispatcher for the packet engine, plus the stdio transport.
//!
//! # Architecture
//!
//! The dispatcher is synchronous: one request runs to completion before the
//! next is read. The HTTP transport ([`crate::http`]) shares the same
//! dispatcher behind a lock.
//!
//! # Error Tiers
//!
//! - Protocol errors (bad JSON, bad envelope, unknown method or tool) are
//!   JSON-RPC `error` objects.
//! - Tool faults and failed actions are successful responses whose result
//!   carries `isError: true`.
//!
//! # Example
//!
//! ```ignore
//! let config = McpServerConfig::default();
//! let server = McpServer::new(config)?;
//! server.run()?; // Blocking, no async runtime required
//! ```

use crate::executor::BackupVault;
use crate::packets::FilePacketStore;
use crate::protocol::{
    methods, ErrorCode, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, RequestId, ServerCapabilities, ServerInfo, ToolCallParams, ToolCallResult,
    ToolsCapability, ToolsListResult, JSONRPC_VERSION, MCP_PROTOCOL_VERSION,
};
use crate::security::AuditLog;
use crate::service::PacketService;
use crate::tools::{hints, ToolContext, ToolRegistry};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Log file name shared by the stdio and HTTP servers.
pub const SERVER_LOG_APP: &str = "divgate-mcp";

const AVAILABLE_TOOLS_HINT: &str = "Call tools/list to see all available tools.";

/// MCP Server configuration
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (reported in initialize)
    pub server_name: String,

    /// Server version (reported in initialize)
    pub server_version: String,

    /// Protocol version tag (reported in initialize)
    pub protocol_version: String,

    /// Working tree that packets mutate
    pub working_root: PathBuf,

    /// Queue, backups and audit log live here
    pub data_dir: PathBuf,

    /// Record dispatcher traffic to `<data_dir>/audit.ndjson`
    pub audit: bool,

    /// Maximum tool response size in bytes
    pub max_response_bytes: usize,

    /// Log file served by system.get_logs
    pub log_path: PathBuf,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::for_root(root)
    }
}

impl McpServerConfig {
    /// Defaults for a given working root; data goes to `<root>/mcp-data`.
    pub fn for_root(root: PathBuf) -> Self {
        Self {
            server_name: "divgate-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            data_dir: root.join("mcp-data"),
            working_root: root,
            audit: true,
            max_response_bytes: 1024 * 1024, // 1MB
            log_path: divgate_logging::log_file_path(SERVER_LOG_APP),
        }
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("queue")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    pub fn audit_log_path(&self) -> Option<PathBuf> {
        self.audit.then(|| self.data_dir.join("audit.ndjson"))
    }
}

/// MCP Server
pub struct McpServer {
    config: McpServerConfig,
    service: PacketService,
    tools: ToolRegistry,
    audit: Option<AuditLog>,
    started_at: Instant,
}

impl McpServer {
    /// Create a server over the file-backed queue and backup vault.
    pub fn new(config: McpServerConfig) -> Result<Self> {
        let store =
            FilePacketStore::new(config.queue_dir()).context("Failed to open packet queue")?;
        let service = PacketService::new(
            Box::new(store),
            BackupVault::new(config.backup_dir()),
            config.working_root.clone(),
        );
        let audit = config
            .audit_log_path()
            .map(AuditLog::new)
            .transpose()
            .context("Failed to open audit log")?;

        Ok(Self::from_parts(config, service, audit))
    }

    /// Create a server around an existing service (no audit log).
    pub fn with_service(config: McpServerConfig, service: PacketService) -> Self {
        Self::from_parts(config, service, None)
    }

    fn from_parts(
        config: McpServerConfig,
        service: PacketService,
        audit: Option<AuditLog>,
    ) -> Self {
        Self {
            config,
            service,
            tools: ToolRegistry::new(),
            audit,
            started_at: Instant::now(),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn service(&self) -> &PacketService {
        &self.service
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the server (blocking, reads from stdin, writes to stdout)
    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();

        info!(
            "MCP server starting (root: {})",
            self.config.working_root.display()
        );

        for line in stdin.lock().lines() {
            let line = line.context("Failed to read from stdin")?;

            if line.trim().is_empty() {
                continue;
            }

            debug!("Received: {}", line);

            if let Some(response) = self.handle_line(&line) {
                self.write_response(&mut stdout, &response)?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle one raw JSON-RPC message. `None` means no reply is due.
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(value),
            Err(e) => {
                warn!("Unparseable request: {}", e);
                let response = JsonRpcResponse::error(
                    None,
                    JsonRpcError::parse_error(format!("Parse error: {}", e)),
                );
                self.audit_response(&response);
                Some(response)
            }
        }
    }

    /// Handle an already-parsed JSON value.
    pub fn handle_value(&self, value: Value) -> Option<JsonRpcResponse> {
        let id = value
            .get("id")
            .cloned()
            .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request),
            Err(e) => {
                let response = JsonRpcResponse::error(
                    id,
                    JsonRpcError::invalid_request(format!("Invalid Request: {}", e)),
                );
                self.audit_response(&response);
                Some(response)
            }
        }
    }

    /// Handle a single JSON-RPC request (synchronous)
    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_request(&request) {
                warn!("Audit log write failed: {}", e);
            }
        }

        // Checked before the notification short-circuit so a bad envelope
        // is always answered.
        if request.jsonrpc != JSONRPC_VERSION {
            let response = JsonRpcResponse::error(
                request.id,
                JsonRpcError::invalid_request("Invalid Request")
                    .with_data(json!({ "jsonrpc": request.jsonrpc })),
            );
            self.audit_response(&response);
            return Some(response);
        }

        let id = request.id.clone();
        let notification = request.is_notification();

        let outcome = guard_dispatch(|| self.dispatch(request));

        if notification {
            return None;
        }

        let response = match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        };
        self.audit_response(&response);
        Some(response)
    }

    fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.params),
            methods::INITIALIZED | methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => to_result(ToolsListResult {
                tools: self.tools.list_tools(),
            }),
            methods::TOOLS_CALL => self.handle_tools_call(request.params),
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        // Clients vary; unreadable params are not fatal.
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        match &params.client_info {
            Some(client) => info!(
                "Initialize from {} v{} (protocol {})",
                client.name,
                client.version,
                params.protocol_version.as_deref().unwrap_or("unspecified")
            ),
            None => info!("Initialize from unnamed client"),
        }

        to_result(InitializeResult {
            protocol_version: self.config.protocol_version.clone(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.config.server_name.clone(),
                version: self.config.server_version.clone(),
            },
        })
    }

    fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| {
                JsonRpcError::invalid_params(format!("Invalid tool call params: {}", e))
            })?,
            None => return Err(JsonRpcError::invalid_params("Missing tool call params")),
        };

        let Some(tool) = self.tools.get_tool(&params.name) else {
            let did_you_mean = self.tools.suggest(&params.name);
            info!(
                "Unknown tool '{}', suggesting {:?}",
                params.name, did_you_mean
            );
            return Err(JsonRpcError::new(
                ErrorCode::MethodNotFound,
                format!("Unknown tool: {}", params.name),
            )
            .with_data(json!({
                    "didYouMean": did_you_mean,
                    "availableToolsHint": AVAILABLE_TOOLS_HINT,
                })));
        };

        info!("Tool call: {}", params.name);

        let ctx = ToolContext {
            service: &self.service,
            config: &self.config,
            started_at: self.started_at,
        };
        let result = match panic::catch_unwind(AssertUnwindSafe(|| {
            tool.execute(params.arguments, &ctx)
        })) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Tool {} faulted: {:#}", params.name, e);
                hints::fault_result(&format!("{:#}", e))
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!("Tool {} panicked: {}", params.name, detail);
                hints::fault_result(&detail)
            }
        };

        let value = to_result(result)?;
        Ok(self.enforce_budget(value))
    }

    /// Replace oversized tool output with a truncation notice.
    fn enforce_budget(&self, value: Value) -> Value {
        let size = value.to_string().len();
        if size <= self.config.max_response_bytes {
            return value;
        }

        warn!(
            "Tool response of {} bytes exceeds budget of {} bytes",
            size, self.config.max_response_bytes
        );
        let notice = json!({
            "truncated": true,
            "max_bytes": self.config.max_response_bytes,
            "original_bytes": size,
            "message": "Response exceeded size limit. Use filters to reduce output."
        });
        let mut result = ToolCallResult::error_text(notice.to_string());
        result.structured_content = Some(notice);
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    fn audit_response(&self, response: &JsonRpcResponse) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_response(response) {
                warn!("Audit log write failed: {}", e);
            }
        }
    }

    /// Write a response to stdout
    fn write_response<W: Write>(&self, writer: &mut W, response: &JsonRpcResponse) -> Result<()> {
        let json = serde_json::to_string(response)?;
        debug!("Sending: {}", json);
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }
}

fn to_result<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        JsonRpcError::internal_error("Internal Error").with_data(json!(e.to_string()))
    })
}

/// Run a dispatch, turning a panic into `-32603` with the panic text as data.
fn guard_dispatch<F>(dispatch: F) -> Result<Value, JsonRpcError>
where
    F: FnOnce() -> Result<Value, JsonRpcError>,
{
    panic::catch_unwind(AssertUnwindSafe(dispatch)).unwrap_or_else(|payload| {
        let detail = panic_message(payload.as_ref());
        error!("Dispatcher fault: {}", detail);
        Err(JsonRpcError::internal_error("Internal Error").with_data(json!(detail)))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
