//! MCP server over stdio
//!
//! Reads one JSON-RPC message per line from stdin and writes responses to
//! stdout. Blocks until stdin closes.

use super::ServerArgs;
use anyhow::Result;
use divgate_mcp::McpServer;
use tracing::info;

pub fn run(args: ServerArgs) -> Result<()> {
    let server = McpServer::new(args.server_config()?)?;

    info!(
        "MCP server starting via stdio ({} tools registered)",
        server.tools().list_tools().len()
    );

    server.run()
}
