//! MCP server over HTTP

use super::ServerArgs;
use anyhow::{Context, Result};
use clap::Args;
use divgate_mcp::{http, McpServer};
use std::net::{IpAddr, SocketAddr};

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Port to listen on
    #[arg(long, env = "MCP_PORT", default_value_t = 3001)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

pub fn run(args: ServeArgs) -> Result<()> {
    let ip: IpAddr = args
        .host
        .parse()
        .with_context(|| format!("Invalid bind address: {}", args.host))?;
    let addr = SocketAddr::new(ip, args.port);

    let server = McpServer::new(args.server.server_config()?)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(http::serve(server, addr))
}
