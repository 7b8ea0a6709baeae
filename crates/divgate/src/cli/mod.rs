//! CLI command handlers

pub mod config;
pub mod mcp;
pub mod output;
pub mod packets;
pub mod serve;

use anyhow::{Context, Result};
use clap::Args;
use divgate_mcp::McpServerConfig;
use std::path::PathBuf;

/// Where the engine works and keeps its data.
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Working tree that packets modify (default: current directory)
    #[arg(long, env = "DIVGATE_ROOT")]
    pub root: Option<PathBuf>,

    /// Queue, backups and audit log (default: <root>/mcp-data)
    #[arg(long, env = "DIVGATE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Do not record dispatcher traffic to the audit log
    #[arg(long)]
    pub no_audit: bool,
}

impl ServerArgs {
    /// Resolve flags into a server configuration.
    pub fn server_config(&self) -> Result<McpServerConfig> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to resolve current directory")?,
        };
        let root = root
            .canonicalize()
            .with_context(|| format!("Working root not found: {}", root.display()))?;

        let mut config = McpServerConfig::for_root(root);
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        config.audit = !self.no_audit;
        Ok(config)
    }
}
