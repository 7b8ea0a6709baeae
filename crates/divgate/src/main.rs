//! Divgate Launcher
//!
//! One binary for the packet engine:
//! - `divgate mcp`: MCP server over stdio (JSON-RPC, one message per line)
//! - `divgate serve`: the same dispatcher over HTTP plus the REST queue routes
//! - `divgate packets ...`: operate on the queue directly from a terminal
//! - `divgate config`: show resolved paths

use clap::{Parser, Subcommand};
use divgate_logging::LogConfig;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "divgate", about = "Change-packet engine for agent-proposed edits")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// MCP server over stdio for agent integration
    Mcp(cli::ServerArgs),

    /// MCP server over HTTP (JSON-RPC on /mcp, REST queue on /mcp/div)
    Serve(cli::serve::ServeArgs),

    /// Inspect and act on queued packets
    Packets {
        #[command(flatten)]
        server: cli::ServerArgs,

        #[command(subcommand)]
        command: cli::packets::PacketCommands,
    },

    /// Show resolved configuration paths
    Config(cli::config::ConfigArgs),
}

impl Commands {
    /// Server commands share the log file that `system.get_logs` reads.
    fn log_app_name(&self) -> &'static str {
        match self {
            Commands::Mcp(_) | Commands::Serve(_) => divgate_mcp::SERVER_LOG_APP,
            Commands::Packets { .. } | Commands::Config(_) => "divgate",
        }
    }
}

fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Mcp(args) => cli::mcp::run(args),
        Commands::Serve(args) => cli::serve::run(args),
        Commands::Packets { server, command } => cli::packets::run(server, command),
        Commands::Config(args) => cli::config::run(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Stdout belongs to the stdio transport, so logging only goes to the
    // file and stderr.
    if let Err(err) = divgate_logging::init_logging(LogConfig {
        app_name: cli.command.log_app_name(),
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:?}", err);
            ExitCode::from(1)
        }
    }
}
