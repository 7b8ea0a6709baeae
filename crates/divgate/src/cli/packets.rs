//! `divgate packets`: the queue from a terminal
//!
//! Uses the same store and backup vault as the servers, so a packet applied
//! here can be rolled back over MCP and the other way round.

use super::output::{print_table_colored, status_color};
use super::ServerArgs;
use anyhow::{bail, Result};
use clap::Subcommand;
use divgate_mcp::{McpServer, Packet, PacketId, PacketService};

#[derive(Subcommand, Debug)]
pub enum PacketCommands {
    /// List queued packets, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one packet as JSON
    Show { id: String },

    /// Check a packet against its role policy
    Validate { id: String },

    /// Apply a packet to the working tree
    Apply { id: String },

    /// Restore the files a packet touched
    Rollback { id: String },
}

pub fn run(server: ServerArgs, command: PacketCommands) -> Result<()> {
    let server = McpServer::new(server.server_config()?)?;
    let service = server.service();

    match command {
        PacketCommands::List { json } => list(service, json),
        PacketCommands::Show { id } => {
            let packet = service.get(&PacketId::from_string(id))?;
            println!("{}", serde_json::to_string_pretty(&packet)?);
            Ok(())
        }
        PacketCommands::Validate { id } => {
            let report = service.validate(&PacketId::from_string(id))?;
            match report.error {
                None => {
                    println!("Validation passed.");
                    Ok(())
                }
                Some(error) => bail!("Validation failed: {}", error),
            }
        }
        PacketCommands::Apply { id } => {
            let packet = service.apply(&PacketId::from_string(id))?;
            println!("DIV {} {}.", packet.id, packet.status());
            Ok(())
        }
        PacketCommands::Rollback { id } => {
            let packet = service.rollback(&PacketId::from_string(id))?;
            println!("DIV {} {}.", packet.id, packet.status());
            Ok(())
        }
    }
}

fn list(service: &PacketService, json: bool) -> Result<()> {
    let packets = service.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&packets)?);
        return Ok(());
    }

    if packets.is_empty() {
        println!("No DIVs in queue.");
        return Ok(());
    }

    let rows = packets.iter().map(row).collect();
    print_table_colored(&["ID", "TITLE", "ROLE", "STATUS", "CHANGES", "CREATED"], rows);
    println!("{} DIV(s)", packets.len());
    Ok(())
}

fn row(packet: &Packet) -> Vec<(String, Option<comfy_table::Color>)> {
    vec![
        (packet.id.to_string(), None),
        (packet.title.clone(), None),
        (packet.role.to_string(), None),
        (
            packet.status().to_string(),
            Some(status_color(packet.status())),
        ),
        (packet.changes.len().to_string(), None),
        (packet.created_at.format("%Y-%m-%d %H:%M").to_string(), None),
    ]
}
