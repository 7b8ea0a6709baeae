//! Change-packet engine and MCP (Model Context Protocol) server for Divgate
//!
//! An agent proposes a bundle of file edits (a packet), the engine checks it
//! against a role path policy, applies it to the working tree with a
//! per-packet backup set, and can undo it later. Everything is exposed as
//! MCP tools over JSON-RPC.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Agent / Dashboard                            │
//! └─────────────────────────────────────────────────────────────┘
//!               │ JSON-RPC (stdio or POST /mcp)   │ REST /mcp/div
//!               ▼                                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  server   │ envelope checks, method routing, fault capture   │
//! │  tools    │ registry, did-you-mean, fault hints              │
//! ├───────────┼─────────────────────────────────────────────────┤
//! │  service  │ re-fetch, re-validate, apply/rollback, persist   │
//! ├───────────┼─────────────────────────────────────────────────┤
//! │  policy   │ role → allow/deny table (pure)                   │
//! │  executor │ file operations + backup vault                   │
//! │  packets  │ packet model + keyed store                       │
//! │  security │ path guard, audit log                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! 1. Validation runs before any mutation and never changes the packet.
//! 2. Every file modified or deleted by apply is captured first, so rollback
//!    can always restore what was touched.
//! 3. Apply is not transactional: a failure leaves earlier changes in place
//!    and the caller decides whether to roll back.

pub mod executor;
pub mod http;
pub mod packets;
pub mod policy;
pub mod protocol;
pub mod security;
pub mod server;
pub mod service;
pub mod tools;

// Re-exports for convenience
pub use executor::{ApplyFault, BackupVault};
pub use packets::{
    Change, ChangeOp, FilePacketStore, MemoryPacketStore, Packet, PacketDraft, PacketId,
    PacketStore, ReviewStatus, Role,
};
pub use policy::{validate, PolicyViolation, ValidationReport};
pub use protocol::{ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::{McpServer, McpServerConfig, SERVER_LOG_APP};
pub use service::{EngineError, PacketService};
