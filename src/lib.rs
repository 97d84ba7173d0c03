//! Code Compass — retrieval server answering agent queries over indexed
//! source-code repositories with verifiable evidence. Exposes `search_code`,
//! `open_file`, and `ask_code` over MCP (framed JSON-RPC on STDIO, and a
//! plain JSON-RPC `POST /mcp` over HTTP).

pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod model;
pub mod protocol;
pub mod retrieval;
pub mod sandbox;
pub mod scope;
pub mod tools;
pub mod transport;
pub mod vector_store;
