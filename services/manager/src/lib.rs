//! TUG Manager Service Library Crate
//!
//! Everything the manager binary wires together: configuration, the JSON-RPC
//! clients for the remote services, the speech WebSockets, the control API
//! and the tick loop. The `manager` binary is a thin wrapper around this
//! library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod protocol;
pub mod router;
pub mod rpc;
pub mod runtime;
pub mod state;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;
