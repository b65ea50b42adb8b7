//! Shared plumbing for the thinker services: configuration resolution, the
//! error taxonomy, and a small RethinkDB driver (wire protocol, ReQL terms,
//! cursors, connection factory).

pub mod config;
pub mod database;
pub mod errors;
pub mod types;
