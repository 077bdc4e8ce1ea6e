//! devtime: local coding-time tracking synchronized to a remote day store.
//!
//! The sync core lives in `devtime-core`. This crate holds the CLI
//! configuration, local persistence and the HTTP API server.

pub mod config;
pub mod db;
pub mod server;
pub mod session;
