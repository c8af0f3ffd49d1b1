//! strata-mcp library
//!
//! This module exports the core functionality of strata-mcp for use in
//! integration tests and as a library.

pub mod config;
pub mod handlers;
pub mod server;
