//! Library side of the `outbreak` binary, kept separate so commands can be
//! tested without a process boundary.

pub mod commands;
pub mod config;
