//! Session domain types.

pub mod commands;
pub mod config;
pub mod updates;
