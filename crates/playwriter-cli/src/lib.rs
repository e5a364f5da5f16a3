//! Playwriter — headless client.
//!
//! Creates or attaches to a world, drives it with one kind of trigger and
//! prints the transcript as it arrives.

pub mod config;
pub mod error;
pub mod render;
pub mod runner;
