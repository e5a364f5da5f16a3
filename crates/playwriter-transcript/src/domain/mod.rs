//! Transcript domain types.

pub mod entries;
pub mod indicators;
