//! Playwriter — Snapshot Reconciler.
//!
//! Fetches the canonical world state and replaces the client's structural
//! view wholesale. The transcript is never touched here.

pub mod application;
pub mod domain;
