//! Playwriter — Transcript Builder.
//!
//! Turns narrative events, in arrival order, into an append-only prose
//! transcript plus the live dice panel and rolling trope tags.

pub mod application;
pub mod domain;
