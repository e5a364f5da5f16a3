//! Playwriter Core — shared client-side abstractions.
//!
//! This crate defines the wire-level narrative event model, the dice
//! vocabulary, the world snapshot DTOs and the `NarrativeService` port that
//! every other crate depends on. It contains no transport code.

pub mod clock;
pub mod dice;
pub mod error;
pub mod event;
pub mod service;
pub mod world;

mod de;
