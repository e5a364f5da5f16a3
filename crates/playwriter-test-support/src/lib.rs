//! Shared test doubles and fixtures for the Playwriter sync engine.

mod clock;
pub mod fixtures;
mod server;
mod service;

pub use clock::FixedClock;
pub use server::{FakeNarrativeServer, RecordedRequest};
pub use service::{Call, FailingNarrativeService, ScriptedNarrativeService};
