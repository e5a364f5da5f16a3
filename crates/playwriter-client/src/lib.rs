//! Playwriter — HTTP adapter for the Narrative Service.
//!
//! Implements [`playwriter_core::service::NarrativeService`] over JSON
//! request/response calls and server-sent event streams.

pub mod config;
pub mod http;
mod sse;
