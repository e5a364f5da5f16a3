//! Playwriter — advancement session.
//!
//! Owns one world's client-side state: the transcript, the structural view
//! and the single-flight advancement phase. Triggers arrive through a
//! [`application::handle::SessionHandle`]; state changes leave as
//! [`domain::updates::SessionUpdate`]s.

pub mod application;
pub mod domain;
