//! Session runtime.

pub mod controller;
pub mod handle;
pub mod setup;
mod refresh;
