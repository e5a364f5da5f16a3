//! Structural view types.

pub mod view;
