//! Event application.

pub mod builder;
