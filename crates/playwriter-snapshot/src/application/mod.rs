//! Reconciliation.

pub mod reconciler;
