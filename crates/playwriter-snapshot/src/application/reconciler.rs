//! Fetches canonical world state.

use std::sync::Arc;

use playwriter_core::error::SyncError;
use playwriter_core::service::NarrativeService;
use tracing::{debug, instrument};

use crate::domain::view::StructuralView;

/// Produces [`StructuralView`]s from the Narrative Service.
#[derive(Clone)]
pub struct Reconciler {
    service: Arc<dyn NarrativeService>,
}

impl Reconciler {
    /// Creates a reconciler over the given service.
    #[must_use]
    pub fn new(service: Arc<dyn NarrativeService>) -> Self {
        Self { service }
    }

    /// Fetches the summary and roster concurrently and assembles a view.
    ///
    /// Threads come from the summary. The result replaces any previous view;
    /// nothing is merged.
    ///
    /// # Errors
    ///
    /// Returns the first `SyncError` from either fetch.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, world_id: &str) -> Result<StructuralView, SyncError> {
        let (summary, roster) = tokio::try_join!(
            self.service.world_summary(world_id),
            self.service.characters(world_id)
        )?;
        let view = StructuralView::assemble(world_id, summary, roster);
        debug!(
            acts = view.acts.len(),
            beats = view.beat_count(),
            characters = view.roster.len(),
            "World reconciled"
        );
        Ok(view)
    }
}
