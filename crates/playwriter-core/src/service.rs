//! Narrative Service port.
//!
//! The sync engine only talks to the remote service through this trait. The
//! HTTP adapter lives in `playwriter-client`; tests substitute scripted
//! implementations.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::dice::{DiceHistoryEntry, Trope};
use crate::error::SyncError;
use crate::event::{CreationProgress, NarrativeEvent, OverriddenBeat, StreamFrame};
use crate::world::{
    Character, CharacterRedirect, CreateWorldRequest, DiceOverride, EngineMode, InjectedEvent,
    ProviderCatalog, ProviderSelection, Roster, ThreadChoice, ThreadState, WorldCreated,
    WorldListing, WorldSummary,
};

/// Server-push channel of advancement frames.
///
/// Items are yielded in arrival order. A `MalformedFrame` item affects only
/// that frame; any other error ends the channel.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, SyncError>> + Send>>;

/// Server-push channel of world-creation progress.
pub type ProgressStream = Pin<Box<dyn Stream<Item = Result<CreationProgress, SyncError>> + Send>>;

/// The narrative-service operations the client consumes.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    /// Lists configured LLM providers.
    async fn providers(&self) -> Result<ProviderCatalog, SyncError>;

    /// Selects the active provider and optional model.
    async fn select_provider(
        &self,
        selection: &ProviderSelection,
    ) -> Result<ProviderCatalog, SyncError>;

    /// Creates a world in a single request/response call.
    async fn create_world(&self, request: &CreateWorldRequest) -> Result<WorldCreated, SyncError>;

    /// Creates a world, streaming generation progress.
    async fn create_world_streaming(
        &self,
        request: &CreateWorldRequest,
    ) -> Result<ProgressStream, SyncError>;

    /// Lists known worlds.
    async fn list_worlds(&self) -> Result<Vec<WorldListing>, SyncError>;

    /// Advances by `steps` beats.
    async fn advance(&self, world_id: &str, steps: u32) -> Result<Vec<NarrativeEvent>, SyncError>;

    /// Advances until the current scene completes.
    async fn advance_scene(&self, world_id: &str) -> Result<Vec<NarrativeEvent>, SyncError>;

    /// Advances until the current act completes.
    async fn advance_act(&self, world_id: &str) -> Result<Vec<NarrativeEvent>, SyncError>;

    /// Opens the advancement stream for up to `steps` beats.
    async fn open_stream(&self, world_id: &str, steps: u32) -> Result<FrameStream, SyncError>;

    /// Fetches the condensed world summary.
    async fn world_summary(&self, world_id: &str) -> Result<WorldSummary, SyncError>;

    /// Fetches the full character roster.
    async fn characters(&self, world_id: &str) -> Result<Roster, SyncError>;

    /// Fetches all past rolls, oldest first.
    async fn dice_history(&self, world_id: &str) -> Result<Vec<DiceHistoryEntry>, SyncError>;

    /// Switches narration mode.
    async fn set_mode(&self, world_id: &str, mode: EngineMode) -> Result<EngineMode, SyncError>;

    /// Forces a roll for an actor's action.
    async fn override_dice(
        &self,
        world_id: &str,
        request: &DiceOverride,
    ) -> Result<OverriddenBeat, SyncError>;

    /// Injects a free-text world event.
    async fn inject_event(&self, world_id: &str, description: &str)
    -> Result<InjectedEvent, SyncError>;

    /// Forces tropes matching `query` into the pool.
    async fn force_trope(&self, world_id: &str, query: &str) -> Result<Vec<Trope>, SyncError>;

    /// Replaces a character's ambition.
    async fn redirect_character(
        &self,
        world_id: &str,
        request: &CharacterRedirect,
    ) -> Result<Character, SyncError>;

    /// Sets a narrative thread's status.
    async fn choose_thread(
        &self,
        world_id: &str,
        request: &ThreadChoice,
    ) -> Result<ThreadState, SyncError>;
}
