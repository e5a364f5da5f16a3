//! Updates published by a session.

use playwriter_core::world::EngineMode;
use playwriter_snapshot::domain::view::StructuralView;
use playwriter_transcript::domain::entries::{Notification, TranscriptEntry};
use playwriter_transcript::domain::indicators::{DicePanel, TropeTags};

use crate::domain::commands::Trigger;

/// Single-flight state of world-mutating advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvancementPhase {
    /// No advancement in flight; controls are enabled.
    #[default]
    Idle,
    /// One advancement is in flight.
    Advancing(Trigger),
}

impl AdvancementPhase {
    /// Returns `true` while an advancement is in flight.
    #[must_use]
    pub fn is_advancing(&self) -> bool {
        matches!(self, Self::Advancing(_))
    }

    /// Advancement controls are enabled exactly when idle.
    #[must_use]
    pub fn controls_enabled(&self) -> bool {
        !self.is_advancing()
    }
}

/// A state change for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    /// The advancement phase changed.
    PhaseChanged(AdvancementPhase),
    /// An entry was appended to the transcript.
    TranscriptAppended(TranscriptEntry),
    /// The dice panel shows a new roll.
    DiceChanged(DicePanel),
    /// The active trope tags changed.
    TropesChanged(TropeTags),
    /// The structural view was replaced wholesale.
    ViewReplaced(Box<StructuralView>),
    /// The world's narration mode changed.
    ModeChanged(EngineMode),
    /// Auto-advance was switched on or off.
    AutoAdvanceChanged(bool),
    /// A transient message.
    Notification(Notification),
    /// The session ended; no further updates follow.
    Closed,
}
