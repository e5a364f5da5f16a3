//! The authoritative structural view of a world.

use playwriter_core::world::{ActSummary, EngineMode, Roster, ThreadState, WorldSummary};
use serde::Serialize;

/// Presentation bucket for a thread's 0–10 tension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TensionBucket {
    /// 0–3
    Low,
    /// 4–6
    Mid,
    /// 7 and above
    High,
}

impl TensionBucket {
    /// Buckets a raw tension value.
    #[must_use]
    pub fn of(tension: u8) -> Self {
        match tension {
            0..=3 => Self::Low,
            4..=6 => Self::Mid,
            _ => Self::High,
        }
    }

    /// Returns the display label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// A narrative thread as presented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadView {
    /// Description of the tension.
    pub thread: String,
    /// Server-defined status.
    pub status: String,
    /// Raw tension, kept for display only.
    pub tension: u8,
    /// Bucketed tension.
    pub bucket: TensionBucket,
}

impl From<ThreadState> for ThreadView {
    fn from(state: ThreadState) -> Self {
        Self {
            bucket: TensionBucket::of(state.tension),
            thread: state.thread,
            status: state.status,
            tension: state.tension,
        }
    }
}

/// Canonical structure, roster and threads of one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralView {
    /// World the view describes.
    pub world_id: String,
    /// Lifecycle status, e.g. `in_progress` or `completed`.
    pub status: String,
    /// Engine mode at fetch time.
    pub mode: EngineMode,
    /// Thematic premise.
    pub teleology: String,
    /// World-building background.
    pub context: String,
    /// Acts in order, each with its scenes and beat previews.
    pub acts: Vec<ActSummary>,
    /// Full character roster.
    pub roster: Roster,
    /// Narrative threads with their tension buckets.
    pub threads: Vec<ThreadView>,
}

impl StructuralView {
    /// Assembles a view from a summary and the full roster.
    ///
    /// The roster wins over the summary's bare name list.
    #[must_use]
    pub fn assemble(world_id: &str, summary: WorldSummary, roster: Roster) -> Self {
        let world_id = if summary.id.is_empty() {
            world_id.to_owned()
        } else {
            summary.id
        };
        Self {
            world_id,
            status: summary.status,
            mode: summary.mode,
            teleology: summary.teleology,
            context: summary.context,
            acts: summary.acts,
            roster,
            threads: summary.threads.into_iter().map(ThreadView::from).collect(),
        }
    }

    /// Total beats across all acts and scenes.
    #[must_use]
    pub fn beat_count(&self) -> usize {
        self.acts
            .iter()
            .flat_map(|act| &act.scenes)
            .map(|scene| scene.beats.len())
            .sum()
    }

    /// Total scenes across all acts.
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.acts.iter().map(|act| act.scenes.len()).sum()
    }

    /// The last act, which is the one being played.
    #[must_use]
    pub fn current_act(&self) -> Option<&ActSummary> {
        self.acts.last()
    }

    /// Returns `true` once the service reports the world finished.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}
