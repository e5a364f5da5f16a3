//! Applies narrative events to the transcript.
//!
//! Events are applied strictly in arrival order. Entries are only ever
//! appended; [`TranscriptBuilder::clear`] on world switch is the single
//! exception.

use std::sync::Arc;

use playwriter_core::clock::Clock;
use playwriter_core::dice::DiceHistoryEntry;
use playwriter_core::event::NarrativeEvent;
use tracing::debug;

use crate::domain::entries::{EntryBody, Notification, TranscriptEntry};
use crate::domain::indicators::{DicePanel, TropeTags};

/// Number of recent rolls whose tropes are shown.
pub const DEFAULT_TROPE_WINDOW: usize = 3;

/// What applying one event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new transcript entry was appended.
    Rendered {
        /// The appended entry.
        entry: TranscriptEntry,
        /// The replaced dice panel, when the event carried a roll.
        dice: Option<DicePanel>,
        /// Trope tags should be refreshed from dice history.
        refresh_tropes: bool,
    },
    /// The event produces a notification only.
    Notify(Notification),
    /// The event type is not understood; nothing changed.
    Ignored,
}

/// Builds the prose transcript and the live indicators.
pub struct TranscriptBuilder {
    entries: Vec<TranscriptEntry>,
    dice: Option<DicePanel>,
    tropes: TropeTags,
    trope_window: usize,
    clock: Arc<dyn Clock>,
}

impl TranscriptBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            dice: None,
            tropes: TropeTags::default(),
            trope_window: DEFAULT_TROPE_WINDOW,
            clock,
        }
    }

    /// Overrides how many recent rolls feed the trope tags.
    #[must_use]
    pub fn with_trope_window(mut self, window: usize) -> Self {
        self.trope_window = window;
        self
    }

    /// Applies one event.
    pub fn apply(&mut self, event: &NarrativeEvent) -> Applied {
        let applied = match event {
            NarrativeEvent::BeatResolved(beat) => {
                let dice = DicePanel::from_beat(beat);
                if let Some(panel) = &dice {
                    self.dice = Some(panel.clone());
                }
                let entry = self.append(EntryBody::Beat {
                    sequence: beat.beat_sequence,
                    actor: beat.actor.clone(),
                    action: beat.intended_action.clone(),
                    text: beat.display_text().to_owned(),
                    outcome: beat.outcome(),
                });
                Applied::Rendered {
                    entry,
                    dice,
                    refresh_tropes: true,
                }
            }
            NarrativeEvent::SceneComposed(scene) => Applied::Rendered {
                entry: self.append(EntryBody::SceneBreak {
                    number: scene.scene_number,
                    setting: scene.setting.clone(),
                    actors: scene.actors.clone(),
                }),
                dice: None,
                refresh_tropes: false,
            },
            NarrativeEvent::ActPlanned(act) => Applied::Rendered {
                entry: self.append(EntryBody::ActBreak {
                    number: act.act_number,
                    title: act.title.clone(),
                }),
                dice: None,
                refresh_tropes: false,
            },
            NarrativeEvent::SceneCompleted(scene) => Applied::Notify(Notification::info(format!(
                "Scene {} complete ({} beats)",
                scene.scene_number, scene.beats_count
            ))),
            NarrativeEvent::ActCompleted(act) => Applied::Notify(Notification::success(format!(
                "Act {} complete",
                act.act_number
            ))),
            NarrativeEvent::Unknown => Applied::Ignored,
        };
        debug!(kind = event.kind(), entries = self.entries.len(), "Event applied");
        applied
    }

    /// Recomputes the trope tags from dice history.
    ///
    /// Returns the new tags when they differ from the current ones.
    pub fn apply_history(&mut self, history: &[DiceHistoryEntry]) -> Option<TropeTags> {
        let tags = TropeTags::from_recent(history, self.trope_window);
        if tags == self.tropes {
            return None;
        }
        self.tropes = tags.clone();
        Some(tags)
    }

    /// Returns all entries in append order.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the current dice panel.
    #[must_use]
    pub fn dice(&self) -> Option<&DicePanel> {
        self.dice.as_ref()
    }

    /// Returns the current trope tags.
    #[must_use]
    pub fn tropes(&self) -> &TropeTags {
        &self.tropes
    }

    fn append(&mut self, body: EntryBody) -> TranscriptEntry {
        let entry = TranscriptEntry {
            index: self.entries.len(),
            recorded_at: self.clock.now(),
            body,
        };
        self.entries.push(entry.clone());
        entry
    }
}
