//! Live indicators: the dice panel and the rolling trope tags.

use std::fmt;

use playwriter_core::dice::{DiceHistoryEntry, DiceOutcome};
use playwriter_core::event::BeatResolved;
use serde::Serialize;

/// The most recent roll as shown in the dice panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DicePanel {
    /// Acting character.
    pub actor: String,
    /// Raw d100 roll.
    pub raw_roll: Option<i32>,
    /// Modified roll.
    pub final_value: Option<i32>,
    /// Outcome label exactly as received.
    pub outcome: DiceOutcome,
}

impl DicePanel {
    /// Builds the panel from a resolved beat, or `None` if it carried no dice.
    #[must_use]
    pub fn from_beat(beat: &BeatResolved) -> Option<Self> {
        beat.has_dice().then(|| Self {
            actor: beat.actor.clone(),
            raw_roll: beat.raw_roll,
            final_value: beat.final_value,
            outcome: beat.outcome(),
        })
    }

    /// Large display value, e.g. `80`.
    #[must_use]
    pub fn headline(&self) -> String {
        display_value(self.final_value)
    }

    /// Secondary line, e.g. `Raw: 72 | success`.
    #[must_use]
    pub fn detail(&self) -> String {
        format!(
            "Raw: {} | {}",
            display_value(self.raw_roll),
            self.outcome.label()
        )
    }
}

fn display_value(value: Option<i32>) -> String {
    value.map_or_else(|| "?".to_owned(), |v| v.to_string())
}

/// A trope with the modifier it most recently contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TropeTag {
    /// Trope name.
    pub name: String,
    /// Signed modifier.
    pub modifier: i32,
}

impl fmt::Display for TropeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+})", self.name, self.modifier)
    }
}

/// Tropes active across the last few rolls.
///
/// Tags keep first-appearance order; a later roll's modifier replaces an
/// earlier one for the same trope.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TropeTags {
    tags: Vec<TropeTag>,
}

impl TropeTags {
    /// Aggregates the fate modifiers of the last `window` rolls.
    #[must_use]
    pub fn from_recent(history: &[DiceHistoryEntry], window: usize) -> Self {
        let start = history.len().saturating_sub(window);
        let mut tags: Vec<TropeTag> = Vec::new();
        for entry in &history[start..] {
            for modifier in &entry.roll.fate_modifiers {
                match tags.iter_mut().find(|tag| tag.name == modifier.trope) {
                    Some(tag) => tag.modifier = modifier.modifier,
                    None => tags.push(TropeTag {
                        name: modifier.trope.clone(),
                        modifier: modifier.modifier,
                    }),
                }
            }
        }
        Self { tags }
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[TropeTag] {
        &self.tags
    }

    /// Returns the rendered labels, e.g. `Betrayal (+2)`.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.tags.iter().map(ToString::to_string).collect()
    }

    /// Returns `true` when no trope is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playwriter_test_support::fixtures::{beat, history_entry};

    #[test]
    fn test_panel_shows_final_value_and_raw_detail() {
        // Arrange
        let event = beat("Mara", 72, 80, "success");

        // Act
        let panel = DicePanel::from_beat(&event).unwrap();

        // Assert
        assert_eq!(panel.headline(), "80");
        assert_eq!(panel.detail(), "Raw: 72 | success");
    }

    #[test]
    fn test_panel_never_recomputes_outcome() {
        let event = beat("Mara", 5, 4, "critical_failure");

        let panel = DicePanel::from_beat(&event).unwrap();

        assert_eq!(panel.outcome.label(), "critical_failure");
        assert_eq!(panel.detail(), "Raw: 5 | critical_failure");
    }

    #[test]
    fn test_panel_absent_without_dice() {
        let event = BeatResolved {
            actor: "Mara".into(),
            prose: "She waits.".into(),
            ..BeatResolved::default()
        };

        assert!(DicePanel::from_beat(&event).is_none());
    }

    #[test]
    fn test_panel_marks_missing_raw_roll() {
        let event = BeatResolved {
            final_value: Some(55),
            ..BeatResolved::default()
        };

        let panel = DicePanel::from_beat(&event).unwrap();

        assert_eq!(panel.headline(), "55");
        assert_eq!(panel.detail(), "Raw: ? | mixed");
    }

    #[test]
    fn test_later_duplicate_trope_wins() {
        // Arrange
        let history = vec![
            history_entry(&[("Betrayal", 5)]),
            history_entry(&[("Omen", -3)]),
            history_entry(&[("Betrayal", 2)]),
        ];

        // Act
        let tags = TropeTags::from_recent(&history, 3);

        // Assert
        assert_eq!(tags.labels(), vec!["Betrayal (+2)", "Omen (-3)"]);
    }

    #[test]
    fn test_only_last_window_rolls_count() {
        let history = vec![
            history_entry(&[("Prophecy", 9)]),
            history_entry(&[("Omen", -3)]),
            history_entry(&[]),
            history_entry(&[("Betrayal", 1)]),
        ];

        let tags = TropeTags::from_recent(&history, 3);

        assert_eq!(tags.labels(), vec!["Omen (-3)", "Betrayal (+1)"]);
    }

    #[test]
    fn test_empty_history_yields_empty_tags() {
        assert!(TropeTags::from_recent(&[], 3).is_empty());
    }
}
