//! Event and snapshot fixtures.

use playwriter_core::dice::{DiceHistoryEntry, DiceOutcome, DiceRoll, FateModifier};
use playwriter_core::event::{BeatResolved, NarrativeEvent, SceneComposed};
use playwriter_core::world::{ActSummary, BeatSummary, SceneSummary, WorldSummary};

/// A rolled beat with prose derived from the actor.
#[must_use]
pub fn beat(actor: &str, raw_roll: i32, final_value: i32, outcome: &str) -> BeatResolved {
    BeatResolved {
        beat_sequence: Some(1),
        actor: actor.to_owned(),
        intended_action: "act".to_owned(),
        actual_outcome: format!("{actor} acts"),
        dice_outcome: Some(DiceOutcome::from(outcome.to_owned())),
        raw_roll: Some(raw_roll),
        final_value: Some(final_value),
        prose: format!("{actor} moves through the scene."),
    }
}

/// [`beat`] wrapped as an event.
#[must_use]
pub fn beat_event(actor: &str, raw_roll: i32, final_value: i32, outcome: &str) -> NarrativeEvent {
    NarrativeEvent::BeatResolved(beat(actor, raw_roll, final_value, outcome))
}

/// A scene opening.
#[must_use]
pub fn scene_event(number: u32, setting: &str) -> NarrativeEvent {
    NarrativeEvent::SceneComposed(SceneComposed {
        scene_number: number,
        actors: vec!["Mara".to_owned()],
        setting: setting.to_owned(),
        beat_count: Some(3),
    })
}

/// A dice-history row carrying the given `(trope, modifier)` pairs.
#[must_use]
pub fn history_entry(modifiers: &[(&str, i32)]) -> DiceHistoryEntry {
    DiceHistoryEntry {
        act: 1,
        scene: 1,
        beat: 1,
        actor: "Mara".to_owned(),
        action: "act".to_owned(),
        roll: DiceRoll {
            raw_roll: Some(50),
            fate_modifiers: modifiers
                .iter()
                .map(|(trope, modifier)| FateModifier {
                    trope: (*trope).to_owned(),
                    modifier: *modifier,
                    rationale: String::new(),
                })
                .collect(),
            final_value: Some(50),
            outcome: DiceOutcome::Mixed,
        },
    }
}

/// A one-act summary with `beats` beats in a single scene.
#[must_use]
pub fn summary(world_id: &str, beats: u32) -> WorldSummary {
    WorldSummary {
        id: world_id.to_owned(),
        status: "in_progress".to_owned(),
        teleology: "Pride precedes ruin".to_owned(),
        characters: vec!["Mara".to_owned()],
        acts: vec![ActSummary {
            id: "a1".to_owned(),
            number: 1,
            title: "Low Tide".to_owned(),
            status: "in_progress".to_owned(),
            scenes: vec![SceneSummary {
                id: "s1".to_owned(),
                number: 1,
                actors: vec!["Mara".to_owned()],
                setting: "Docks".to_owned(),
                status: "in_progress".to_owned(),
                beats: (1..=beats)
                    .map(|sequence| BeatSummary {
                        sequence,
                        actor: "Mara".to_owned(),
                        outcome: Some("success".to_owned()),
                        prose_preview: String::new(),
                    })
                    .collect(),
            }],
            world_events: Vec::new(),
        }],
        ..WorldSummary::default()
    }
}
