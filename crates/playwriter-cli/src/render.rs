//! Text rendering of session updates.

use playwriter_session::domain::updates::SessionUpdate;
use playwriter_snapshot::domain::view::StructuralView;
use playwriter_transcript::domain::entries::{
    EntryBody, Notification, NotificationLevel, TranscriptEntry,
};

/// Renders one update as printable lines. Phase changes and the final
/// `Closed` print nothing.
#[must_use]
pub fn render(update: &SessionUpdate) -> Vec<String> {
    match update {
        SessionUpdate::TranscriptAppended(entry) => vec![entry_line(entry)],
        SessionUpdate::DiceChanged(panel) => {
            vec![format!("  d100 {} ({})", panel.headline(), panel.detail())]
        }
        SessionUpdate::TropesChanged(tags) if tags.is_empty() => vec!["  tropes: none".to_owned()],
        SessionUpdate::TropesChanged(tags) => {
            vec![format!("  tropes: {}", tags.labels().join(", "))]
        }
        SessionUpdate::ViewReplaced(view) => view_lines(view),
        SessionUpdate::ModeChanged(mode) => vec![format!("mode: {mode}")],
        SessionUpdate::AutoAdvanceChanged(on) => {
            vec![format!("auto-advance {}", if *on { "on" } else { "off" })]
        }
        SessionUpdate::Notification(notification) => vec![notification_line(notification)],
        SessionUpdate::PhaseChanged(_) | SessionUpdate::Closed => Vec::new(),
    }
}

fn entry_line(entry: &TranscriptEntry) -> String {
    match &entry.body {
        EntryBody::Beat {
            actor,
            text,
            outcome,
            ..
        } => format!("[{}] {actor}: {text}", outcome.label()),
        EntryBody::SceneBreak {
            number,
            setting,
            actors,
        } if actors.is_empty() => format!("== Scene {number}: {setting} =="),
        EntryBody::SceneBreak {
            number,
            setting,
            actors,
        } => format!("== Scene {number}: {setting} ({}) ==", actors.join(", ")),
        EntryBody::ActBreak { number, title } => format!("#### Act {number}: {title}"),
    }
}

fn notification_line(notification: &Notification) -> String {
    let level = match notification.level {
        NotificationLevel::Info => "info",
        NotificationLevel::Success => "ok",
        NotificationLevel::Warning => "warn",
        NotificationLevel::Error => "error",
    };
    format!("({level}) {}", notification.message)
}

fn view_lines(view: &StructuralView) -> Vec<String> {
    let act = view.current_act().map_or_else(
        || "no acts yet".to_owned(),
        |act| format!("act {}: {}", act.number, act.title),
    );
    let mut lines = vec![format!(
        "world {} [{}, {}] {act}, {} scenes, {} beats, {} characters",
        view.world_id,
        view.status,
        view.mode,
        view.scene_count(),
        view.beat_count(),
        view.roster.len()
    )];
    lines.extend(view.threads.iter().map(|thread| {
        format!(
            "  thread {} ({}): tension {} [{}]",
            thread.thread,
            thread.status,
            thread.tension,
            thread.bucket.as_str()
        )
    }));
    lines
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use playwriter_core::world::{EngineMode, Roster};
    use playwriter_session::domain::updates::AdvancementPhase;
    use playwriter_test_support::FixedClock;
    use playwriter_test_support::fixtures::{beat_event, history_entry, scene_event, summary};
    use playwriter_transcript::application::builder::{Applied, TranscriptBuilder};
    use playwriter_transcript::domain::indicators::TropeTags;

    use super::*;

    fn rendered_entry(event: &playwriter_core::event::NarrativeEvent) -> Vec<String> {
        let mut builder = TranscriptBuilder::new(Arc::new(FixedClock::epoch()));
        match builder.apply(event) {
            Applied::Rendered { entry, .. } => render(&SessionUpdate::TranscriptAppended(entry)),
            other => panic!("expected Rendered, got {other:?}"),
        }
    }

    #[test]
    fn test_beat_line_carries_outcome_and_prose() {
        let lines = rendered_entry(&beat_event("Mara", 72, 80, "success"));

        assert_eq!(lines, vec!["[success] Mara: Mara moves through the scene."]);
    }

    #[test]
    fn test_scene_break_lists_actors() {
        let lines = rendered_entry(&scene_event(2, "The flooded nave"));

        assert_eq!(lines, vec!["== Scene 2: The flooded nave (Mara) =="]);
    }

    #[test]
    fn test_tropes_render_signed_modifiers() {
        let tags = TropeTags::from_recent(&[history_entry(&[("Omen", -3), ("Betrayal", 2)])], 3);

        let lines = render(&SessionUpdate::TropesChanged(tags));

        assert_eq!(lines, vec!["  tropes: Omen (-3), Betrayal (+2)"]);
    }

    #[test]
    fn test_view_summarises_structure() {
        // Arrange
        let view = StructuralView::assemble("w-1", summary("w-1", 3), Roster::new());

        // Act
        let lines = render(&SessionUpdate::ViewReplaced(Box::new(view)));

        // Assert
        assert_eq!(
            lines[0],
            "world w-1 [in_progress, autonomous] act 1: Low Tide, 1 scenes, 3 beats, 0 characters"
        );
    }

    #[test]
    fn test_notifications_are_tagged_by_level() {
        let lines = render(&SessionUpdate::Notification(Notification::error(
            "Advance failed: World not found",
        )));

        assert_eq!(lines, vec!["(error) Advance failed: World not found"]);
    }

    #[test]
    fn test_phase_changes_print_nothing() {
        assert!(render(&SessionUpdate::PhaseChanged(AdvancementPhase::Idle)).is_empty());
        assert!(render(&SessionUpdate::Closed).is_empty());
        assert_eq!(
            render(&SessionUpdate::ModeChanged(EngineMode::Director)),
            vec!["mode: director"]
        );
    }
}
