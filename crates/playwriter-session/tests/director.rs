//! Director channel and mode switching.

mod common;

use common::{
    Session, appended, errors, is_advancing, is_idle, is_notification, is_view, notifications,
};
use playwriter_core::dice::{DiceOutcome, DiceRoll};
use playwriter_core::error::SyncError;
use playwriter_core::event::OverriddenBeat;
use playwriter_core::world::{DiceOverride, EngineMode};
use playwriter_session::domain::commands::StepRequest;
use playwriter_session::domain::updates::SessionUpdate;
use playwriter_test_support::fixtures::history_entry;
use playwriter_test_support::{Call, ScriptedNarrativeService};
use playwriter_transcript::domain::entries::NotificationLevel;

fn critical_failure(forced: i32) -> OverriddenBeat {
    OverriddenBeat {
        sequence: Some(4),
        actor: "Mara".to_owned(),
        intended_action: "leap the gap".to_owned(),
        dice_roll: Some(DiceRoll {
            raw_roll: Some(forced),
            fate_modifiers: Vec::new(),
            final_value: Some(forced - 1),
            outcome: DiceOutcome::CriticalFailure,
        }),
        actual_outcome: "She falls short".to_owned(),
        prose: "Mara's boot slips on wet stone.".to_owned(),
    }
}

#[tokio::test]
async fn test_dice_override_appends_beat_and_updates_panel() {
    // Arrange
    let service = ScriptedNarrativeService::new();
    service.set_overridden(critical_failure(5));
    let mut session = Session::start(service);
    session.started().await;

    // Act
    session.handle.override_dice("Mara", "leap the gap", 5).unwrap();
    let updates = session.wait_for(is_notification).await;

    // Assert
    assert_eq!(appended(&updates), 1);
    let panel = updates
        .iter()
        .find_map(|update| match update {
            SessionUpdate::DiceChanged(panel) => Some(panel),
            _ => None,
        })
        .expect("dice panel update");
    assert_eq!(panel.headline(), "4");
    assert_eq!(panel.detail(), "Raw: 5 | critical_failure");
    assert_eq!(
        notifications(&updates)[0].message,
        "Dice override applied"
    );
    assert!(session.service.calls().contains(&Call::OverrideDice(
        DiceOverride::new("Mara", "leap the gap", 5).unwrap()
    )));
}

#[tokio::test]
async fn test_dice_override_refreshes_tropes() {
    let service = ScriptedNarrativeService::new();
    let mut session = Session::start(service);
    session.started().await;
    session
        .service
        .set_history(vec![history_entry(&[("Hubris", 4)])]);

    session.handle.override_dice("Mara", "boast", 90).unwrap();
    let updates = session
        .wait_for(|update| matches!(update, SessionUpdate::TropesChanged(_)))
        .await;

    match updates.last() {
        Some(SessionUpdate::TropesChanged(tags)) => {
            assert_eq!(tags.labels(), vec!["Hubris (+4)"]);
        }
        other => panic!("expected TropesChanged, got {other:?}"),
    }
}

#[tokio::test]
async fn test_director_commands_run_while_advancing() {
    // Arrange
    let service = ScriptedNarrativeService::gated();
    service.set_overridden(critical_failure(12));
    let mut session = Session::start(service);
    session.started().await;
    session.handle.step(StepRequest::Scene).unwrap();
    session.wait_for(is_advancing).await;

    // Act
    session.handle.override_dice("Mara", "leap the gap", 12).unwrap();
    let during = session.wait_for(is_notification).await;
    session.service.release(1);
    session.wait_for(is_idle).await;

    // Assert
    assert_eq!(appended(&during), 1);
    assert!(!during.iter().any(is_idle));
    assert_eq!(session.service.advance_calls(), 1);
}

#[tokio::test]
async fn test_inject_event_notifies_and_reconciles() {
    // Arrange
    let service = ScriptedNarrativeService::new();
    let mut session = Session::start(service);
    session.started().await;

    // Act
    session.handle.inject_event("The harbour floods").unwrap();
    let mut updates = session.wait_for(is_notification).await;
    updates.extend(session.wait_for(is_view).await);

    // Assert
    let notes = notifications(&updates);
    assert_eq!(notes[0].level, NotificationLevel::Success);
    assert_eq!(notes[0].message, "Event injected: The harbour floods");
    assert_eq!(session.service.summary_calls(), 2);
    assert_eq!(appended(&updates), 0);
}

#[tokio::test]
async fn test_force_trope_names_matched_tropes() {
    let service = ScriptedNarrativeService::new();
    let mut session = Session::start(service);
    session.started().await;

    session.handle.force_trope("Chekhov's Gun").unwrap();
    let updates = session.wait_for(is_notification).await;

    assert_eq!(
        notifications(&updates)[0].message,
        "Tropes forced: Chekhov's Gun"
    );
    assert!(
        session
            .service
            .calls()
            .contains(&Call::ForceTrope("Chekhov's Gun".to_owned()))
    );
}

#[tokio::test]
async fn test_redirect_and_thread_choice_reach_the_service() {
    // Arrange
    let service = ScriptedNarrativeService::new();
    let mut session = Session::start(service);
    session.started().await;

    // Act
    session.handle.redirect_character("Ilse", "burn the archive").unwrap();
    let first = session.wait_for(is_notification).await;
    session.handle.choose_thread(1, "advancing").unwrap();
    let second = session.wait_for(is_notification).await;

    // Assert
    assert_eq!(
        notifications(&first)[0].message,
        "Ilse now pursues: burn the archive"
    );
    assert_eq!(
        notifications(&second)[0].message,
        "Thread 1 set to advancing"
    );
    let calls = session.service.calls();
    assert!(calls.contains(&Call::RedirectCharacter("Ilse".to_owned())));
    assert!(calls.contains(&Call::ChooseThread(1)));
}

#[tokio::test]
async fn test_failed_director_command_surfaces_detail() {
    let service = ScriptedNarrativeService::new();
    service.fail_director(SyncError::Rejected {
        status: 404,
        detail: "Character 'Nobody' not found".to_owned(),
    });
    let mut session = Session::start(service);
    session.started().await;

    session.handle.redirect_character("Nobody", "leave").unwrap();
    let updates = session.wait_for(is_notification).await;

    assert_eq!(
        errors(&updates),
        vec!["redirect-character failed: Character 'Nobody' not found"]
    );
}

#[tokio::test]
async fn test_mode_switch_publishes_new_mode() {
    // Arrange
    let service = ScriptedNarrativeService::new();
    let mut session = Session::start(service);
    session.started().await;

    // Act
    session.handle.set_mode(EngineMode::Director).unwrap();
    let mut updates = session
        .wait_for(|update| matches!(update, SessionUpdate::ModeChanged(_)))
        .await;
    updates.extend(session.wait_for(is_view).await);

    // Assert
    assert!(updates.contains(&SessionUpdate::ModeChanged(EngineMode::Director)));
    assert!(session.service.calls().contains(&Call::SetMode(EngineMode::Director)));
    assert_eq!(session.service.summary_calls(), 2);
}

#[tokio::test]
async fn test_failed_mode_switch_keeps_mode() {
    let service = ScriptedNarrativeService::new();
    service.fail_director(SyncError::Transport("connection refused".to_owned()));
    let mut session = Session::start(service);
    session.started().await;

    session.handle.set_mode(EngineMode::Director).unwrap();
    let updates = session.wait_for(is_notification).await;

    assert!(!updates.iter().any(|update| matches!(update, SessionUpdate::ModeChanged(_))));
    assert_eq!(
        errors(&updates),
        vec!["Mode change failed: transport failure: connection refused"]
    );
}
