//! `HttpNarrativeService` against the in-process fake Narrative Service.

use std::time::Duration;

use futures_util::StreamExt;
use playwriter_client::config::ClientConfig;
use playwriter_client::http::HttpNarrativeService;
use playwriter_core::error::SyncError;
use playwriter_core::event::{CreationProgress, NarrativeEvent, StreamFrame};
use playwriter_core::service::NarrativeService;
use playwriter_core::world::{
    CharacterRedirect, CreateWorldRequest, DiceOverride, EngineMode, ProviderSelection,
    ThreadChoice,
};
use playwriter_test_support::FakeNarrativeServer;
use serde_json::json;

fn client(server: &FakeNarrativeServer) -> HttpNarrativeService {
    HttpNarrativeService::new(&ClientConfig::new(&server.base_url())).unwrap()
}

#[tokio::test]
async fn test_advance_posts_steps_and_decodes_events() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.set_events(json!([
        {"type": "scene_composed", "scene_number": 1, "actors": ["Mara"], "setting": "Docks", "beat_count": 2},
        {"type": "beat_resolved", "beat_sequence": 1, "actor": "Mara", "intended_action": "bargain",
         "actual_outcome": "She wins", "dice_outcome": "success", "raw_roll": 72, "final_value": 80,
         "prose": "Mara leans in."},
        {"type": "tide_turned"}
    ]));
    let service = client(&server);

    // Act
    let events = service.advance("world-1", 5).await.unwrap();

    // Assert
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].kind(), "scene_composed");
    match &events[1] {
        NarrativeEvent::BeatResolved(beat) => {
            assert_eq!(beat.final_value, Some(80));
            assert_eq!(beat.outcome().label(), "success");
        }
        other => panic!("expected BeatResolved, got {other:?}"),
    }
    assert_eq!(events[2], NarrativeEvent::Unknown);
    let requests = server.requests();
    assert_eq!(requests[0].path, "/api/narrative/worlds/world-1/advance");
    assert_eq!(requests[0].body, json!({"steps": 5}));
}

#[tokio::test]
async fn test_scene_and_act_advancement_hit_their_routes() {
    let server = FakeNarrativeServer::start().await;
    let service = client(&server);

    service.advance_scene("w1").await.unwrap();
    service.advance_act("w1").await.unwrap();

    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec![
            "/api/narrative/worlds/w1/advance/scene",
            "/api/narrative/worlds/w1/advance/act"
        ]
    );
}

#[tokio::test]
async fn test_rejection_carries_server_detail() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.reject_with(404, r#"{"detail": "World not found"}"#);
    let service = client(&server);

    // Act
    let result = service.advance("missing", 1).await;

    // Assert
    assert_eq!(
        result,
        Err(SyncError::Rejected {
            status: 404,
            detail: "World not found".to_owned()
        })
    );
}

#[tokio::test]
async fn test_rejection_without_body_uses_status_reason() {
    let server = FakeNarrativeServer::start().await;
    server.reject_with(503, "");
    let service = client(&server);

    let result = service.world_summary("w1").await;

    match result {
        Err(SyncError::Rejected { status, detail }) => {
            assert_eq!(status, 503);
            assert_eq!(detail, "Service Unavailable");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_response_times_out() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.delay_responses(Duration::from_secs(5));
    let config = ClientConfig {
        request_timeout: Duration::from_millis(200),
        ..ClientConfig::new(&server.base_url())
    };
    let service = HttpNarrativeService::new(&config).unwrap();

    // Act
    let result = service.advance("w1", 1).await;

    // Assert
    assert_eq!(result, Err(SyncError::Timeout(Duration::from_millis(200))));
}

#[tokio::test]
async fn test_scene_and_act_wait_for_the_unit_timeout() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.delay_responses(Duration::from_millis(600));
    let config = ClientConfig {
        request_timeout: Duration::from_millis(200),
        unit_timeout: Duration::from_secs(5),
        ..ClientConfig::new(&server.base_url())
    };
    let service = HttpNarrativeService::new(&config).unwrap();

    // Act
    let beats = service.advance("w1", 1).await;
    let scene = service.advance_scene("w1").await;
    let act = service.advance_act("w1").await;

    // Assert
    assert_eq!(beats, Err(SyncError::Timeout(Duration::from_millis(200))));
    assert!(scene.is_ok());
    assert!(act.is_ok());
}

#[tokio::test]
async fn test_misshapen_event_is_dropped_from_the_batch() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.set_events(json!([
        {"type": "beat_resolved", "actor": "Mara", "dice_outcome": "success",
         "raw_roll": 72, "final_value": 80, "prose": "Mara leans in."},
        {"type": "scene_composed", "scene_number": 2, "actors": "Mara", "setting": "Docks"},
        {"type": "act_planned", "act_number": 2, "title": "High Water"}
    ]));
    let service = client(&server);

    // Act
    let events = service.advance_act("w1").await.unwrap();

    // Assert
    let kinds: Vec<&str> = events.iter().map(NarrativeEvent::kind).collect();
    assert_eq!(kinds, vec!["beat_resolved", "act_planned"]);
}

#[tokio::test]
async fn test_stream_yields_frames_in_order_and_flags_malformed() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.set_stream_frames(vec![
        json!({"type": "beat_resolved", "actor": "Mara", "raw_roll": 10, "final_value": 12,
            "dice_outcome": "failure", "prose": "She slips."})
        .to_string(),
        "{not json".to_owned(),
        json!({"type": "act_completed", "act_number": 1, "world_events": []}).to_string(),
        json!({"type": "stream_complete"}).to_string(),
    ]);
    let service = client(&server);

    // Act
    let frames: Vec<_> = service
        .open_stream("w1", 20)
        .await
        .unwrap()
        .collect()
        .await;

    // Assert
    assert_eq!(frames.len(), 4);
    assert!(matches!(
        frames[0],
        Ok(StreamFrame::Event(NarrativeEvent::BeatResolved(_)))
    ));
    assert!(matches!(frames[1], Err(SyncError::MalformedFrame(_))));
    assert!(matches!(
        frames[2],
        Ok(StreamFrame::Event(NarrativeEvent::ActCompleted(_)))
    ));
    assert_eq!(frames[3], Ok(StreamFrame::Complete));
    assert_eq!(
        server.requests()[0].path,
        "/api/narrative/worlds/w1/stream?steps=20"
    );
}

#[tokio::test]
async fn test_stream_error_frame_is_surfaced() {
    let server = FakeNarrativeServer::start().await;
    server.set_stream_frames(vec![
        json!({"type": "error", "message": "provider unavailable"}).to_string(),
    ]);
    let service = client(&server);

    let frames: Vec<_> = service.open_stream("w1", 3).await.unwrap().collect().await;

    assert_eq!(
        frames,
        vec![Ok(StreamFrame::Error("provider unavailable".to_owned()))]
    );
}

#[tokio::test]
async fn test_silent_stream_hits_idle_timeout() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    server.set_stream_frames(vec![
        json!({"type": "scene_composed", "scene_number": 1}).to_string(),
    ]);
    server.hang_streams();
    let config = ClientConfig {
        stream_idle_timeout: Duration::from_millis(300),
        ..ClientConfig::new(&server.base_url())
    };
    let service = HttpNarrativeService::new(&config).unwrap();

    // Act
    let frames: Vec<_> = service.open_stream("w1", 3).await.unwrap().collect().await;

    // Assert
    assert_eq!(frames.len(), 2);
    assert!(frames[0].is_ok());
    assert_eq!(
        frames[1],
        Err(SyncError::Timeout(Duration::from_millis(300)))
    );
}

#[tokio::test]
async fn test_stream_open_rejected() {
    let server = FakeNarrativeServer::start().await;
    server.reject_with(404, r#"{"detail": "World not found"}"#);
    let service = client(&server);

    let opened = service.open_stream("w1", 1).await;

    match opened {
        Err(SyncError::Rejected { status, detail }) => {
            assert_eq!(status, 404);
            assert_eq!(detail, "World not found");
        }
        Err(other) => panic!("expected Rejected, got {other:?}"),
        Ok(_) => panic!("expected Rejected, got an open stream"),
    }
}

#[tokio::test]
async fn test_snapshot_endpoints_decode() {
    let server = FakeNarrativeServer::start().await;
    let service = client(&server);

    let summary = service.world_summary("w1").await.unwrap();
    let roster = service.characters("w1").await.unwrap();
    let history = service.dice_history("w1").await.unwrap();

    assert_eq!(summary.id, "w1");
    assert_eq!(summary.acts[0].scenes[0].beats.len(), 1);
    assert_eq!(summary.threads[0].tension, 7);
    assert_eq!(roster["Mara"].short_term_memory, vec!["the flood".to_owned()]);
    assert!(roster["Ilse"].ambitions.is_empty());
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].roll.fate_modifiers[0].trope, "Omen");
}

#[tokio::test]
async fn test_director_operations_send_expected_bodies() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    let service = client(&server);

    // Act
    let beat = service
        .override_dice(
            "w1",
            &DiceOverride {
                actor: "Mara".into(),
                action: "climb".into(),
                forced_roll: 5,
            },
        )
        .await
        .unwrap();
    let injected = service.inject_event("w1", "The dam bursts").await.unwrap();
    let tropes = service.force_trope("w1", "betrayal").await.unwrap();
    let character = service
        .redirect_character(
            "w1",
            &CharacterRedirect {
                character_name: "Ilse".into(),
                new_direction: "flee the city".into(),
            },
        )
        .await
        .unwrap();
    let thread = service
        .choose_thread(
            "w1",
            &ThreadChoice {
                thread_index: 0,
                new_status: "advancing".into(),
            },
        )
        .await
        .unwrap();

    // Assert
    let NarrativeEvent::BeatResolved(resolved) = beat.into_event() else {
        panic!("expected BeatResolved");
    };
    assert_eq!(resolved.raw_roll, Some(5));
    assert_eq!(resolved.final_value, Some(4));
    assert_eq!(resolved.outcome().label(), "critical_failure");
    assert_eq!(injected.description, "The dam bursts");
    assert_eq!(tropes[0].name, "betrayal");
    assert_eq!(character.ambitions, "flee the city");
    assert_eq!(thread.thread, "Who flooded the vault?");
    assert_eq!(thread.tension, 8);

    let requests = server.requests();
    assert_eq!(
        requests[0].body,
        json!({"actor": "Mara", "action": "climb", "forced_roll": 5})
    );
    assert_eq!(requests[1].body, json!({"event_description": "The dam bursts"}));
    assert_eq!(requests[2].body, json!({"trope_query": "betrayal"}));
    assert_eq!(
        requests[4].body,
        json!({"thread_index": 0, "new_status": "advancing"})
    );
}

#[tokio::test]
async fn test_mode_switch_round_trips() {
    let server = FakeNarrativeServer::start().await;
    let service = client(&server);

    let mode = service.set_mode("w1", EngineMode::Director).await.unwrap();

    assert_eq!(mode, EngineMode::Director);
    assert_eq!(server.requests()[0].body, json!({"mode": "director"}));
}

#[tokio::test]
async fn test_world_creation_and_listing() {
    // Arrange
    let server = FakeNarrativeServer::start().await;
    let service = client(&server);
    let request = CreateWorldRequest {
        num_characters: Some(2),
        ..CreateWorldRequest::new("A drowned city")
    };

    // Act
    let created = service.create_world(&request).await.unwrap();
    let progress: Vec<_> = service
        .create_world_streaming(&request)
        .await
        .unwrap()
        .collect()
        .await;
    let worlds = service.list_worlds().await.unwrap();

    // Assert
    assert_eq!(created.world_id, "world-1");
    assert_eq!(progress.len(), 3);
    match progress.last() {
        Some(Ok(CreationProgress::Done(done))) => assert_eq!(done.thread_count, 2),
        other => panic!("expected Done, got {other:?}"),
    }
    assert_eq!(worlds[0].mode, EngineMode::Autonomous);
    assert_eq!(
        server.requests()[0].body,
        json!({"seed_description": "A drowned city", "mode": "autonomous",
            "trope_pool_size": 30, "num_characters": 2})
    );
}

#[tokio::test]
async fn test_provider_selection() {
    let server = FakeNarrativeServer::start().await;
    let service = client(&server);

    let catalog = service.providers().await.unwrap();
    let selected = service
        .select_provider(&ProviderSelection {
            name: "anthropic".into(),
            model: None,
        })
        .await
        .unwrap();

    assert_eq!(catalog.active.as_deref(), Some("ollama"));
    assert!(catalog.providers.contains_key("ollama"));
    assert_eq!(selected.active.as_deref(), Some("anthropic"));
    assert_eq!(server.requests()[1].body, json!({"name": "anthropic"}));
}
