//! An in-process Narrative Service over HTTP for client integration tests.
//!
//! Serves canned JSON on the real route table, records every request, and
//! can be told to reject, delay, or hang its streams.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, body::Bytes};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

/// One request as the fake server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Path, plus query string for streams.
    pub path: String,
    /// JSON body, or `Null`.
    pub body: Value,
}

struct FakeState {
    requests: Mutex<Vec<RecordedRequest>>,
    events: Mutex<Value>,
    stream_frames: Mutex<Vec<String>>,
    stream_hangs: Mutex<bool>,
    rejection: Mutex<Option<(StatusCode, String)>>,
    delay: Mutex<Option<Duration>>,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            requests: Mutex::default(),
            events: Mutex::new(json!([])),
            stream_frames: Mutex::new(vec![json!({"type": "stream_complete"}).to_string()]),
            stream_hangs: Mutex::new(false),
            rejection: Mutex::default(),
            delay: Mutex::default(),
        }
    }
}

/// A running fake Narrative Service bound to an ephemeral local port.
///
/// The server task is aborted on drop.
pub struct FakeNarrativeServer {
    addr: SocketAddr,
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeNarrativeServer {
    /// Binds `127.0.0.1:0` and starts serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind.
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = router(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Sets the `events` array returned by the advancement endpoints.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_events(&self, events: Value) {
        *self.state.events.lock().unwrap() = events;
    }

    /// Sets the raw `data:` payloads of the advancement stream.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_stream_frames(&self, frames: Vec<String>) {
        *self.state.stream_frames.lock().unwrap() = frames;
    }

    /// Keeps streams open, silent, after their frames are sent.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn hang_streams(&self) {
        *self.state.stream_hangs.lock().unwrap() = true;
    }

    /// Answers every JSON endpoint and the advancement stream with `status`
    /// and a raw `body`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn reject_with(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap();
        *self.state.rejection.lock().unwrap() = Some((status, body.to_owned()));
    }

    /// Delays every JSON response by `delay`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delay_responses(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    /// Returns all requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeNarrativeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: Arc<FakeState>) -> Router {
    Router::new()
        .route("/api/providers", get(providers))
        .route("/api/providers/active", put(select_provider))
        .route("/api/narrative/worlds", post(create_world).get(list_worlds))
        .route("/api/narrative/worlds/stream", post(create_world_stream))
        .route("/api/narrative/worlds/{id}/summary", get(summary))
        .route("/api/narrative/worlds/{id}/characters", get(characters))
        .route("/api/narrative/worlds/{id}/dice-history", get(dice_history))
        .route("/api/narrative/worlds/{id}/advance", post(advance))
        .route("/api/narrative/worlds/{id}/advance/scene", post(advance_unit))
        .route("/api/narrative/worlds/{id}/advance/act", post(advance_unit))
        .route("/api/narrative/worlds/{id}/stream", get(stream_narrative))
        .route("/api/narrative/worlds/{id}/mode", put(set_mode))
        .route("/api/narrative/worlds/{id}/director/{op}", post(director))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn record(state: &FakeState, method: &str, path: String, body: Value) {
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_owned(),
        path,
        body,
    });
}

async fn reply(state: &FakeState, ok: Value) -> Response {
    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let rejection = state.rejection.lock().unwrap().clone();
    match rejection {
        Some((status, body)) => (status, body).into_response(),
        None => Json(ok).into_response(),
    }
}

fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

async fn providers(State(state): State<Arc<FakeState>>) -> Response {
    record(&state, "GET", "/api/providers".into(), Value::Null);
    reply(
        &state,
        json!({"active": "ollama", "active_model": null, "providers": {"ollama": {"available": true}}}),
    )
    .await
}

async fn select_provider(State(state): State<Arc<FakeState>>, body: Bytes) -> Response {
    let body = parse_body(&body);
    record(&state, "PUT", "/api/providers/active".into(), body.clone());
    reply(
        &state,
        json!({"active": body["name"], "active_model": body["model"], "providers": {}}),
    )
    .await
}

fn created() -> Value {
    json!({"world_id": "world-1", "status": "in_progress", "characters": ["Mara", "Ilse"],
        "thread_count": 2, "trope_pool_size": 30})
}

async fn create_world(State(state): State<Arc<FakeState>>, body: Bytes) -> Response {
    record(&state, "POST", "/api/narrative/worlds".into(), parse_body(&body));
    reply(&state, created()).await
}

async fn create_world_stream(
    State(state): State<Arc<FakeState>>,
    body: Bytes,
) -> Sse<BoxStream<'static, Result<Event, Infallible>>> {
    record(
        &state,
        "POST",
        "/api/narrative/worlds/stream".into(),
        parse_body(&body),
    );
    let mut done = created();
    done["step"] = json!("done");
    let frames = vec![
        json!({"step": "seeding", "detail": "Drafting the premise"}),
        json!({"step": "characters", "detail": "Casting 2 characters"}),
        done,
    ];
    let events = frames
        .into_iter()
        .map(|frame| Ok(Event::default().data(frame.to_string())));
    Sse::new(stream::iter(events).boxed())
}

async fn list_worlds(State(state): State<Arc<FakeState>>) -> Response {
    record(&state, "GET", "/api/narrative/worlds".into(), Value::Null);
    reply(
        &state,
        json!([{"id": "world-1", "seed_description": "A drowned city", "status": "in_progress",
            "mode": "autonomous", "acts": 1, "characters": ["Mara"], "threads": 2}]),
    )
    .await
}

async fn summary(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Response {
    record(
        &state,
        "GET",
        format!("/api/narrative/worlds/{id}/summary"),
        Value::Null,
    );
    reply(
        &state,
        json!({
            "id": id, "status": "in_progress", "mode": "autonomous",
            "teleology": "Pride precedes ruin", "context": "A drowned city",
            "characters": ["Mara", "Ilse"],
            "threads": [{"thread": "Who flooded the vault?", "status": "active", "tension": 7}],
            "acts": [{"id": "a1", "number": 1, "title": "Low Tide", "status": "in_progress",
                "scenes": [{"id": "s1", "number": 1, "actors": ["Mara"], "setting": "Docks",
                    "status": "in_progress",
                    "beats": [{"sequence": 1, "actor": "Mara", "outcome": "success",
                        "prose_preview": "Mara leans in."}]}],
                "world_events": []}]
        }),
    )
    .await
}

async fn characters(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Response {
    record(
        &state,
        "GET",
        format!("/api/narrative/worlds/{id}/characters"),
        Value::Null,
    );
    reply(
        &state,
        json!({
            "Mara": {"name": "Mara", "internal_state": "wary", "ambitions": "reclaim the vault",
                "teleology": "", "philosophy": "", "physical_state": "tired",
                "long_term_memory": [], "short_term_memory": ["the flood"],
                "internal_contradictions": []},
            "Ilse": {"name": "Ilse"}
        }),
    )
    .await
}

async fn dice_history(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Response {
    record(
        &state,
        "GET",
        format!("/api/narrative/worlds/{id}/dice-history"),
        Value::Null,
    );
    reply(
        &state,
        json!({"rolls": [
            {"act": 1, "scene": 1, "beat": 1, "actor": "Mara", "action": "bargain",
                "raw_roll": 72, "fate_modifiers": [{"trope": "Betrayal", "modifier": 5, "rationale": ""}],
                "final_value": 77, "outcome": "success"},
            {"act": 1, "scene": 1, "beat": 2, "actor": "Ilse", "action": "hide",
                "raw_roll": 20, "fate_modifiers": [{"trope": "Omen", "modifier": -3, "rationale": ""}],
                "final_value": 17, "outcome": "failure"}
        ]}),
    )
    .await
}

async fn advance(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    record(
        &state,
        "POST",
        format!("/api/narrative/worlds/{id}/advance"),
        parse_body(&body),
    );
    let events = state.events.lock().unwrap().clone();
    reply(&state, json!({ "events": events })).await
}

async fn advance_unit(
    State(state): State<Arc<FakeState>>,
    uri: axum::http::Uri,
) -> Response {
    record(&state, "POST", uri.path().to_owned(), Value::Null);
    let events = state.events.lock().unwrap().clone();
    reply(&state, json!({ "events": events })).await
}

#[derive(serde::Deserialize)]
struct StreamParams {
    #[serde(default)]
    steps: Option<u32>,
}

async fn stream_narrative(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    let steps = params.steps.unwrap_or(10);
    record(
        &state,
        "GET",
        format!("/api/narrative/worlds/{id}/stream?steps={steps}"),
        Value::Null,
    );
    let rejection = state.rejection.lock().unwrap().clone();
    if let Some((status, body)) = rejection {
        return (status, body).into_response();
    }
    let frames = state.stream_frames.lock().unwrap().clone();
    let hangs = *state.stream_hangs.lock().unwrap();
    let events = stream::iter(
        frames
            .into_iter()
            .map(|frame| Ok::<_, Infallible>(Event::default().data(frame))),
    );
    if hangs {
        Sse::new(events.chain(stream::pending()).boxed()).into_response()
    } else {
        Sse::new(events.boxed()).into_response()
    }
}

async fn set_mode(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    record(
        &state,
        "PUT",
        format!("/api/narrative/worlds/{id}/mode"),
        body.clone(),
    );
    reply(&state, json!({ "mode": body["mode"] })).await
}

async fn director(
    State(state): State<Arc<FakeState>>,
    Path((id, op)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let body = parse_body(&body);
    record(
        &state,
        "POST",
        format!("/api/narrative/worlds/{id}/director/{op}"),
        body.clone(),
    );
    let ok = match op.as_str() {
        "override-dice" => json!({
            "id": "b9", "scene_id": "s1", "sequence": 4, "actor": body["actor"],
            "intended_action": body["action"],
            "dice_roll": {"raw_roll": body["forced_roll"], "fate_modifiers": [
                {"trope": {"trope_id": "t1", "name": "Omen", "description": ""},
                 "modifier": -1, "rationale": "dark skies"}],
                "final_value": body["forced_roll"].as_i64().map(|v| v - 1),
                "outcome": "critical_failure", "modifier_explanation": ""},
            "actual_outcome": "It goes badly", "prose": "The rope snaps.",
            "tropes_considered": [], "character_state_changes": {}
        }),
        "inject-event" => json!({
            "id": "we1", "description": body["event_description"],
            "impact_on_context": "", "affected_characters": ["Mara"], "timestamp": null
        }),
        "redirect-character" => json!({"name": body["character_name"], "ambitions": body["new_direction"]}),
        "force-trope" => json!([{"trope_id": "t7", "name": body["trope_query"], "description": ""}]),
        "choose-thread" => json!({
            "thread": {"thread": "Who flooded the vault?"}, "status": body["new_status"],
            "tension_level": 8, "notes": ""
        }),
        _ => return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response(),
    };
    reply(&state, ok).await
}
