//! `reqwest` implementation of the Narrative Service port.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use playwriter_core::dice::{DiceHistory, DiceHistoryEntry, Trope};
use playwriter_core::error::SyncError;
use playwriter_core::event::{
    CreationProgress, EventBatch, NarrativeEvent, OverriddenBeat, StreamFrame,
};
use playwriter_core::service::{FrameStream, NarrativeService, ProgressStream};
use playwriter_core::world::{
    Character, CharacterRedirect, CreateWorldRequest, DiceOverride, EngineMode, InjectedEvent,
    ProviderCatalog, ProviderSelection, Roster, ThreadChoice, ThreadState, WorldCreated,
    WorldListing, WorldSummary,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::sse;

const NARRATIVE: &str = "/api/narrative";

#[derive(Serialize)]
struct AdvanceBody {
    steps: u32,
}

#[derive(Serialize, Deserialize)]
struct ModeBody {
    mode: EngineMode,
}

#[derive(Serialize)]
struct InjectBody<'a> {
    event_description: &'a str,
}

#[derive(Serialize)]
struct TropeBody<'a> {
    trope_query: &'a str,
}

/// Narrative Service client over HTTP.
///
/// Request/response calls share one client and carry a total timeout per
/// request; scene and act advancement get the longer unit timeout. Streams
/// use a second client with only a connect timeout; their liveness is
/// bounded by the per-chunk idle timeout instead.
#[derive(Clone)]
pub struct HttpNarrativeService {
    client: Client,
    stream_client: Client,
    base_url: String,
    request_timeout: Duration,
    unit_timeout: Duration,
    stream_idle_timeout: Duration,
}

impl HttpNarrativeService {
    /// Builds the HTTP clients.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Config` if the TLS backend cannot initialize.
    pub fn new(config: &ClientConfig) -> Result<Self, SyncError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;
        Ok(Self {
            client,
            stream_client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            request_timeout: config.request_timeout,
            unit_timeout: config.unit_timeout,
            stream_idle_timeout: config.stream_idle_timeout,
        })
    }

    fn world_url(&self, world_id: &str, tail: &str) -> String {
        format!("{}{NARRATIVE}/worlds/{world_id}{tail}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        call_within(request, self.request_timeout).await
    }

    async fn open(&self, request: RequestBuilder) -> Result<Response, SyncError> {
        let response = request
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        accepted(response).await
    }
}

async fn call_within<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T, SyncError> {
    let transport = |e: reqwest::Error| {
        if e.is_timeout() {
            SyncError::Timeout(timeout)
        } else {
            SyncError::Transport(e.to_string())
        }
    };
    let response = request.timeout(timeout).send().await.map_err(transport)?;
    let response = accepted(response).await?;
    let body = response.text().await.map_err(transport)?;
    serde_json::from_str(&body).map_err(|e| SyncError::InvalidResponse(e.to_string()))
}

async fn batch_within(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<Vec<NarrativeEvent>, SyncError> {
    let batch: EventBatch = call_within(request, timeout).await?;
    Ok(well_formed(batch))
}

/// Keeps every event that decodes; logs and drops the rest.
fn well_formed(batch: EventBatch) -> Vec<NarrativeEvent> {
    batch
        .decode()
        .filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(error) => {
                warn!(error = %error, "Malformed event skipped");
                None
            }
        })
        .collect()
}

/// Passes success responses through; turns anything else into `Rejected`.
async fn accepted(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = rejection_detail(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
    warn!(status = status.as_u16(), detail = %detail, "Request rejected");
    Err(SyncError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

/// Prefers the service's `{"detail": ...}` message, then the raw body.
fn rejection_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_owned()),
        },
        _ => Some(trimmed.to_owned()),
    }
}

#[async_trait]
impl NarrativeService for HttpNarrativeService {
    #[instrument(skip(self))]
    async fn providers(&self) -> Result<ProviderCatalog, SyncError> {
        self.call(self.client.get(format!("{}/api/providers", self.base_url)))
            .await
    }

    #[instrument(skip(self), fields(provider = %selection.name))]
    async fn select_provider(
        &self,
        selection: &ProviderSelection,
    ) -> Result<ProviderCatalog, SyncError> {
        self.call(
            self.client
                .put(format!("{}/api/providers/active", self.base_url))
                .json(selection),
        )
        .await
    }

    #[instrument(skip(self, request))]
    async fn create_world(&self, request: &CreateWorldRequest) -> Result<WorldCreated, SyncError> {
        self.call(
            self.client
                .post(format!("{}{NARRATIVE}/worlds", self.base_url))
                .json(request),
        )
        .await
    }

    #[instrument(skip(self, request))]
    async fn create_world_streaming(
        &self,
        request: &CreateWorldRequest,
    ) -> Result<ProgressStream, SyncError> {
        let response = self
            .open(
                self.stream_client
                    .post(format!("{}{NARRATIVE}/worlds/stream", self.base_url))
                    .json(request),
            )
            .await?;
        debug!("Creation stream opened");
        let progress = sse::payloads(response.bytes_stream().boxed(), self.stream_idle_timeout)
            .map(|item| item.and_then(|data| CreationProgress::parse(&data)));
        Ok(progress.boxed())
    }

    #[instrument(skip(self))]
    async fn list_worlds(&self) -> Result<Vec<WorldListing>, SyncError> {
        self.call(self.client.get(format!("{}{NARRATIVE}/worlds", self.base_url)))
            .await
    }

    #[instrument(skip(self))]
    async fn advance(&self, world_id: &str, steps: u32) -> Result<Vec<NarrativeEvent>, SyncError> {
        batch_within(
            self.client
                .post(self.world_url(world_id, "/advance"))
                .json(&AdvanceBody { steps }),
            self.request_timeout,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn advance_scene(&self, world_id: &str) -> Result<Vec<NarrativeEvent>, SyncError> {
        batch_within(
            self.client.post(self.world_url(world_id, "/advance/scene")),
            self.unit_timeout,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn advance_act(&self, world_id: &str) -> Result<Vec<NarrativeEvent>, SyncError> {
        batch_within(
            self.client.post(self.world_url(world_id, "/advance/act")),
            self.unit_timeout,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn open_stream(&self, world_id: &str, steps: u32) -> Result<FrameStream, SyncError> {
        let response = self
            .open(
                self.stream_client
                    .get(self.world_url(world_id, "/stream"))
                    .query(&[("steps", steps)]),
            )
            .await?;
        debug!("Advancement stream opened");
        let frames = sse::payloads(response.bytes_stream().boxed(), self.stream_idle_timeout)
            .map(|item| item.and_then(|data| StreamFrame::parse(&data)));
        Ok(frames.boxed())
    }

    #[instrument(skip(self))]
    async fn world_summary(&self, world_id: &str) -> Result<WorldSummary, SyncError> {
        self.call(self.client.get(self.world_url(world_id, "/summary")))
            .await
    }

    #[instrument(skip(self))]
    async fn characters(&self, world_id: &str) -> Result<Roster, SyncError> {
        self.call(self.client.get(self.world_url(world_id, "/characters")))
            .await
    }

    #[instrument(skip(self))]
    async fn dice_history(&self, world_id: &str) -> Result<Vec<DiceHistoryEntry>, SyncError> {
        let history: DiceHistory = self
            .call(self.client.get(self.world_url(world_id, "/dice-history")))
            .await?;
        Ok(history.rolls)
    }

    #[instrument(skip(self))]
    async fn set_mode(&self, world_id: &str, mode: EngineMode) -> Result<EngineMode, SyncError> {
        let body: ModeBody = self
            .call(
                self.client
                    .put(self.world_url(world_id, "/mode"))
                    .json(&ModeBody { mode }),
            )
            .await?;
        Ok(body.mode)
    }

    #[instrument(skip(self))]
    async fn override_dice(
        &self,
        world_id: &str,
        request: &DiceOverride,
    ) -> Result<OverriddenBeat, SyncError> {
        self.call(
            self.client
                .post(self.world_url(world_id, "/director/override-dice"))
                .json(request),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn inject_event(
        &self,
        world_id: &str,
        description: &str,
    ) -> Result<InjectedEvent, SyncError> {
        self.call(
            self.client
                .post(self.world_url(world_id, "/director/inject-event"))
                .json(&InjectBody {
                    event_description: description,
                }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn force_trope(&self, world_id: &str, query: &str) -> Result<Vec<Trope>, SyncError> {
        self.call(
            self.client
                .post(self.world_url(world_id, "/director/force-trope"))
                .json(&TropeBody { trope_query: query }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn redirect_character(
        &self,
        world_id: &str,
        request: &CharacterRedirect,
    ) -> Result<Character, SyncError> {
        self.call(
            self.client
                .post(self.world_url(world_id, "/director/redirect-character"))
                .json(request),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn choose_thread(
        &self,
        world_id: &str,
        request: &ThreadChoice,
    ) -> Result<ThreadState, SyncError> {
        self.call(
            self.client
                .post(self.world_url(world_id, "/director/choose-thread"))
                .json(request),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_prefers_detail_field() {
        assert_eq!(
            rejection_detail(r#"{"detail": "World not found"}"#),
            Some("World not found".to_owned())
        );
    }

    #[test]
    fn test_rejection_serializes_structured_detail() {
        let detail = rejection_detail(r#"{"detail": [{"loc": ["body", "steps"]}]}"#).unwrap();
        assert!(detail.contains("steps"));
    }

    #[test]
    fn test_rejection_falls_back_to_raw_body() {
        assert_eq!(
            rejection_detail("upstream exploded"),
            Some("upstream exploded".to_owned())
        );
        assert_eq!(rejection_detail("  "), None);
    }

    #[test]
    fn test_world_urls_use_narrative_prefix() {
        let service = HttpNarrativeService::new(&ClientConfig::new("http://host:8000/")).unwrap();
        assert_eq!(
            service.world_url("w1", "/advance/scene"),
            "http://host:8000/api/narrative/worlds/w1/advance/scene"
        );
    }
}
