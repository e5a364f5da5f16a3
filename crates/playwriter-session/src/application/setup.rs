//! World creation and provider selection, before a session exists.

use futures_util::{Stream, StreamExt};
use playwriter_core::error::SyncError;
use playwriter_core::event::CreationProgress;
use playwriter_core::service::NarrativeService;
use playwriter_core::world::{CreateWorldRequest, ProviderCatalog, ProviderSelection, WorldCreated};
use tracing::{info, instrument, warn};

/// Creates a world with a single request.
///
/// # Errors
///
/// Returns `SyncError::InvalidRequest` for a blank seed, otherwise whatever
/// the service reports.
#[instrument(skip_all, fields(seed_len = request.seed_description.len()))]
pub async fn create_world(
    service: &dyn NarrativeService,
    request: &CreateWorldRequest,
) -> Result<WorldCreated, SyncError> {
    check_seed(request)?;
    let created = service.create_world(request).await?;
    info!(world_id = %created.world_id, characters = created.characters.len(), "World created");
    Ok(created)
}

/// Creates a world over the progress stream, reporting each generation step
/// to `on_progress` as `(step, detail)`.
///
/// # Errors
///
/// Returns `SyncError::InvalidRequest` for a blank seed,
/// `SyncError::StreamAborted` if generation fails or the stream ends before
/// the world exists, or the transport error that ended the stream.
#[instrument(skip_all, fields(seed_len = request.seed_description.len()))]
pub async fn create_world_with_progress<F>(
    service: &dyn NarrativeService,
    request: &CreateWorldRequest,
    on_progress: F,
) -> Result<WorldCreated, SyncError>
where
    F: FnMut(&str, &str),
{
    check_seed(request)?;
    let progress = service.create_world_streaming(request).await?;
    let created = follow_progress(progress, on_progress).await?;
    info!(world_id = %created.world_id, "World created");
    Ok(created)
}

/// Switches the service's LLM provider.
///
/// # Errors
///
/// Returns whatever the service reports.
#[instrument(skip(service))]
pub async fn select_provider(
    service: &dyn NarrativeService,
    name: &str,
    model: Option<&str>,
) -> Result<ProviderCatalog, SyncError> {
    let selection = ProviderSelection {
        name: name.to_owned(),
        model: model.map(str::to_owned),
    };
    let catalog = service.select_provider(&selection).await?;
    info!(active = ?catalog.active, "Provider selected");
    Ok(catalog)
}

fn check_seed(request: &CreateWorldRequest) -> Result<(), SyncError> {
    if request.seed_description.trim().is_empty() {
        return Err(SyncError::InvalidRequest(
            "seed description must not be blank".to_owned(),
        ));
    }
    Ok(())
}

async fn follow_progress<S, F>(
    mut progress: S,
    mut on_progress: F,
) -> Result<WorldCreated, SyncError>
where
    S: Stream<Item = Result<CreationProgress, SyncError>> + Unpin,
    F: FnMut(&str, &str),
{
    while let Some(item) = progress.next().await {
        match item {
            Ok(CreationProgress::Step { step, detail }) => on_progress(&step, &detail),
            Ok(CreationProgress::Done(created)) => return Ok(created),
            Ok(CreationProgress::Failed(message)) => return Err(SyncError::StreamAborted(message)),
            Err(error) if error.is_frame_local() => {
                warn!(error = %error, "Malformed progress frame skipped");
            }
            Err(error) => return Err(error),
        }
    }
    Err(SyncError::StreamAborted(
        "progress stream ended before the world was created".to_owned(),
    ))
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use playwriter_test_support::{Call, FailingNarrativeService, ScriptedNarrativeService};

    use super::*;

    fn step(name: &str) -> Result<CreationProgress, SyncError> {
        Ok(CreationProgress::Step {
            step: name.to_owned(),
            detail: format!("{name} done"),
        })
    }

    #[tokio::test]
    async fn test_progress_steps_are_reported_in_order() {
        // Arrange
        let service = ScriptedNarrativeService::new();
        let mut seen = Vec::new();

        // Act
        let created = create_world_with_progress(
            &service,
            &CreateWorldRequest::new("A drowned city"),
            |step, _| seen.push(step.to_owned()),
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(created.world_id, "world-1");
        assert_eq!(seen, vec!["seeding"]);
        assert_eq!(
            service.calls(),
            vec![Call::CreateWorldStreaming("A drowned city".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_failed_generation_is_stream_aborted() {
        let frames = stream::iter(vec![
            step("seeding"),
            Ok(CreationProgress::Failed("model unavailable".to_owned())),
        ]);

        let result = follow_progress(frames, |_, _| {}).await;

        assert_eq!(
            result,
            Err(SyncError::StreamAborted("model unavailable".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_stream_ending_early_is_stream_aborted() {
        let frames = stream::iter(vec![step("seeding"), step("characters")]);

        let result = follow_progress(frames, |_, _| {}).await;

        match result {
            Err(SyncError::StreamAborted(_)) => {}
            other => panic!("expected StreamAborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_progress_frame_is_skipped() {
        // Arrange
        let frames = stream::iter(vec![
            Err(SyncError::MalformedFrame("not json".to_owned())),
            step("seeding"),
            Ok(CreationProgress::Done(WorldCreated {
                world_id: "w-9".to_owned(),
                ..WorldCreated::default()
            })),
        ]);
        let mut steps = 0;

        // Act
        let created = follow_progress(frames, |_, _| steps += 1).await.unwrap();

        // Assert
        assert_eq!(created.world_id, "w-9");
        assert_eq!(steps, 1);
    }

    #[tokio::test]
    async fn test_blank_seed_is_refused_without_a_call() {
        let service = ScriptedNarrativeService::new();

        let result = create_world(&service, &CreateWorldRequest::new("   ")).await;

        assert!(matches!(result, Err(SyncError::InvalidRequest(_))));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_world_propagates_transport_failure() {
        let result = create_world(&FailingNarrativeService, &CreateWorldRequest::new("seed")).await;

        assert_eq!(
            result,
            Err(SyncError::Transport("connection refused".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_select_provider_sends_name_and_model() {
        let service = ScriptedNarrativeService::new();

        let catalog = select_provider(&service, "anthropic", Some("sonnet"))
            .await
            .unwrap();

        assert_eq!(catalog.active.as_deref(), Some("anthropic"));
        assert_eq!(catalog.active_model.as_deref(), Some("sonnet"));
        assert_eq!(service.calls(), vec![Call::SelectProvider("anthropic".to_owned())]);
    }
}
