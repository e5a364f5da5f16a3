//! Drives one world from configuration to a finished run.

use std::io::Write;
use std::sync::Arc;

use playwriter_client::http::HttpNarrativeService;
use playwriter_core::clock::{Clock, SystemClock};
use playwriter_core::service::NarrativeService;
use playwriter_session::application::controller::spawn_session;
use playwriter_session::application::handle::SessionHandle;
use playwriter_session::application::setup;
use playwriter_session::domain::commands::StepRequest;
use playwriter_session::domain::config::SessionConfig;
use playwriter_session::domain::updates::{AdvancementPhase, SessionUpdate};
use playwriter_transcript::domain::entries::NotificationLevel;
use tracing::{info, instrument, warn};

use crate::config::{Drive, RunnerConfig, Target};
use crate::error::AppError;
use crate::render::render;

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// World that was driven.
    pub world_id: String,
    /// Transcript entries appended during the run.
    pub entries: usize,
    /// Error notifications seen during the run.
    pub errors: usize,
    /// Whether the last view reported the story finished.
    pub completed: bool,
}

impl RunSummary {
    fn observe(&mut self, update: &SessionUpdate) {
        match update {
            SessionUpdate::TranscriptAppended(_) => self.entries += 1,
            SessionUpdate::Notification(n) if n.level == NotificationLevel::Error => {
                self.errors += 1;
            }
            SessionUpdate::ViewReplaced(view) => self.completed = view.is_completed(),
            _ => {}
        }
    }
}

/// Runs against the configured Narrative Service, printing to stdout.
///
/// # Errors
///
/// Returns `AppError` if the client cannot be built, world setup fails, or
/// stdout cannot be written.
pub async fn run(config: RunnerConfig) -> Result<RunSummary, AppError> {
    let service: Arc<dyn NarrativeService> = Arc::new(HttpNarrativeService::new(&config.client)?);
    let mut stdout = std::io::stdout();
    drive(service, SystemClock::shared(), &config, &mut stdout).await
}

/// Sets up the world, drives it as configured and writes every rendered
/// update to `out`. Returns once the session has closed.
///
/// # Errors
///
/// Returns `AppError` if provider selection or world creation fails, the
/// session ends before it can be driven, or `out` cannot be written.
#[instrument(skip_all, fields(drive = %config.drive, steps = config.steps))]
pub async fn drive<W: Write>(
    service: Arc<dyn NarrativeService>,
    clock: Arc<dyn Clock>,
    config: &RunnerConfig,
    out: &mut W,
) -> Result<RunSummary, AppError> {
    if let Some(provider) = &config.provider {
        setup::select_provider(service.as_ref(), &provider.name, provider.model.as_deref())
            .await?;
    }

    let world_id = match &config.target {
        Target::Attach(world_id) => world_id.clone(),
        Target::Create(request) => {
            let mut written = Ok(());
            let created =
                setup::create_world_with_progress(service.as_ref(), request, |step, detail| {
                    if written.is_ok() {
                        written = writeln!(out, "creating: {step} ({detail})");
                    }
                })
                .await?;
            written?;
            writeln!(
                out,
                "world {} created with {}",
                created.world_id,
                created.characters.join(", ")
            )?;
            created.world_id
        }
    };
    info!(world_id = %world_id, "Driving world");

    let (handle, mut updates) = spawn_session(
        world_id.clone(),
        Arc::clone(&service),
        clock,
        SessionConfig::default(),
    );
    if let (Target::Attach(_), Some(mode)) = (&config.target, config.mode) {
        handle.set_mode(mode)?;
    }
    start(&handle, config)?;

    let mut progress = Progress::new(config.drive, config.steps);
    let mut summary = RunSummary {
        world_id,
        ..RunSummary::default()
    };
    while let Some(update) = updates.recv().await {
        for line in render(&update) {
            writeln!(out, "{line}")?;
        }
        summary.observe(&update);
        match progress.observe(&update) {
            Next::Continue => {}
            Next::Finish => {
                handle.stop_auto_advance()?;
                handle.reconcile()?;
            }
            Next::Shutdown => handle.shutdown()?,
        }
    }

    if summary.errors > 0 {
        warn!(errors = summary.errors, "Run finished with errors");
    }
    Ok(summary)
}

fn start(handle: &SessionHandle, config: &RunnerConfig) -> Result<(), AppError> {
    match config.drive {
        Drive::Stream => handle.open_stream(config.steps)?,
        Drive::Auto => handle.start_auto_advance()?,
        Drive::Beats => handle.step(StepRequest::Beats(config.steps))?,
        Drive::Scene => handle.step(StepRequest::Scene)?,
        Drive::Act => handle.step(StepRequest::Act)?,
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Waiting,
    Running,
    Finishing,
    Done,
}

#[derive(Debug, PartialEq, Eq)]
enum Next {
    Continue,
    /// Stop triggering and fetch a final view.
    Finish,
    Shutdown,
}

/// Decides when the run has done what it was asked.
struct Progress {
    drive: Drive,
    target: u32,
    settled: u32,
    stage: Stage,
}

impl Progress {
    fn new(drive: Drive, target: u32) -> Self {
        Self {
            drive,
            target,
            settled: 0,
            stage: Stage::Waiting,
        }
    }

    fn observe(&mut self, update: &SessionUpdate) -> Next {
        match (self.stage, update) {
            (
                Stage::Waiting | Stage::Running,
                SessionUpdate::PhaseChanged(AdvancementPhase::Advancing(_)),
            ) => {
                self.stage = Stage::Running;
                Next::Continue
            }
            (Stage::Running, SessionUpdate::PhaseChanged(AdvancementPhase::Idle)) => {
                self.settled += 1;
                if self.drive != Drive::Auto || self.settled >= self.target {
                    self.finish()
                } else {
                    Next::Continue
                }
            }
            (Stage::Waiting | Stage::Running, SessionUpdate::AutoAdvanceChanged(false)) => {
                self.finish()
            }
            (Stage::Finishing, SessionUpdate::ViewReplaced(_)) => {
                self.stage = Stage::Done;
                Next::Shutdown
            }
            (Stage::Finishing, SessionUpdate::Notification(n))
                if n.level == NotificationLevel::Warning =>
            {
                self.stage = Stage::Done;
                Next::Shutdown
            }
            _ => Next::Continue,
        }
    }

    fn finish(&mut self) -> Next {
        self.stage = Stage::Finishing;
        Next::Finish
    }
}

#[cfg(test)]
mod tests {
    use playwriter_core::world::WorldSummary;
    use playwriter_session::domain::commands::Trigger;
    use playwriter_snapshot::domain::view::StructuralView;
    use playwriter_transcript::domain::entries::Notification;

    use super::*;

    fn advancing() -> SessionUpdate {
        SessionUpdate::PhaseChanged(AdvancementPhase::Advancing(Trigger::Auto))
    }

    fn idle() -> SessionUpdate {
        SessionUpdate::PhaseChanged(AdvancementPhase::Idle)
    }

    fn view() -> SessionUpdate {
        SessionUpdate::ViewReplaced(Box::new(StructuralView::assemble(
            "w-1",
            WorldSummary::default(),
            Default::default(),
        )))
    }

    #[test]
    fn test_manual_drive_finishes_after_one_attempt() {
        let mut progress = Progress::new(Drive::Beats, 20);

        assert_eq!(progress.observe(&view()), Next::Continue);
        assert_eq!(progress.observe(&advancing()), Next::Continue);
        assert_eq!(progress.observe(&idle()), Next::Finish);
        assert_eq!(progress.observe(&view()), Next::Shutdown);
    }

    #[test]
    fn test_auto_drive_counts_settled_attempts() {
        // Arrange
        let mut progress = Progress::new(Drive::Auto, 2);

        // Act
        let first = [progress.observe(&advancing()), progress.observe(&idle())];
        let second = [progress.observe(&advancing()), progress.observe(&idle())];

        // Assert
        assert_eq!(first, [Next::Continue, Next::Continue]);
        assert_eq!(second, [Next::Continue, Next::Finish]);
    }

    #[test]
    fn test_auto_switching_off_finishes_the_run() {
        let mut progress = Progress::new(Drive::Auto, 50);
        progress.observe(&advancing());
        progress.observe(&idle());

        assert_eq!(
            progress.observe(&SessionUpdate::AutoAdvanceChanged(false)),
            Next::Finish
        );
        assert_eq!(
            progress.observe(&SessionUpdate::AutoAdvanceChanged(false)),
            Next::Continue
        );
    }

    #[test]
    fn test_failed_final_refresh_still_shuts_down() {
        let mut progress = Progress::new(Drive::Scene, 1);
        progress.observe(&advancing());
        progress.observe(&idle());

        let next = progress.observe(&SessionUpdate::Notification(Notification::warning(
            "World refresh failed: transport failure: connection refused",
        )));

        assert_eq!(next, Next::Shutdown);
    }

    #[test]
    fn test_idle_before_any_attempt_is_ignored() {
        let mut progress = Progress::new(Drive::Stream, 10);

        assert_eq!(progress.observe(&idle()), Next::Continue);
    }
}
