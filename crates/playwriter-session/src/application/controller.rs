//! The advancement controller.
//!
//! One task owns all session state and processes one message at a time, so
//! the Idle check and the switch to Advancing happen without interleaving.
//! Network calls run in spawned tasks that post their results back to the
//! controller's internal channel.

use std::sync::Arc;

use futures_util::StreamExt;
use playwriter_core::clock::Clock;
use playwriter_core::dice::DiceHistoryEntry;
use playwriter_core::error::SyncError;
use playwriter_core::event::{NarrativeEvent, OverriddenBeat, StreamFrame};
use playwriter_core::service::NarrativeService;
use playwriter_core::world::EngineMode;
use playwriter_snapshot::application::reconciler::Reconciler;
use playwriter_snapshot::domain::view::StructuralView;
use playwriter_transcript::application::builder::{Applied, TranscriptBuilder};
use playwriter_transcript::domain::entries::Notification;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::handle::{Control, SessionHandle};
use crate::application::refresh::Coalescer;
use crate::domain::commands::{DirectorCommand, StepRequest, Trigger};
use crate::domain::config::SessionConfig;
use crate::domain::updates::{AdvancementPhase, SessionUpdate};

/// Results posted back by spawned tasks.
enum Internal {
    AutoTick,
    BatchSettled {
        attempt: Uuid,
        result: Result<Vec<NarrativeEvent>, SyncError>,
    },
    StreamItem {
        session: Uuid,
        item: Result<StreamFrame, SyncError>,
    },
    StreamEnded {
        session: Uuid,
        end: StreamEnd,
    },
    DirectorSettled {
        command: &'static str,
        result: Result<DirectorOutcome, SyncError>,
    },
    ModeSettled(Result<EngineMode, SyncError>),
    ViewFetched(Result<StructuralView, SyncError>),
    HistoryFetched(Result<Vec<DiceHistoryEntry>, SyncError>),
}

enum StreamEnd {
    Completed,
    Aborted(String),
    Failed(SyncError),
    Disconnected,
}

enum DirectorOutcome {
    Beat(OverriddenBeat),
    Applied(String),
}

struct ActiveStream {
    session: Uuid,
    _cancel: DropGuard,
}

/// Starts a session for `world_id` on the current runtime.
///
/// The session immediately fetches the structural view and dice history.
/// It runs until [`SessionHandle::shutdown`] is called or every handle is
/// dropped, and publishes [`SessionUpdate::Closed`] last.
#[must_use]
pub fn spawn_session(
    world_id: impl Into<String>,
    service: Arc<dyn NarrativeService>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (internal_tx, internal_rx) = mpsc::unbounded_channel();
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();

    let controller = SessionController {
        world_id: world_id.into(),
        reconciler: Reconciler::new(Arc::clone(&service)),
        service,
        transcript: TranscriptBuilder::new(clock).with_trope_window(config.trope_window),
        view: None,
        phase: AdvancementPhase::Idle,
        attempt: None,
        config,
        internal: internal_tx,
        updates: updates_tx,
        auto: None,
        stream: None,
        reconcile: Coalescer::default(),
        history: Coalescer::default(),
    };
    tokio::spawn(controller.run(control_rx, internal_rx));

    (SessionHandle::new(control_tx), updates_rx)
}

struct SessionController {
    world_id: String,
    service: Arc<dyn NarrativeService>,
    reconciler: Reconciler,
    transcript: TranscriptBuilder,
    view: Option<StructuralView>,
    phase: AdvancementPhase,
    attempt: Option<Uuid>,
    config: SessionConfig,
    internal: mpsc::UnboundedSender<Internal>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    auto: Option<DropGuard>,
    stream: Option<ActiveStream>,
    reconcile: Coalescer,
    history: Coalescer,
}

impl SessionController {
    #[instrument(name = "session", skip_all, fields(world_id = %self.world_id))]
    async fn run(
        mut self,
        mut control: mpsc::UnboundedReceiver<Control>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!("Session started");
        self.request_reconcile();
        self.request_history();

        loop {
            tokio::select! {
                message = control.recv() => match message {
                    Some(Control::Shutdown) | None => break,
                    Some(message) => self.on_control(message),
                },
                Some(message) = internal.recv() => self.on_internal(message),
            }
        }

        self.auto = None;
        self.stream = None;
        self.publish(SessionUpdate::Closed);
        info!("Session closed");
    }

    fn on_control(&mut self, message: Control) {
        match message {
            Control::Step(request) => self.step(request),
            Control::StartAutoAdvance => self.start_auto(),
            Control::StopAutoAdvance => self.stop_auto(),
            Control::OpenStream { steps } => self.open_stream(steps),
            Control::Director(command) => self.dispatch_director(command),
            Control::SetMode(mode) => self.set_mode(mode),
            Control::Reconcile => self.request_reconcile(),
            Control::Shutdown => {}
        }
    }

    fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::AutoTick => self.auto_tick(),
            Internal::BatchSettled { attempt, result } => self.on_batch_settled(attempt, result),
            Internal::StreamItem { session, item } => self.on_stream_item(session, item),
            Internal::StreamEnded { session, end } => {
                if self.is_current_stream(session) {
                    self.end_stream(end);
                }
            }
            Internal::DirectorSettled { command, result } => {
                self.on_director_settled(command, result);
            }
            Internal::ModeSettled(result) => self.on_mode_settled(result),
            Internal::ViewFetched(result) => self.on_view_fetched(result),
            Internal::HistoryFetched(result) => self.on_history_fetched(result),
        }
    }

    // --- single-flight -------------------------------------------------

    fn admit(&mut self, trigger: Trigger) -> Option<Uuid> {
        if self.phase.is_advancing() {
            debug!(trigger = ?trigger, "Trigger ignored while advancing");
            return None;
        }
        let attempt = Uuid::new_v4();
        self.attempt = Some(attempt);
        self.set_phase(AdvancementPhase::Advancing(trigger));
        info!(correlation_id = %attempt, trigger = ?trigger, "Advancement admitted");
        Some(attempt)
    }

    fn finish_attempt(&mut self) {
        self.attempt = None;
        self.set_phase(AdvancementPhase::Idle);
    }

    fn set_phase(&mut self, phase: AdvancementPhase) {
        if self.phase != phase {
            self.phase = phase;
            self.publish(SessionUpdate::PhaseChanged(phase));
        }
    }

    // --- batches -------------------------------------------------------

    fn step(&mut self, request: StepRequest) {
        if let Some(attempt) = self.admit(Trigger::Manual(request)) {
            self.spawn_batch(attempt, request);
        }
    }

    fn auto_tick(&mut self) {
        if self.auto.is_none() {
            return;
        }
        let steps = self.config.auto_steps;
        if let Some(attempt) = self.admit(Trigger::Auto) {
            self.spawn_batch(attempt, StepRequest::Beats(steps));
        }
    }

    fn spawn_batch(&self, attempt: Uuid, request: StepRequest) {
        let service = Arc::clone(&self.service);
        let world_id = self.world_id.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = match request {
                StepRequest::Beats(steps) => service.advance(&world_id, steps).await,
                StepRequest::Scene => service.advance_scene(&world_id).await,
                StepRequest::Act => service.advance_act(&world_id).await,
            };
            let _ = tx.send(Internal::BatchSettled { attempt, result });
        });
    }

    fn on_batch_settled(&mut self, attempt: Uuid, result: Result<Vec<NarrativeEvent>, SyncError>) {
        if self.attempt != Some(attempt) {
            debug!(correlation_id = %attempt, "Stale batch ignored");
            return;
        }
        match result {
            Ok(events) => {
                info!(correlation_id = %attempt, events = events.len(), "Advancement settled");
                let mut beats = false;
                for event in &events {
                    beats |= self.apply(event);
                }
                if beats {
                    self.request_history();
                }
                self.finish_attempt();
                if !events.is_empty() {
                    self.request_reconcile();
                }
            }
            Err(error) => {
                warn!(correlation_id = %attempt, error = %error, "Advancement failed");
                self.notify(Notification::error(format!(
                    "Advance failed: {}",
                    error.detail()
                )));
                self.finish_attempt();
                if error.is_indeterminate() {
                    self.request_reconcile();
                }
            }
        }
    }

    /// Applies one event and publishes what it produced. Returns `true` when
    /// the event asks for a trope refresh.
    fn apply(&mut self, event: &NarrativeEvent) -> bool {
        match self.transcript.apply(event) {
            Applied::Rendered {
                entry,
                dice,
                refresh_tropes,
            } => {
                self.publish(SessionUpdate::TranscriptAppended(entry));
                if let Some(panel) = dice {
                    self.publish(SessionUpdate::DiceChanged(panel));
                }
                refresh_tropes
            }
            Applied::Notify(notification) => {
                self.notify(notification);
                false
            }
            Applied::Ignored => {
                debug!("Unknown event ignored");
                false
            }
        }
    }

    // --- auto-advance --------------------------------------------------

    fn start_auto(&mut self) {
        if self.auto.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let tx = self.internal.clone();
        let period = self.config.auto_interval;
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    _ = ticks.tick() => {
                        if tx.send(Internal::AutoTick).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.auto = Some(token.drop_guard());
        info!(interval = ?period, "Auto-advance started");
        self.publish(SessionUpdate::AutoAdvanceChanged(true));
    }

    fn stop_auto(&mut self) {
        if self.auto.take().is_some() {
            info!("Auto-advance stopped");
            self.publish(SessionUpdate::AutoAdvanceChanged(false));
        }
    }

    // --- streaming -----------------------------------------------------

    fn open_stream(&mut self, steps: u32) {
        let Some(session) = self.admit(Trigger::Stream { steps }) else {
            return;
        };
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let service = Arc::clone(&self.service);
        let world_id = self.world_id.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let opened = tokio::select! {
                () = cancelled.cancelled() => return,
                opened = service.open_stream(&world_id, steps) => opened,
            };
            let mut frames = match opened {
                Ok(frames) => frames,
                Err(error) => {
                    let end = StreamEnd::Failed(error);
                    let _ = tx.send(Internal::StreamEnded { session, end });
                    return;
                }
            };
            loop {
                tokio::select! {
                    () = cancelled.cancelled() => break,
                    next = frames.next() => {
                        let Some(item) = next else {
                            let end = StreamEnd::Disconnected;
                            let _ = tx.send(Internal::StreamEnded { session, end });
                            break;
                        };
                        if tx.send(Internal::StreamItem { session, item }).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.stream = Some(ActiveStream {
            session,
            _cancel: token.drop_guard(),
        });
    }

    fn is_current_stream(&self, session: Uuid) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|stream| stream.session == session)
    }

    fn on_stream_item(&mut self, session: Uuid, item: Result<StreamFrame, SyncError>) {
        if !self.is_current_stream(session) {
            debug!(correlation_id = %session, "Stale stream frame ignored");
            return;
        }
        match item {
            Ok(StreamFrame::Event(event)) => {
                if self.apply(&event) {
                    self.request_history();
                }
            }
            Ok(StreamFrame::Complete) => self.end_stream(StreamEnd::Completed),
            Ok(StreamFrame::Error(message)) => self.end_stream(StreamEnd::Aborted(message)),
            Err(error) if error.is_frame_local() => {
                warn!(correlation_id = %session, error = %error, "Malformed stream frame skipped");
            }
            Err(error) => self.end_stream(StreamEnd::Failed(error)),
        }
    }

    /// Closes the current stream, returns to Idle and reconciles once.
    fn end_stream(&mut self, end: StreamEnd) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        let session = stream.session;
        drop(stream);
        match end {
            StreamEnd::Completed => {
                info!(correlation_id = %session, "Stream complete");
                self.notify(Notification::success("Stream complete"));
            }
            StreamEnd::Aborted(message) => {
                warn!(correlation_id = %session, detail = %message, "Stream aborted by service");
                self.notify(Notification::error(format!("Stream error: {message}")));
            }
            StreamEnd::Failed(error) => {
                warn!(correlation_id = %session, error = %error, "Stream failed");
                self.notify(Notification::error(format!(
                    "Stream failed: {}",
                    error.detail()
                )));
            }
            StreamEnd::Disconnected => {
                warn!(correlation_id = %session, "Stream disconnected");
                self.notify(Notification::warning("Stream disconnected"));
            }
        }
        self.finish_attempt();
        self.request_reconcile();
    }

    // --- director channel ----------------------------------------------

    fn dispatch_director(&self, command: DirectorCommand) {
        let name = command.name();
        info!(command = name, phase = ?self.phase, "Director command issued");
        let service = Arc::clone(&self.service);
        let world_id = self.world_id.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = run_director(service.as_ref(), &world_id, command).await;
            let _ = tx.send(Internal::DirectorSettled {
                command: name,
                result,
            });
        });
    }

    fn on_director_settled(
        &mut self,
        command: &'static str,
        result: Result<DirectorOutcome, SyncError>,
    ) {
        match result {
            Ok(DirectorOutcome::Beat(beat)) => {
                if self.apply(&beat.into_event()) {
                    self.request_history();
                }
                self.notify(Notification::success("Dice override applied"));
            }
            Ok(DirectorOutcome::Applied(message)) => {
                self.notify(Notification::success(message));
                self.request_reconcile();
            }
            Err(error) => {
                warn!(command, error = %error, "Director command failed");
                self.notify(Notification::error(format!(
                    "{command} failed: {}",
                    error.detail()
                )));
            }
        }
    }

    fn set_mode(&self, mode: EngineMode) {
        let service = Arc::clone(&self.service);
        let world_id = self.world_id.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = service.set_mode(&world_id, mode).await;
            let _ = tx.send(Internal::ModeSettled(result));
        });
    }

    fn on_mode_settled(&mut self, result: Result<EngineMode, SyncError>) {
        match result {
            Ok(mode) => {
                info!(mode = %mode, "Mode changed");
                self.publish(SessionUpdate::ModeChanged(mode));
                self.request_reconcile();
            }
            Err(error) => {
                warn!(error = %error, "Mode change failed");
                self.notify(Notification::error(format!(
                    "Mode change failed: {}",
                    error.detail()
                )));
            }
        }
    }

    // --- background refresh --------------------------------------------

    fn request_reconcile(&mut self) {
        if self.reconcile.request() {
            self.spawn_reconcile();
        }
    }

    fn spawn_reconcile(&self) {
        let reconciler = self.reconciler.clone();
        let world_id = self.world_id.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = reconciler.reconcile(&world_id).await;
            let _ = tx.send(Internal::ViewFetched(result));
        });
    }

    fn on_view_fetched(&mut self, result: Result<StructuralView, SyncError>) {
        match result {
            Ok(view) => {
                self.view = Some(view.clone());
                self.publish(SessionUpdate::ViewReplaced(Box::new(view)));
                let completed = self.view.as_ref().is_some_and(StructuralView::is_completed);
                if completed && self.auto.is_some() {
                    self.stop_auto();
                    self.notify(Notification::success("The story is complete"));
                }
            }
            Err(error) => {
                warn!(error = %error, "Reconciliation failed");
                self.notify(Notification::warning(format!(
                    "World refresh failed: {}",
                    error.detail()
                )));
            }
        }
        if self.reconcile.settle() {
            self.spawn_reconcile();
        }
    }

    fn request_history(&mut self) {
        if self.history.request() {
            self.spawn_history();
        }
    }

    fn spawn_history(&self) {
        let service = Arc::clone(&self.service);
        let world_id = self.world_id.clone();
        let tx = self.internal.clone();
        tokio::spawn(async move {
            let result = service.dice_history(&world_id).await;
            let _ = tx.send(Internal::HistoryFetched(result));
        });
    }

    fn on_history_fetched(&mut self, result: Result<Vec<DiceHistoryEntry>, SyncError>) {
        match result {
            Ok(history) => {
                if let Some(tags) = self.transcript.apply_history(&history) {
                    self.publish(SessionUpdate::TropesChanged(tags));
                }
            }
            Err(error) => warn!(error = %error, "Dice history refresh failed"),
        }
        if self.history.settle() {
            self.spawn_history();
        }
    }

    // --- output --------------------------------------------------------

    fn notify(&self, notification: Notification) {
        self.publish(SessionUpdate::Notification(notification));
    }

    fn publish(&self, update: SessionUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Update receiver dropped");
        }
    }
}

async fn run_director(
    service: &dyn NarrativeService,
    world_id: &str,
    command: DirectorCommand,
) -> Result<DirectorOutcome, SyncError> {
    match command {
        DirectorCommand::OverrideDice(request) => service
            .override_dice(world_id, &request)
            .await
            .map(DirectorOutcome::Beat),
        DirectorCommand::InjectEvent(description) => {
            let event = service.inject_event(world_id, &description).await?;
            Ok(DirectorOutcome::Applied(format!(
                "Event injected: {}",
                event.description
            )))
        }
        DirectorCommand::ForceTrope(query) => {
            let tropes = service.force_trope(world_id, &query).await?;
            let message = if tropes.is_empty() {
                format!("No tropes matched '{query}'")
            } else {
                let names: Vec<&str> = tropes.iter().map(|t| t.name.as_str()).collect();
                format!("Tropes forced: {}", names.join(", "))
            };
            Ok(DirectorOutcome::Applied(message))
        }
        DirectorCommand::RedirectCharacter(request) => {
            let character = service.redirect_character(world_id, &request).await?;
            Ok(DirectorOutcome::Applied(format!(
                "{} now pursues: {}",
                character.name, character.ambitions
            )))
        }
        DirectorCommand::ChooseThread(request) => {
            let thread = service.choose_thread(world_id, &request).await?;
            Ok(DirectorOutcome::Applied(format!(
                "Thread {} set to {}",
                request.thread_index, thread.status
            )))
        }
    }
}
