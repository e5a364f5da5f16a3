//! Test services — `NarrativeService` doubles for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use playwriter_core::dice::{DiceHistoryEntry, DiceRoll, Trope};
use playwriter_core::error::SyncError;
use playwriter_core::event::{CreationProgress, NarrativeEvent, OverriddenBeat, StreamFrame};
use playwriter_core::service::{FrameStream, NarrativeService, ProgressStream};
use playwriter_core::world::{
    Character, CharacterRedirect, CreateWorldRequest, DiceOverride, EngineMode, InjectedEvent,
    ProviderCatalog, ProviderSelection, Roster, ThreadChoice, ThreadState, WorldCreated,
    WorldListing, WorldSummary,
};
use tokio::sync::{Semaphore, mpsc};

/// One recorded call on a [`ScriptedNarrativeService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Providers,
    SelectProvider(String),
    CreateWorld(String),
    CreateWorldStreaming(String),
    ListWorlds,
    Advance { world_id: String, steps: u32 },
    AdvanceScene(String),
    AdvanceAct(String),
    OpenStream { world_id: String, steps: u32 },
    Summary(String),
    Characters(String),
    DiceHistory(String),
    SetMode(EngineMode),
    OverrideDice(DiceOverride),
    InjectEvent(String),
    ForceTrope(String),
    RedirectCharacter(String),
    ChooseThread(usize),
}

enum ScriptedStream {
    Frames(Vec<Result<StreamFrame, SyncError>>),
    Live(mpsc::UnboundedReceiver<Result<StreamFrame, SyncError>>),
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    batches: VecDeque<Result<Vec<NarrativeEvent>, SyncError>>,
    streams: VecDeque<ScriptedStream>,
    open_stream_error: Option<SyncError>,
    summary: WorldSummary,
    characters: Roster,
    history: Vec<DiceHistoryEntry>,
    overridden: Option<OverriddenBeat>,
    director_error: Option<SyncError>,
}

/// A narrative service that records every call and answers from a script.
///
/// Advancement calls draw from a queue of batches (an empty batch when the
/// queue is exhausted). When gated with [`ScriptedNarrativeService::gated`],
/// each advancement waits for one permit from
/// [`ScriptedNarrativeService::release`] before answering, which lets tests
/// observe the Advancing phase.
#[derive(Default)]
pub struct ScriptedNarrativeService {
    script: Mutex<Script>,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedNarrativeService {
    /// Creates an ungated service with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service whose advancements block until released.
    #[must_use]
    pub fn gated() -> Self {
        Self {
            script: Mutex::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    /// Lets `n` held advancements answer.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Queues the result of the next advancement call.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push_batch(&self, result: Result<Vec<NarrativeEvent>, SyncError>) {
        self.script.lock().unwrap().batches.push_back(result);
    }

    /// Queues the frames yielded by the next opened stream.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push_stream(&self, frames: Vec<Result<StreamFrame, SyncError>>) {
        self.script
            .lock()
            .unwrap()
            .streams
            .push_back(ScriptedStream::Frames(frames));
    }

    /// Queues a stream fed by the returned sender; it ends when the sender
    /// is dropped.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push_live_stream(&self) -> mpsc::UnboundedSender<Result<StreamFrame, SyncError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script
            .lock()
            .unwrap()
            .streams
            .push_back(ScriptedStream::Live(rx));
        tx
    }

    /// Makes the next `open_stream` call fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_next_open(&self, error: SyncError) {
        self.script.lock().unwrap().open_stream_error = Some(error);
    }

    /// Sets the summary returned by every summary fetch.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_summary(&self, summary: WorldSummary) {
        self.script.lock().unwrap().summary = summary;
    }

    /// Sets the roster to one bare character per name.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_characters(&self, names: &[&str]) {
        self.script.lock().unwrap().characters = names
            .iter()
            .map(|name| {
                (
                    (*name).to_owned(),
                    Character {
                        name: (*name).to_owned(),
                        ..Character::default()
                    },
                )
            })
            .collect();
    }

    /// Sets the dice history.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_history(&self, history: Vec<DiceHistoryEntry>) {
        self.script.lock().unwrap().history = history;
    }

    /// Sets the beat returned by dice overrides.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_overridden(&self, beat: OverriddenBeat) {
        self.script.lock().unwrap().overridden = Some(beat);
    }

    /// Makes every director call and mode switch fail with `error`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn fail_director(&self, error: SyncError) {
        self.script.lock().unwrap().director_error = Some(error);
    }

    /// Returns a snapshot of all recorded calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Counts recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Number of advancement calls of any granularity.
    pub fn advance_calls(&self) -> usize {
        self.count(|call| {
            matches!(
                call,
                Call::Advance { .. } | Call::AdvanceScene(_) | Call::AdvanceAct(_)
            )
        })
    }

    /// Number of summary fetches.
    pub fn summary_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::Summary(_)))
    }

    /// Number of roster fetches.
    pub fn character_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::Characters(_)))
    }

    /// Number of dice-history fetches.
    pub fn history_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::DiceHistory(_)))
    }

    /// Number of streams opened.
    pub fn stream_opens(&self) -> usize {
        self.count(|call| matches!(call, Call::OpenStream { .. }))
    }

    fn record(&self, call: Call) {
        self.script.lock().unwrap().calls.push(call);
    }

    fn director_result(&self) -> Result<(), SyncError> {
        match self.script.lock().unwrap().director_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn next_batch(&self, call: Call) -> Result<Vec<NarrativeEvent>, SyncError> {
        self.record(call);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?
                .forget();
        }
        self.script
            .lock()
            .unwrap()
            .batches
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }
}

#[async_trait]
impl NarrativeService for ScriptedNarrativeService {
    async fn providers(&self) -> Result<ProviderCatalog, SyncError> {
        self.record(Call::Providers);
        Ok(ProviderCatalog {
            active: Some("ollama".to_owned()),
            ..ProviderCatalog::default()
        })
    }

    async fn select_provider(
        &self,
        selection: &ProviderSelection,
    ) -> Result<ProviderCatalog, SyncError> {
        self.record(Call::SelectProvider(selection.name.clone()));
        Ok(ProviderCatalog {
            active: Some(selection.name.clone()),
            active_model: selection.model.clone(),
            ..ProviderCatalog::default()
        })
    }

    async fn create_world(&self, request: &CreateWorldRequest) -> Result<WorldCreated, SyncError> {
        self.record(Call::CreateWorld(request.seed_description.clone()));
        Ok(created())
    }

    async fn create_world_streaming(
        &self,
        request: &CreateWorldRequest,
    ) -> Result<ProgressStream, SyncError> {
        self.record(Call::CreateWorldStreaming(request.seed_description.clone()));
        let frames = vec![
            Ok(CreationProgress::Step {
                step: "seeding".to_owned(),
                detail: "Drafting the premise".to_owned(),
            }),
            Ok(CreationProgress::Done(created())),
        ];
        Ok(stream::iter(frames).boxed())
    }

    async fn list_worlds(&self) -> Result<Vec<WorldListing>, SyncError> {
        self.record(Call::ListWorlds);
        Ok(Vec::new())
    }

    async fn advance(&self, world_id: &str, steps: u32) -> Result<Vec<NarrativeEvent>, SyncError> {
        self.next_batch(Call::Advance {
            world_id: world_id.to_owned(),
            steps,
        })
        .await
    }

    async fn advance_scene(&self, world_id: &str) -> Result<Vec<NarrativeEvent>, SyncError> {
        self.next_batch(Call::AdvanceScene(world_id.to_owned())).await
    }

    async fn advance_act(&self, world_id: &str) -> Result<Vec<NarrativeEvent>, SyncError> {
        self.next_batch(Call::AdvanceAct(world_id.to_owned())).await
    }

    async fn open_stream(&self, world_id: &str, steps: u32) -> Result<FrameStream, SyncError> {
        self.record(Call::OpenStream {
            world_id: world_id.to_owned(),
            steps,
        });
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.open_stream_error.take() {
            return Err(error);
        }
        Ok(match script.streams.pop_front() {
            Some(ScriptedStream::Frames(frames)) => stream::iter(frames).boxed(),
            Some(ScriptedStream::Live(rx)) => {
                stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
                    .boxed()
            }
            None => stream::iter(vec![Ok(StreamFrame::Complete)]).boxed(),
        })
    }

    async fn world_summary(&self, world_id: &str) -> Result<WorldSummary, SyncError> {
        self.record(Call::Summary(world_id.to_owned()));
        Ok(self.script.lock().unwrap().summary.clone())
    }

    async fn characters(&self, world_id: &str) -> Result<Roster, SyncError> {
        self.record(Call::Characters(world_id.to_owned()));
        Ok(self.script.lock().unwrap().characters.clone())
    }

    async fn dice_history(&self, world_id: &str) -> Result<Vec<DiceHistoryEntry>, SyncError> {
        self.record(Call::DiceHistory(world_id.to_owned()));
        Ok(self.script.lock().unwrap().history.clone())
    }

    async fn set_mode(&self, _world_id: &str, mode: EngineMode) -> Result<EngineMode, SyncError> {
        self.record(Call::SetMode(mode));
        self.director_result()?;
        Ok(mode)
    }

    async fn override_dice(
        &self,
        _world_id: &str,
        request: &DiceOverride,
    ) -> Result<OverriddenBeat, SyncError> {
        self.record(Call::OverrideDice(request.clone()));
        self.director_result()?;
        let scripted = self.script.lock().unwrap().overridden.clone();
        Ok(scripted.unwrap_or_else(|| OverriddenBeat {
            sequence: Some(1),
            actor: request.actor.clone(),
            intended_action: request.action.clone(),
            dice_roll: Some(DiceRoll {
                raw_roll: Some(i32::from(request.forced_roll)),
                fate_modifiers: Vec::new(),
                final_value: Some(i32::from(request.forced_roll)),
                outcome: playwriter_core::dice::DiceOutcome::Mixed,
            }),
            actual_outcome: format!("{} tries to {}", request.actor, request.action),
            prose: String::new(),
        }))
    }

    async fn inject_event(
        &self,
        _world_id: &str,
        description: &str,
    ) -> Result<InjectedEvent, SyncError> {
        self.record(Call::InjectEvent(description.to_owned()));
        self.director_result()?;
        Ok(InjectedEvent {
            id: "we-1".to_owned(),
            description: description.to_owned(),
            affected_characters: Vec::new(),
        })
    }

    async fn force_trope(&self, _world_id: &str, query: &str) -> Result<Vec<Trope>, SyncError> {
        self.record(Call::ForceTrope(query.to_owned()));
        self.director_result()?;
        Ok(vec![Trope {
            trope_id: "t-1".to_owned(),
            name: query.to_owned(),
            description: String::new(),
        }])
    }

    async fn redirect_character(
        &self,
        _world_id: &str,
        request: &CharacterRedirect,
    ) -> Result<Character, SyncError> {
        self.record(Call::RedirectCharacter(request.character_name.clone()));
        self.director_result()?;
        Ok(Character {
            name: request.character_name.clone(),
            ambitions: request.new_direction.clone(),
            ..Character::default()
        })
    }

    async fn choose_thread(
        &self,
        _world_id: &str,
        request: &ThreadChoice,
    ) -> Result<ThreadState, SyncError> {
        self.record(Call::ChooseThread(request.thread_index));
        self.director_result()?;
        Ok(ThreadState {
            thread: String::new(),
            status: request.new_status.clone(),
            tension: 5,
        })
    }
}

fn created() -> WorldCreated {
    WorldCreated {
        world_id: "world-1".to_owned(),
        status: "in_progress".to_owned(),
        characters: vec!["Mara".to_owned(), "Ilse".to_owned()],
        thread_count: 2,
        trope_pool_size: 30,
    }
}

/// A narrative service whose every call fails with a transport error.
/// Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingNarrativeService;

fn refused<T>() -> Result<T, SyncError> {
    Err(SyncError::Transport("connection refused".into()))
}

#[async_trait]
impl NarrativeService for FailingNarrativeService {
    async fn providers(&self) -> Result<ProviderCatalog, SyncError> {
        refused()
    }

    async fn select_provider(&self, _: &ProviderSelection) -> Result<ProviderCatalog, SyncError> {
        refused()
    }

    async fn create_world(&self, _: &CreateWorldRequest) -> Result<WorldCreated, SyncError> {
        refused()
    }

    async fn create_world_streaming(
        &self,
        _: &CreateWorldRequest,
    ) -> Result<ProgressStream, SyncError> {
        refused()
    }

    async fn list_worlds(&self) -> Result<Vec<WorldListing>, SyncError> {
        refused()
    }

    async fn advance(&self, _: &str, _: u32) -> Result<Vec<NarrativeEvent>, SyncError> {
        refused()
    }

    async fn advance_scene(&self, _: &str) -> Result<Vec<NarrativeEvent>, SyncError> {
        refused()
    }

    async fn advance_act(&self, _: &str) -> Result<Vec<NarrativeEvent>, SyncError> {
        refused()
    }

    async fn open_stream(&self, _: &str, _: u32) -> Result<FrameStream, SyncError> {
        refused()
    }

    async fn world_summary(&self, _: &str) -> Result<WorldSummary, SyncError> {
        refused()
    }

    async fn characters(&self, _: &str) -> Result<Roster, SyncError> {
        refused()
    }

    async fn dice_history(&self, _: &str) -> Result<Vec<DiceHistoryEntry>, SyncError> {
        refused()
    }

    async fn set_mode(&self, _: &str, _: EngineMode) -> Result<EngineMode, SyncError> {
        refused()
    }

    async fn override_dice(&self, _: &str, _: &DiceOverride) -> Result<OverriddenBeat, SyncError> {
        refused()
    }

    async fn inject_event(&self, _: &str, _: &str) -> Result<InjectedEvent, SyncError> {
        refused()
    }

    async fn force_trope(&self, _: &str, _: &str) -> Result<Vec<Trope>, SyncError> {
        refused()
    }

    async fn redirect_character(
        &self,
        _: &str,
        _: &CharacterRedirect,
    ) -> Result<Character, SyncError> {
        refused()
    }

    async fn choose_thread(&self, _: &str, _: &ThreadChoice) -> Result<ThreadState, SyncError> {
        refused()
    }
}
