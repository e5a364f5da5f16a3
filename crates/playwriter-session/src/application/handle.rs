//! The caller-facing side of a session.

use playwriter_core::error::SyncError;
use playwriter_core::world::{CharacterRedirect, DiceOverride, EngineMode, ThreadChoice};
use tokio::sync::mpsc;

use crate::domain::commands::{DirectorCommand, StepRequest};

/// Messages from handles to the controller.
#[derive(Debug)]
pub(crate) enum Control {
    Step(StepRequest),
    StartAutoAdvance,
    StopAutoAdvance,
    OpenStream { steps: u32 },
    Director(DirectorCommand),
    SetMode(EngineMode),
    Reconcile,
    Shutdown,
}

/// Sends triggers to a running session.
///
/// Every method only enqueues; admission and results are reported through
/// the session's update channel. Handles are cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Control>,
}

impl SessionHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Control>) -> Self {
        Self { tx }
    }

    fn send(&self, control: Control) -> Result<(), SyncError> {
        self.tx.send(control).map_err(|_| SyncError::SessionClosed)
    }

    /// Requests a manual advancement. Ignored while advancing.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn step(&self, request: StepRequest) -> Result<(), SyncError> {
        self.send(Control::Step(request))
    }

    /// Starts the auto-advance timer.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn start_auto_advance(&self) -> Result<(), SyncError> {
        self.send(Control::StartAutoAdvance)
    }

    /// Stops the auto-advance timer. An in-flight tick still settles.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn stop_auto_advance(&self) -> Result<(), SyncError> {
        self.send(Control::StopAutoAdvance)
    }

    /// Opens a streaming session for up to `steps` beats. Ignored while
    /// advancing.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn open_stream(&self, steps: u32) -> Result<(), SyncError> {
        self.send(Control::OpenStream { steps })
    }

    /// Issues a director operation, regardless of the advancement phase.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn director(&self, command: DirectorCommand) -> Result<(), SyncError> {
        self.send(Control::Director(command))
    }

    /// Forces the next roll for `actor` attempting `action`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidRequest` if `forced_roll` is outside
    /// 1–100, or `SyncError::SessionClosed` if the session has ended.
    pub fn override_dice(
        &self,
        actor: &str,
        action: &str,
        forced_roll: u8,
    ) -> Result<(), SyncError> {
        let request = DiceOverride::new(actor, action, forced_roll)?;
        self.director(DirectorCommand::OverrideDice(request))
    }

    /// Injects a free-text world event.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidRequest` for a blank description, or
    /// `SyncError::SessionClosed` if the session has ended.
    pub fn inject_event(&self, description: &str) -> Result<(), SyncError> {
        let description = non_blank(description, "event description")?;
        self.director(DirectorCommand::InjectEvent(description))
    }

    /// Forces tropes matching `query` into consideration.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidRequest` for a blank query, or
    /// `SyncError::SessionClosed` if the session has ended.
    pub fn force_trope(&self, query: &str) -> Result<(), SyncError> {
        let query = non_blank(query, "trope query")?;
        self.director(DirectorCommand::ForceTrope(query))
    }

    /// Gives a character a new ambition.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn redirect_character(&self, name: &str, new_direction: &str) -> Result<(), SyncError> {
        self.director(DirectorCommand::RedirectCharacter(CharacterRedirect {
            character_name: name.to_owned(),
            new_direction: new_direction.to_owned(),
        }))
    }

    /// Sets the status of the thread at `index`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn choose_thread(&self, index: usize, new_status: &str) -> Result<(), SyncError> {
        self.director(DirectorCommand::ChooseThread(ThreadChoice {
            thread_index: index,
            new_status: new_status.to_owned(),
        }))
    }

    /// Switches the world's narration mode.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn set_mode(&self, mode: EngineMode) -> Result<(), SyncError> {
        self.send(Control::SetMode(mode))
    }

    /// Requests a structural refresh.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has ended.
    pub fn reconcile(&self) -> Result<(), SyncError> {
        self.send(Control::Reconcile)
    }

    /// Ends the session. Timers and open streams are dropped.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SessionClosed` if the session has already ended.
    pub fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Control::Shutdown)
    }
}

fn non_blank(value: &str, what: &str) -> Result<String, SyncError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SyncError::InvalidRequest(format!("{what} must not be blank")));
    }
    Ok(trimmed.to_owned())
}
