//! Triggers accepted by a session.

use playwriter_core::world::{CharacterRedirect, DiceOverride, ThreadChoice};

/// Granularity of a manual advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRequest {
    /// Advance by N beats.
    Beats(u32),
    /// Advance until the current scene completes.
    Scene,
    /// Advance until the current act completes.
    Act,
}

impl StepRequest {
    /// One beat.
    #[must_use]
    pub fn beat() -> Self {
        Self::Beats(1)
    }
}

/// What started an advancement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A manual step.
    Manual(StepRequest),
    /// An auto-advance tick.
    Auto,
    /// A streaming session for up to `steps` beats.
    Stream {
        /// Beats requested from the stream.
        steps: u32,
    },
}

/// Out-of-band director operations.
///
/// These are never subject to the single-flight lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectorCommand {
    /// Force a roll; the resolved beat is appended to the transcript.
    OverrideDice(DiceOverride),
    /// Inject a free-text world event.
    InjectEvent(String),
    /// Force tropes matching a query into the pool.
    ForceTrope(String),
    /// Replace a character's ambition.
    RedirectCharacter(CharacterRedirect),
    /// Set a narrative thread's status.
    ChooseThread(ThreadChoice),
}

impl DirectorCommand {
    /// Short name for logs and notifications.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::OverrideDice(_) => "override-dice",
            Self::InjectEvent(_) => "inject-event",
            Self::ForceTrope(_) => "force-trope",
            Self::RedirectCharacter(_) => "redirect-character",
            Self::ChooseThread(_) => "choose-thread",
        }
    }
}
