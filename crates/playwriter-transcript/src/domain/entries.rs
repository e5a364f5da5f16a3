//! Transcript entries and user-facing notifications.

use chrono::{DateTime, Utc};
use playwriter_core::dice::DiceOutcome;
use serde::Serialize;

/// What a transcript entry renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryBody {
    /// A resolved beat.
    Beat {
        /// Order within the scene, when reported.
        sequence: Option<u32>,
        /// Acting character.
        actor: String,
        /// Requested action.
        action: String,
        /// Prose, or the plain outcome when prose is empty.
        text: String,
        /// Authoritative outcome label.
        outcome: DiceOutcome,
    },
    /// A scene boundary.
    SceneBreak {
        /// Scene number within its act.
        number: u32,
        /// Free-text setting.
        setting: String,
        /// Characters present.
        actors: Vec<String>,
    },
    /// An act boundary.
    ActBreak {
        /// 1-based act number.
        number: u32,
        /// Act title.
        title: String,
    },
}

/// One appended transcript line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    /// Zero-based append position.
    pub index: usize,
    /// When the entry was appended locally.
    pub recorded_at: DateTime<Utc>,
    /// Rendered content.
    pub body: EntryBody,
}

impl TranscriptEntry {
    /// Returns `true` for beat entries.
    #[must_use]
    pub fn is_beat(&self) -> bool {
        matches!(self.body, EntryBody::Beat { .. })
    }

    /// Returns the outcome tag of a beat entry.
    #[must_use]
    pub fn outcome(&self) -> Option<&DiceOutcome> {
        match &self.body {
            EntryBody::Beat { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    /// Neutral progress.
    Info,
    /// A milestone or completed action.
    Success,
    /// Degraded but continuing.
    Warning,
    /// An operation failed.
    Error,
}

/// A transient, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Message text.
    pub message: String,
}

impl Notification {
    /// Creates an informational notification.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    /// Creates a success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// Creates a warning notification.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            message: message.into(),
        }
    }

    /// Creates an error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}
