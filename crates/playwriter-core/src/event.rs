//! Wire-level narrative events and stream frames.
//!
//! Events are transient: they are decoded, applied once, and dropped. The
//! `type` tag selects the variant; unknown tags decode to
//! [`NarrativeEvent::Unknown`] so callers can ignore them explicitly.

use serde::{Deserialize, Serialize};

use crate::de::null_as_default;
use crate::dice::{DiceOutcome, DiceRoll};
use crate::error::SyncError;
use crate::world::WorldCreated;

/// Emitted when a single beat resolves.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BeatResolved {
    /// Order of the beat within its scene.
    #[serde(default)]
    pub beat_sequence: Option<u32>,
    /// Acting character.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actor: String,
    /// The action the actor attempted.
    #[serde(default, deserialize_with = "null_as_default")]
    pub intended_action: String,
    /// Plain-text outcome, used when `prose` is empty.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actual_outcome: String,
    /// Outcome label; `None` repairs to `mixed`.
    #[serde(default)]
    pub dice_outcome: Option<DiceOutcome>,
    /// Raw d100 roll.
    #[serde(default)]
    pub raw_roll: Option<i32>,
    /// Modified roll.
    #[serde(default)]
    pub final_value: Option<i32>,
    /// Rendered narrative text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub prose: String,
}

impl BeatResolved {
    /// Returns the outcome, repairing a missing label to `mixed`.
    #[must_use]
    pub fn outcome(&self) -> DiceOutcome {
        self.dice_outcome.clone().unwrap_or_default()
    }

    /// Returns the text to render: prose, else the plain outcome.
    #[must_use]
    pub fn display_text(&self) -> &str {
        if self.prose.trim().is_empty() {
            &self.actual_outcome
        } else {
            &self.prose
        }
    }

    /// Returns `true` when the event carries any dice values.
    #[must_use]
    pub fn has_dice(&self) -> bool {
        self.raw_roll.is_some() || self.final_value.is_some()
    }
}

/// Emitted when a new scene begins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SceneComposed {
    /// Scene number within its act.
    #[serde(default)]
    pub scene_number: u32,
    /// Characters present.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actors: Vec<String>,
    /// Free-text setting.
    #[serde(default, deserialize_with = "null_as_default")]
    pub setting: String,
    /// Number of beats planned for the scene.
    #[serde(default)]
    pub beat_count: Option<u32>,
}

/// Emitted when a scene closes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SceneCompleted {
    /// Scene number within its act.
    #[serde(default)]
    pub scene_number: u32,
    /// Beats resolved in the scene.
    #[serde(default)]
    pub beats_count: u32,
}

/// Emitted when a new act begins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActPlanned {
    /// 1-based act number.
    #[serde(default)]
    pub act_number: u32,
    /// Act title.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
}

/// Emitted when an act closes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActCompleted {
    /// 1-based act number.
    #[serde(default)]
    pub act_number: u32,
    /// World events recorded during the act.
    #[serde(default, deserialize_with = "null_as_default")]
    pub world_events: Vec<String>,
}

/// Narrative event variants produced by an advancement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrativeEvent {
    /// A beat resolved.
    BeatResolved(BeatResolved),
    /// A scene began.
    SceneComposed(SceneComposed),
    /// A scene closed.
    SceneCompleted(SceneCompleted),
    /// An act began.
    ActPlanned(ActPlanned),
    /// An act closed.
    ActCompleted(ActCompleted),
    /// A tag this client does not understand.
    #[serde(other)]
    Unknown,
}

impl NarrativeEvent {
    /// Returns the wire tag for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BeatResolved(_) => "beat_resolved",
            Self::SceneComposed(_) => "scene_composed",
            Self::SceneCompleted(_) => "scene_completed",
            Self::ActPlanned(_) => "act_planned",
            Self::ActCompleted(_) => "act_completed",
            Self::Unknown => "unknown",
        }
    }
}

/// Response body of the batch advancement endpoints.
///
/// Events stay raw until [`EventBatch::decode`], so one event of the wrong
/// shape does not cost the rest of the batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventBatch {
    /// Events in emission order, undecoded.
    #[serde(default, deserialize_with = "null_as_default")]
    pub events: Vec<serde_json::Value>,
}

impl EventBatch {
    /// Decodes each event independently, in emission order.
    ///
    /// An event that does not fit its variant yields
    /// `SyncError::InvalidResponse` in its own slot.
    pub fn decode(self) -> impl Iterator<Item = Result<NarrativeEvent, SyncError>> {
        self.events.into_iter().map(|raw| {
            let kind = raw
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("untyped")
                .to_owned();
            serde_json::from_value(raw)
                .map_err(|e| SyncError::InvalidResponse(format!("{kind} event: {e}")))
        })
    }
}

/// A beat resolved through a director dice override.
///
/// This is the service's full beat record; [`OverriddenBeat::into_event`]
/// reshapes it into the `beat_resolved` form the transcript consumes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct OverriddenBeat {
    /// Order of the beat within its scene.
    #[serde(default)]
    pub sequence: Option<u32>,
    /// Acting character.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actor: String,
    /// Requested action.
    #[serde(default, deserialize_with = "null_as_default")]
    pub intended_action: String,
    /// The forced roll, when the service reports it.
    #[serde(default)]
    pub dice_roll: Option<DiceRoll>,
    /// Plain-text outcome.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actual_outcome: String,
    /// Rendered narrative text.
    #[serde(default, deserialize_with = "null_as_default")]
    pub prose: String,
}

impl OverriddenBeat {
    /// Converts the beat into a synthetic `beat_resolved` event.
    #[must_use]
    pub fn into_event(self) -> NarrativeEvent {
        let (dice_outcome, raw_roll, final_value) = match self.dice_roll {
            Some(roll) => (Some(roll.outcome), roll.raw_roll, roll.final_value),
            None => (None, None, None),
        };
        NarrativeEvent::BeatResolved(BeatResolved {
            beat_sequence: self.sequence,
            actor: self.actor,
            intended_action: self.intended_action,
            actual_outcome: self.actual_outcome,
            dice_outcome,
            raw_roll,
            final_value,
            prose: self.prose,
        })
    }
}

/// One decoded message of the advancement stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Narrative content.
    Event(NarrativeEvent),
    /// The service finished the requested steps.
    Complete,
    /// The service aborted the stream.
    Error(String),
}

impl StreamFrame {
    /// Parses one stream message.
    ///
    /// A frame whose `type` is `error` is recognized even when the rest of
    /// the payload is unusable.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MalformedFrame` when the payload is not a JSON
    /// object with a string `type`, or when a known event type carries
    /// fields of the wrong shape.
    pub fn parse(data: &str) -> Result<Self, SyncError> {
        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| SyncError::MalformedFrame(format!("{e}: {}", preview(data))))?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SyncError::MalformedFrame(format!("missing type: {}", preview(data))))?;

        match kind {
            "stream_complete" => Ok(Self::Complete),
            "error" => {
                let message = value
                    .get("message")
                    .or_else(|| value.get("detail"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("stream error")
                    .to_owned();
                Ok(Self::Error(message))
            }
            _ => serde_json::from_value(value)
                .map(Self::Event)
                .map_err(|e| SyncError::MalformedFrame(format!("{e}: {}", preview(data)))),
        }
    }
}

/// One decoded message of the streamed world-creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationProgress {
    /// A generation step finished.
    Step {
        /// Step identifier.
        step: String,
        /// Human-readable detail.
        detail: String,
    },
    /// The world exists.
    Done(WorldCreated),
    /// Generation failed server-side.
    Failed(String),
}

#[derive(Deserialize)]
struct ProgressWire {
    step: String,
    #[serde(default, deserialize_with = "null_as_default")]
    detail: String,
}

impl CreationProgress {
    /// Parses one progress message.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::MalformedFrame` when the payload lacks a `step`
    /// or a `done` message lacks the world fields.
    pub fn parse(data: &str) -> Result<Self, SyncError> {
        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| SyncError::MalformedFrame(format!("{e}: {}", preview(data))))?;
        let wire: ProgressWire = serde_json::from_value(value.clone())
            .map_err(|e| SyncError::MalformedFrame(format!("{e}: {}", preview(data))))?;

        match wire.step.as_str() {
            "done" => serde_json::from_value(value)
                .map(Self::Done)
                .map_err(|e| SyncError::MalformedFrame(format!("{e}: {}", preview(data)))),
            "error" => Ok(Self::Failed(wire.detail)),
            _ => Ok(Self::Step {
                step: wire.step,
                detail: wire.detail,
            }),
        }
    }
}

fn preview(data: &str) -> String {
    data.chars().take(80).collect()
}
