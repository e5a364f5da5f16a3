//! World structure, roster and request/response DTOs.
//!
//! These mirror the Narrative Service's JSON. Every field tolerates absence
//! so a partially populated snapshot still renders.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::de::null_as_default;
use crate::error::SyncError;

/// Narration mode of a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Fully automatic narration.
    #[default]
    Autonomous,
    /// A human director may override dice, inject events and force tropes.
    Director,
}

impl EngineMode {
    /// Returns the wire label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Autonomous => "autonomous",
            Self::Director => "director",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "autonomous" => Ok(Self::Autonomous),
            "director" => Ok(Self::Director),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Request body for world creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateWorldRequest {
    /// Free-text premise.
    pub seed_description: String,
    /// Initial narration mode.
    pub mode: EngineMode,
    /// Number of tropes to pre-sample.
    pub trope_pool_size: u32,
    /// Character count; the service decides when `None`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_characters: Option<u32>,
}

impl CreateWorldRequest {
    /// Creates a request with the service's default pool size.
    #[must_use]
    pub fn new(seed_description: impl Into<String>) -> Self {
        Self {
            seed_description: seed_description.into(),
            mode: EngineMode::Autonomous,
            trope_pool_size: 30,
            num_characters: None,
        }
    }
}

/// Result of a successful world creation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct WorldCreated {
    /// Service-assigned world identifier.
    pub world_id: String,
    /// Lifecycle status, when reported.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Initial character names.
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: Vec<String>,
    /// Number of narrative threads seeded.
    #[serde(default)]
    pub thread_count: u32,
    /// Size of the sampled trope pool.
    #[serde(default)]
    pub trope_pool_size: u32,
}

/// One row of the world listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldListing {
    /// World identifier.
    pub id: String,
    /// Truncated seed description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub seed_description: String,
    /// Lifecycle status.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Narration mode.
    #[serde(default)]
    pub mode: EngineMode,
    /// Number of acts so far.
    #[serde(default)]
    pub acts: u32,
    /// Character names.
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: Vec<String>,
    /// Number of narrative threads.
    #[serde(default)]
    pub threads: u32,
}

/// Beat as reported in the world summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BeatSummary {
    /// Order within the scene.
    #[serde(default)]
    pub sequence: u32,
    /// Acting character.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actor: String,
    /// Outcome label, if the beat was rolled.
    #[serde(default)]
    pub outcome: Option<String>,
    /// First characters of the beat's prose.
    #[serde(default, deserialize_with = "null_as_default")]
    pub prose_preview: String,
}

/// Scene as reported in the world summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SceneSummary {
    /// Scene identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Ordering key within the act.
    #[serde(default)]
    pub number: u32,
    /// Characters present.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actors: Vec<String>,
    /// Free-text setting.
    #[serde(default, deserialize_with = "null_as_default")]
    pub setting: String,
    /// Lifecycle status.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Beats in emission order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub beats: Vec<BeatSummary>,
}

/// Act as reported in the world summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActSummary {
    /// Act identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// 1-based ordering key.
    #[serde(default)]
    pub number: u32,
    /// Act title.
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    /// `planned`, `in_progress`/`active`, or `completed`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Scenes in order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub scenes: Vec<SceneSummary>,
    /// World events recorded during the act.
    #[serde(default, deserialize_with = "null_as_default")]
    pub world_events: Vec<String>,
}

/// Narrative-thread state as reported in the world summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThreadState {
    /// Description of the unresolved tension.
    #[serde(default, deserialize_with = "thread_text")]
    pub thread: String,
    /// Server-defined lifecycle status.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Tension on a 0–10 scale.
    #[serde(default, alias = "tension_level")]
    pub tension: u8,
}

/// The full thread record nests the text one level deeper than the summary.
#[derive(Deserialize)]
#[serde(untagged)]
enum ThreadText {
    Flat(String),
    Nested { thread: String },
}

fn thread_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<ThreadText>::deserialize(deserializer)? {
        Some(ThreadText::Flat(text) | ThreadText::Nested { thread: text }) => text,
        None => String::new(),
    })
}

/// Condensed world state from `GET /worlds/{id}/summary`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorldSummary {
    /// World identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// Lifecycle status, e.g. `in_progress` or `completed`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Narration mode.
    #[serde(default)]
    pub mode: EngineMode,
    /// Thematic premise.
    #[serde(default, deserialize_with = "null_as_default")]
    pub teleology: String,
    /// World-building background.
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: String,
    /// Character names.
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: Vec<String>,
    /// Thread states.
    #[serde(default, deserialize_with = "null_as_default")]
    pub threads: Vec<ThreadState>,
    /// Acts in order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub acts: Vec<ActSummary>,
}

/// Full character profile.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Character {
    /// Character name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Current inner state.
    #[serde(default, deserialize_with = "null_as_default")]
    pub internal_state: String,
    /// Current ambitions.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ambitions: String,
    /// Personal teleology.
    #[serde(default, deserialize_with = "null_as_default")]
    pub teleology: String,
    /// Philosophy.
    #[serde(default, deserialize_with = "null_as_default")]
    pub philosophy: String,
    /// Physical condition.
    #[serde(default, deserialize_with = "null_as_default")]
    pub physical_state: String,
    /// Long-term memories, oldest first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub long_term_memory: Vec<String>,
    /// Short-term memories, oldest first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub short_term_memory: Vec<String>,
    /// Internal contradictions.
    #[serde(default, deserialize_with = "null_as_default")]
    pub internal_contradictions: Vec<String>,
}

/// Character roster keyed by name.
pub type Roster = BTreeMap<String, Character>;

/// Request body for a forced dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiceOverride {
    /// Acting character.
    pub actor: String,
    /// Requested action.
    pub action: String,
    /// The roll to force, 1–100.
    pub forced_roll: u8,
}

impl DiceOverride {
    /// Builds an override, checking the roll is on the d100.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidRequest` if `forced_roll` is outside 1–100.
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        forced_roll: u8,
    ) -> Result<Self, SyncError> {
        if !(1..=100).contains(&forced_roll) {
            return Err(SyncError::InvalidRequest(format!(
                "forced roll must be between 1 and 100, got {forced_roll}"
            )));
        }
        Ok(Self {
            actor: actor.into(),
            action: action.into(),
            forced_roll,
        })
    }
}

/// A world event returned by an injection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct InjectedEvent {
    /// Event identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    /// The injected description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Characters the service marked as affected.
    #[serde(default, deserialize_with = "null_as_default")]
    pub affected_characters: Vec<String>,
}

/// Request body for redirecting a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterRedirect {
    /// Character to redirect.
    pub character_name: String,
    /// New ambition.
    pub new_direction: String,
}

/// Request body for setting a thread's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadChoice {
    /// Index into the world's thread list.
    pub thread_index: usize,
    /// New status, e.g. `advancing`.
    pub new_status: String,
}

/// Provider catalog from `GET /api/providers`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ProviderCatalog {
    /// Active provider name.
    #[serde(default)]
    pub active: Option<String>,
    /// Active model override.
    #[serde(default)]
    pub active_model: Option<String>,
    /// Provider details keyed by name; opaque to the sync engine.
    #[serde(default, deserialize_with = "null_as_default")]
    pub providers: BTreeMap<String, serde_json::Value>,
}

/// Request body for `PUT /api/providers/active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSelection {
    /// Provider name.
    pub name: String,
    /// Optional model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
