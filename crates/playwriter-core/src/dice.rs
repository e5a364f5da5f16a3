//! Dice vocabulary: outcomes, fate modifiers and roll records.
//!
//! Outcome thresholds belong to the Narrative Service. The client carries
//! the label it receives and never derives one from `final_value`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::de::null_as_default;

/// Outcome classification attached to a resolved roll.
///
/// Unknown labels are preserved verbatim in `Other` so they still render.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DiceOutcome {
    /// `critical_success`
    CriticalSuccess,
    /// `success`
    Success,
    /// `mixed`, also the repair value for a missing outcome.
    #[default]
    Mixed,
    /// `failure`
    Failure,
    /// `critical_failure`
    CriticalFailure,
    /// `catastrophic_failure`
    CatastrophicFailure,
    /// A label this client does not know.
    Other(String),
}

impl DiceOutcome {
    /// Returns the exact wire label.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::CriticalSuccess => "critical_success",
            Self::Success => "success",
            Self::Mixed => "mixed",
            Self::Failure => "failure",
            Self::CriticalFailure => "critical_failure",
            Self::CatastrophicFailure => "catastrophic_failure",
            Self::Other(label) => label,
        }
    }

    /// Returns `true` for either success tier.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::CriticalSuccess | Self::Success)
    }

    /// Returns `true` for any failure tier.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Failure | Self::CriticalFailure | Self::CatastrophicFailure
        )
    }
}

impl From<String> for DiceOutcome {
    fn from(label: String) -> Self {
        match label.as_str() {
            "critical_success" => Self::CriticalSuccess,
            "success" => Self::Success,
            "mixed" | "" => Self::Mixed,
            "failure" => Self::Failure,
            "critical_failure" => Self::CriticalFailure,
            "catastrophic_failure" => Self::CatastrophicFailure,
            _ => Self::Other(label),
        }
    }
}

impl From<DiceOutcome> for String {
    fn from(outcome: DiceOutcome) -> Self {
        outcome.label().to_owned()
    }
}

impl fmt::Display for DiceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A catalog trope as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Trope {
    /// Catalog identifier.
    #[serde(default, deserialize_with = "null_as_default")]
    pub trope_id: String,
    /// Display name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Free-text description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// A trope contributing a signed adjustment to a roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FateModifier {
    /// Trope name. Accepts either a bare name or a full trope object.
    #[serde(deserialize_with = "trope_name")]
    pub trope: String,
    /// Signed modifier applied to the raw roll.
    #[serde(default, deserialize_with = "null_as_default")]
    pub modifier: i32,
    /// Why the trope applies, when the service says.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rationale: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TropeRef {
    Name(String),
    Full(Trope),
}

fn trope_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match TropeRef::deserialize(deserializer)? {
        TropeRef::Name(name) => name,
        TropeRef::Full(trope) => trope.name,
    })
}

/// A resolved roll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiceRoll {
    /// The raw d100 roll.
    #[serde(default)]
    pub raw_roll: Option<i32>,
    /// Fate modifiers in the order the service applied them.
    #[serde(default, deserialize_with = "null_as_default")]
    pub fate_modifiers: Vec<FateModifier>,
    /// Raw roll adjusted by modifiers, clamped by the service.
    #[serde(default)]
    pub final_value: Option<i32>,
    /// Authoritative outcome label.
    #[serde(default, deserialize_with = "null_as_default")]
    pub outcome: DiceOutcome,
}

/// One row of `GET /worlds/{id}/dice-history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceHistoryEntry {
    /// Act number the roll belongs to.
    #[serde(default)]
    pub act: u32,
    /// Scene number within the act.
    #[serde(default)]
    pub scene: u32,
    /// Beat sequence within the scene.
    #[serde(default)]
    pub beat: u32,
    /// Acting character.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actor: String,
    /// Requested action.
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    /// The roll itself.
    #[serde(flatten)]
    pub roll: DiceRoll,
}

/// Envelope of the dice-history endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiceHistory {
    /// Rolls, oldest first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub rolls: Vec<DiceHistoryEntry>,
}
