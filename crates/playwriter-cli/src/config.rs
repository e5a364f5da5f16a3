//! Runner configuration from the environment.

use std::fmt;
use std::str::FromStr;

use playwriter_client::config::ClientConfig;
use playwriter_core::world::{CreateWorldRequest, EngineMode};

use crate::error::AppError;

const DEFAULT_STEPS: u32 = 20;
const DEFAULT_TROPE_POOL: u32 = 30;

/// How the runner advances the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Drive {
    /// One streaming session of `steps` beats.
    #[default]
    Stream,
    /// Auto-advance until `steps` attempts have settled.
    Auto,
    /// One manual batch of `steps` beats.
    Beats,
    /// Advance to the end of the current scene.
    Scene,
    /// Advance to the end of the current act.
    Act,
}

impl FromStr for Drive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(Self::Stream),
            "auto" => Ok(Self::Auto),
            "beats" => Ok(Self::Beats),
            "scene" => Ok(Self::Scene),
            "act" => Ok(Self::Act),
            other => Err(format!("unknown drive '{other}'")),
        }
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stream => "stream",
            Self::Auto => "auto",
            Self::Beats => "beats",
            Self::Scene => "scene",
            Self::Act => "act",
        })
    }
}

/// Which world to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Create a new world first.
    Create(CreateWorldRequest),
    /// Drive an existing world.
    Attach(String),
}

/// Provider to select before anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderChoice {
    /// Provider name, e.g. `anthropic`.
    pub name: String,
    /// Model override; the provider's default when unset.
    pub model: Option<String>,
}

/// Everything the runner needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Narrative Service connection.
    pub client: ClientConfig,
    /// World to create or attach to.
    pub target: Target,
    /// Mode requested explicitly; attached worlds are only switched when set.
    pub mode: Option<EngineMode>,
    /// How the world is advanced.
    pub drive: Drive,
    /// Beats per stream or batch; attempts for auto-advance.
    pub steps: u32,
    /// Provider selected before anything else.
    pub provider: Option<ProviderChoice>,
}

impl RunnerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a variable is missing or invalid.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when a variable is missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let client = ClientConfig::from_lookup(&lookup)?;

        let mode = lookup("PLAYWRITER_MODE")
            .map(|raw| raw.parse::<EngineMode>())
            .transpose()
            .map_err(|e| AppError::Config(format!("PLAYWRITER_MODE: {e}")))?;

        let target = match (
            present(&lookup, "PLAYWRITER_WORLD_ID"),
            present(&lookup, "PLAYWRITER_SEED"),
        ) {
            (Some(world_id), None) => Target::Attach(world_id),
            (None, Some(seed)) => {
                let mut request = CreateWorldRequest::new(seed);
                request.mode = mode.unwrap_or_default();
                request.trope_pool_size =
                    positive(&lookup, "PLAYWRITER_TROPE_POOL")?.unwrap_or(DEFAULT_TROPE_POOL);
                request.num_characters = positive(&lookup, "PLAYWRITER_CHARACTERS")?;
                Target::Create(request)
            }
            (Some(_), Some(_)) => {
                return Err(AppError::Config(
                    "set only one of PLAYWRITER_WORLD_ID and PLAYWRITER_SEED".to_owned(),
                ));
            }
            (None, None) => {
                return Err(AppError::Config(
                    "PLAYWRITER_WORLD_ID or PLAYWRITER_SEED must be set".to_owned(),
                ));
            }
        };

        let drive = lookup("PLAYWRITER_DRIVE")
            .map(|raw| raw.parse::<Drive>())
            .transpose()
            .map_err(|e| AppError::Config(format!("PLAYWRITER_DRIVE: {e}")))?
            .unwrap_or_default();

        let provider = match (
            present(&lookup, "PLAYWRITER_PROVIDER"),
            present(&lookup, "PLAYWRITER_MODEL"),
        ) {
            (Some(name), model) => Some(ProviderChoice { name, model }),
            (None, Some(_)) => {
                return Err(AppError::Config(
                    "PLAYWRITER_MODEL requires PLAYWRITER_PROVIDER".to_owned(),
                ));
            }
            (None, None) => None,
        };

        Ok(Self {
            client,
            target,
            mode,
            drive,
            steps: positive(&lookup, "PLAYWRITER_STEPS")?.unwrap_or(DEFAULT_STEPS),
            provider,
        })
    }
}

fn present(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn positive(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>, AppError> {
    present(lookup, key)
        .map(|raw| match raw.parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(AppError::Config(format!(
                "{key} must be a positive integer, got '{raw}'"
            ))),
        })
        .transpose()
}
