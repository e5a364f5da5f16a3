//! Playwriter CLI — error types.

use playwriter_core::error::SyncError;
use thiserror::Error;

/// Startup and runtime errors for the headless client.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The Narrative Service or the session failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Writing the transcript failed.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display_is_passed_through() {
        let err = AppError::from(SyncError::Rejected {
            status: 404,
            detail: "World not found".into(),
        });

        assert_eq!(
            err.to_string(),
            "request rejected with status 404: World not found"
        );
    }

    #[test]
    fn test_config_error_names_the_problem() {
        let err = AppError::Config("PLAYWRITER_STEPS must be a positive integer".into());

        assert_eq!(
            err.to_string(),
            "configuration error: PLAYWRITER_STEPS must be a positive integer"
        );
    }
}
