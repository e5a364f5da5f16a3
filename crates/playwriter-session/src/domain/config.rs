//! Session tunables.

use std::time::Duration;

/// Timing and sizing of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period of the auto-advance timer.
    pub auto_interval: Duration,
    /// Beats requested per auto-advance tick.
    pub auto_steps: u32,
    /// Recent rolls whose tropes are shown.
    pub trope_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_interval: Duration::from_secs(2),
            auto_steps: 1,
            trope_window: 3,
        }
    }
}
