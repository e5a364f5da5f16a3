//! Drives a session against a scripted service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use playwriter_core::service::NarrativeService;
use playwriter_session::application::controller::spawn_session;
use playwriter_session::application::handle::SessionHandle;
use playwriter_session::domain::config::SessionConfig;
use playwriter_session::domain::updates::{AdvancementPhase, SessionUpdate};
use playwriter_test_support::{FixedClock, ScriptedNarrativeService};
use playwriter_transcript::domain::entries::{Notification, NotificationLevel};
use tokio::sync::mpsc;

pub const WORLD: &str = "world-1";

pub struct Session {
    pub service: Arc<ScriptedNarrativeService>,
    pub handle: SessionHandle,
    pub updates: mpsc::UnboundedReceiver<SessionUpdate>,
}

impl Session {
    pub fn start(service: ScriptedNarrativeService) -> Self {
        Self::with_config(service, SessionConfig::default())
    }

    pub fn with_config(service: ScriptedNarrativeService, config: SessionConfig) -> Self {
        let service = Arc::new(service);
        let (handle, updates) = spawn_session(
            WORLD,
            Arc::clone(&service) as Arc<dyn NarrativeService>,
            Arc::new(FixedClock::epoch()),
            config,
        );
        Self {
            service,
            handle,
            updates,
        }
    }

    pub async fn next(&mut self) -> SessionUpdate {
        tokio::time::timeout(Duration::from_secs(5), self.updates.recv())
            .await
            .expect("timed out waiting for a session update")
            .expect("session ended unexpectedly")
    }

    /// Collects updates up to and including the first one matching `done`.
    pub async fn wait_for(&mut self, done: impl Fn(&SessionUpdate) -> bool) -> Vec<SessionUpdate> {
        let mut seen = Vec::new();
        loop {
            let update = self.next().await;
            let finished = done(&update);
            seen.push(update);
            if finished {
                return seen;
            }
        }
    }

    /// Waits for the view fetched at startup.
    pub async fn started(&mut self) -> Vec<SessionUpdate> {
        self.wait_for(is_view).await
    }
}

pub fn is_idle(update: &SessionUpdate) -> bool {
    matches!(update, SessionUpdate::PhaseChanged(AdvancementPhase::Idle))
}

pub fn is_advancing(update: &SessionUpdate) -> bool {
    matches!(update, SessionUpdate::PhaseChanged(AdvancementPhase::Advancing(_)))
}

pub fn is_view(update: &SessionUpdate) -> bool {
    matches!(update, SessionUpdate::ViewReplaced(_))
}

pub fn is_notification(update: &SessionUpdate) -> bool {
    matches!(update, SessionUpdate::Notification(_))
}

pub fn notifications(updates: &[SessionUpdate]) -> Vec<&Notification> {
    updates
        .iter()
        .filter_map(|update| match update {
            SessionUpdate::Notification(notification) => Some(notification),
            _ => None,
        })
        .collect()
}

pub fn errors(updates: &[SessionUpdate]) -> Vec<&str> {
    notifications(updates)
        .into_iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .map(|n| n.message.as_str())
        .collect()
}

pub fn appended(updates: &[SessionUpdate]) -> usize {
    updates
        .iter()
        .filter(|update| matches!(update, SessionUpdate::TranscriptAppended(_)))
        .count()
}

pub fn count(updates: &[SessionUpdate], predicate: fn(&SessionUpdate) -> bool) -> usize {
    updates.iter().filter(|update| predicate(update)).count()
}

/// Gives spawned fetches a moment to record their calls.
pub async fn quiesce() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
