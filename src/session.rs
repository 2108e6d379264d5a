//! Per-session tracking state and fusion history.
//!
//! Each [`TrackingSession`] entry records whether continuous capture is
//! active and the rolling history of recent fusion results (bounded sliding
//! window, most-recent-last). History is append-and-trim only; a stored
//! [`FusionResult`] is never edited. Readers always observe a consistent
//! snapshot: all access goes through one async `RwLock`, and only the
//! session's own tick task (or the synchronous analyze path) writes.

use crate::config::SessionConfig;
use crate::emotion::{EmotionLabel, FusionResult};
use crate::error::{EmotionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Read-only view of a session's tracking state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStatus {
    /// The session this status describes.
    pub session_id: String,
    /// Whether continuous capture is running.
    pub is_active: bool,
    /// When the last fusion result was appended, if any.
    pub last_capture_at: Option<DateTime<Utc>>,
    /// Ticks that produced a fusion result.
    pub ticks_completed: u64,
    /// Ticks skipped because no modality produced a result.
    pub ticks_skipped: u64,
}

/// Majority label over a sliding window of fusion results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConsistency {
    /// The label most of the window agrees on, if the window is non-empty.
    pub majority_label: Option<EmotionLabel>,
    /// Fraction of the window agreeing with the majority label.
    pub stability: f32,
    /// Number of results actually considered (≤ requested window size).
    pub samples: usize,
}

/// One session's mutable state.
#[derive(Debug)]
struct TrackingSession {
    is_active: bool,
    history: VecDeque<FusionResult>,
    last_capture_at: Option<DateTime<Utc>>,
    ticks_completed: u64,
    ticks_skipped: u64,
    last_activity: Instant,
}

impl TrackingSession {
    fn new() -> Self {
        Self {
            is_active: false,
            history: VecDeque::new(),
            last_capture_at: None,
            ticks_completed: 0,
            ticks_skipped: 0,
            last_activity: Instant::now(),
        }
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Store of all tracking sessions, keyed by session id.
#[derive(Debug)]
pub struct SessionStore {
    history_capacity: usize,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<String, TrackingSession>>,
}

impl SessionStore {
    /// Create a store with the given settings.
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            history_capacity: config.history_capacity.max(1),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create the session if it does not exist yet. Returns `true` if it
    /// was created.
    pub async fn ensure(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            false
        } else {
            info!("created tracking session '{session_id}'");
            sessions.insert(session_id.to_owned(), TrackingSession::new());
            true
        }
    }

    /// Whether the session exists.
    pub async fn exists(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    /// Mark the session active or inactive.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn set_active(&self, session_id: &str, active: bool) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = entry_mut(&mut sessions, session_id)?;
        session.is_active = active;
        session.touch();
        Ok(())
    }

    /// Whether continuous capture is active for the session.
    pub async fn is_active(&self, session_id: &str) -> bool {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.is_active)
            .unwrap_or(false)
    }

    /// Append a fusion result, trimming the oldest entry once over capacity.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn append(&self, session_id: &str, result: FusionResult) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = entry_mut(&mut sessions, session_id)?;
        session.last_capture_at = Some(result.produced_at);
        session.ticks_completed += 1;
        session.history.push_back(result);
        while session.history.len() > self.history_capacity {
            session.history.pop_front();
        }
        session.touch();
        Ok(())
    }

    /// Count a tick that produced no modality results.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn record_skipped_tick(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = entry_mut(&mut sessions, session_id)?;
        session.ticks_skipped += 1;
        session.touch();
        Ok(())
    }

    /// The most recent fusion result, or `None` if none has been produced.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn latest(&self, session_id: &str) -> Result<Option<FusionResult>> {
        let sessions = self.sessions.read().await;
        let session = entry(&sessions, session_id)?;
        Ok(session.history.back().cloned())
    }

    /// Majority label and stability over the last `window` results.
    ///
    /// Smooths single noisy ticks into a stable current-mood signal. Ties
    /// go to the label seen most recently.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn window_consistency(
        &self,
        session_id: &str,
        window: usize,
    ) -> Result<WindowConsistency> {
        let sessions = self.sessions.read().await;
        let session = entry(&sessions, session_id)?;

        let recent: Vec<&FusionResult> =
            session.history.iter().rev().take(window.max(1)).collect();
        if recent.is_empty() {
            return Ok(WindowConsistency {
                majority_label: None,
                stability: 0.0,
                samples: 0,
            });
        }

        let mut counts: HashMap<EmotionLabel, usize> = HashMap::new();
        for result in &recent {
            *counts.entry(result.final_label).or_default() += 1;
        }
        // recent is most-recent-first, so scanning it in order and keeping
        // strictly-greater counts breaks ties towards the newest label.
        let mut majority = recent[0].final_label;
        let mut majority_count = 0;
        for result in &recent {
            let count = counts[&result.final_label];
            if count > majority_count {
                majority = result.final_label;
                majority_count = count;
            }
        }

        Ok(WindowConsistency {
            majority_label: Some(majority),
            stability: majority_count as f32 / recent.len() as f32,
            samples: recent.len(),
        })
    }

    /// Current tracking status for a session.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn status(&self, session_id: &str) -> Result<TrackingStatus> {
        let sessions = self.sessions.read().await;
        let session = entry(&sessions, session_id)?;
        Ok(TrackingStatus {
            session_id: session_id.to_owned(),
            is_active: session.is_active,
            last_capture_at: session.last_capture_at,
            ticks_completed: session.ticks_completed,
            ticks_skipped: session.ticks_skipped,
        })
    }

    /// Remove inactive sessions idle beyond the configured timeout.
    /// Returns the number evicted.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let timeout = self.idle_timeout;
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.is_active || session.last_activity.elapsed() < timeout;
            if !keep {
                debug!("evicting idle session '{id}'");
            }
            keep
        });
        before - sessions.len()
    }
}

fn entry<'a>(
    sessions: &'a HashMap<String, TrackingSession>,
    session_id: &str,
) -> Result<&'a TrackingSession> {
    sessions
        .get(session_id)
        .ok_or_else(|| EmotionError::SessionNotFound(session_id.to_owned()))
}

fn entry_mut<'a>(
    sessions: &'a mut HashMap<String, TrackingSession>,
    session_id: &str,
) -> Result<&'a mut TrackingSession> {
    sessions
        .get_mut(session_id)
        .ok_or_else(|| EmotionError::SessionNotFound(session_id.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionConfig;
    use crate::emotion::{Modality, ModalityResult};
    use crate::fusion::FusionEngine;

    fn store_with_capacity(capacity: usize) -> SessionStore {
        SessionStore::new(&SessionConfig {
            history_capacity: capacity,
            idle_timeout_secs: 600,
        })
    }

    fn result_with_label(label: EmotionLabel) -> FusionResult {
        FusionEngine::new(FusionConfig::default())
            .fuse(vec![ModalityResult::new(Modality::Text, label, 0.9)])
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_session_is_an_error() {
        let store = store_with_capacity(10);
        assert!(matches!(
            store.latest("ghost").await.unwrap_err(),
            EmotionError::SessionNotFound(_)
        ));
        assert!(matches!(
            store.status("ghost").await.unwrap_err(),
            EmotionError::SessionNotFound(_)
        ));
    }

    #[tokio::test]
    async fn history_never_exceeds_capacity() {
        let store = store_with_capacity(3);
        store.ensure("s").await;
        for _ in 0..20 {
            store
                .append("s", result_with_label(EmotionLabel::Happy))
                .await
                .unwrap();
        }
        let status = store.status("s").await.unwrap();
        assert_eq!(status.ticks_completed, 20);
        let window = store.window_consistency("s", 100).await.unwrap();
        assert_eq!(window.samples, 3);
    }

    #[tokio::test]
    async fn latest_returns_most_recent() {
        let store = store_with_capacity(10);
        store.ensure("s").await;
        assert!(store.latest("s").await.unwrap().is_none());

        store
            .append("s", result_with_label(EmotionLabel::Sad))
            .await
            .unwrap();
        store
            .append("s", result_with_label(EmotionLabel::Happy))
            .await
            .unwrap();
        let latest = store.latest("s").await.unwrap().unwrap();
        assert_eq!(latest.final_label, EmotionLabel::Happy);
    }

    #[tokio::test]
    async fn window_consistency_finds_majority() {
        let store = store_with_capacity(10);
        store.ensure("s").await;
        for label in [
            EmotionLabel::Happy,
            EmotionLabel::Happy,
            EmotionLabel::Sad,
            EmotionLabel::Happy,
        ] {
            store.append("s", result_with_label(label)).await.unwrap();
        }
        let window = store.window_consistency("s", 4).await.unwrap();
        assert_eq!(window.majority_label, Some(EmotionLabel::Happy));
        assert!((window.stability - 0.75).abs() < 1e-6);
        assert_eq!(window.samples, 4);
    }

    #[tokio::test]
    async fn window_smaller_than_history_uses_recent_results() {
        let store = store_with_capacity(10);
        store.ensure("s").await;
        for label in [
            EmotionLabel::Sad,
            EmotionLabel::Sad,
            EmotionLabel::Happy,
            EmotionLabel::Happy,
        ] {
            store.append("s", result_with_label(label)).await.unwrap();
        }
        let window = store.window_consistency("s", 2).await.unwrap();
        assert_eq!(window.majority_label, Some(EmotionLabel::Happy));
        assert_eq!(window.stability, 1.0);
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = store_with_capacity(10);
        assert!(store.ensure("s").await);
        assert!(!store.ensure("s").await);
    }

    #[tokio::test]
    async fn evict_idle_removes_only_inactive() {
        let store = SessionStore::new(&SessionConfig {
            history_capacity: 10,
            idle_timeout_secs: 0,
        });
        store.ensure("active").await;
        store.ensure("idle").await;
        store.set_active("active", true).await.unwrap();

        let evicted = store.evict_idle().await;
        assert_eq!(evicted, 1);
        assert!(store.exists("active").await);
        assert!(!store.exists("idle").await);
    }
}
