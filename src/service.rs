//! In-process emotion service.
//!
//! Ties the tracker, session store, and fusion engine together behind the
//! five public operations. Transport-agnostic; `server.rs` mirrors these
//! calls 1:1 over HTTP.

use crate::capture::{CaptureSource, DeviceRegistry};
use crate::classifier::{EmotionClassifier, RawSample, TextClassifier};
use crate::config::EngineConfig;
use crate::emotion::{FusionResult, Modality};
use crate::error::{EmotionError, Result};
use crate::fusion::FusionEngine;
use crate::session::{SessionStore, TrackingStatus, WindowConsistency};
use crate::tracker::ContinuousTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Availability of one classifier, for health reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierHealth {
    /// The modality the classifier serves.
    pub modality: Modality,
    /// Whether the backing model is loaded.
    pub available: bool,
}

/// The emotion fusion service.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct EmotionService {
    config: EngineConfig,
    engine: FusionEngine,
    store: Arc<SessionStore>,
    tracker: ContinuousTracker,
    text_classifier: Arc<dyn EmotionClassifier>,
}

impl EmotionService {
    /// Build a service from configuration and capture channels.
    ///
    /// `channels` supplies the continuously-captured modalities (face,
    /// voice); text arrives with each [`analyze`](Self::analyze) call and is
    /// classified by the built-in [`TextClassifier`] unless overridden via
    /// [`with_text_classifier`](Self::with_text_classifier).
    pub fn new(
        config: EngineConfig,
        channels: Vec<(Arc<dyn CaptureSource>, Arc<dyn EmotionClassifier>)>,
    ) -> Self {
        let engine = FusionEngine::new(config.fusion.clone());
        let store = Arc::new(SessionStore::new(&config.session));
        let registry = Arc::new(DeviceRegistry::new());

        let mut tracker = ContinuousTracker::new(
            config.tracker.clone(),
            engine.clone(),
            Arc::clone(&store),
            registry,
        );
        for (source, classifier) in channels {
            tracker = tracker.with_channel(source, classifier);
        }

        Self {
            config,
            engine,
            store,
            tracker,
            text_classifier: Arc::new(TextClassifier::new()),
        }
    }

    /// Replace the text classifier (e.g. with a model-backed one).
    pub fn with_text_classifier(mut self, classifier: Arc<dyn EmotionClassifier>) -> Self {
        self.text_classifier = classifier;
        self
    }

    /// Start continuous tracking for a session. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::ResourceBusy`] if a required capture device
    /// is held by another session.
    pub async fn start_tracking(&self, session_id: &str) -> Result<TrackingStatus> {
        self.tracker.start(session_id).await
    }

    /// Stop continuous tracking for a session. Idempotent; devices are
    /// released before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn stop_tracking(&self, session_id: &str) -> Result<TrackingStatus> {
        self.tracker.stop(session_id).await
    }

    /// Current tracking status for a session.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn tracking_status(&self, session_id: &str) -> Result<TrackingStatus> {
        self.store.status(session_id).await
    }

    /// The most recent fusion result, or `None` if none exists yet.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn latest_emotion(&self, session_id: &str) -> Result<Option<FusionResult>> {
        self.store.latest(session_id).await
    }

    /// Majority label and stability over the session's recent history.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn window_consistency(
        &self,
        session_id: &str,
        window: usize,
    ) -> Result<WindowConsistency> {
        self.store.window_consistency(session_id, window).await
    }

    /// Run one synchronous out-of-cycle fusion, independent of the timer.
    ///
    /// Classifies `text` if provided, optionally forces a capture on every
    /// channel the session may use, fuses whatever evidence came back, and
    /// appends the result to the session's history.
    ///
    /// Never fabricates a confident answer: if no modality produces a
    /// result this returns [`EmotionError::NoInput`].
    ///
    /// # Errors
    ///
    /// [`EmotionError::SessionNotFound`] for an unknown session;
    /// [`EmotionError::NoInput`] when no evidence is available.
    pub async fn analyze(
        &self,
        session_id: &str,
        text: Option<&str>,
        force_capture: bool,
    ) -> Result<FusionResult> {
        if !self.store.exists(session_id).await {
            return Err(EmotionError::SessionNotFound(session_id.to_owned()));
        }

        let mut inputs = Vec::new();

        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            let timeout = Duration::from_millis(self.config.tracker.modality_timeout_ms);
            let sample = RawSample::Text(text.to_owned());
            match tokio::time::timeout(timeout, self.text_classifier.classify(&sample)).await {
                Ok(Ok(result)) => inputs.push(result),
                Ok(Err(e)) => warn!("text classification failed: {e}"),
                Err(_) => warn!("text classification timed out"),
            }
        }

        if force_capture {
            inputs.extend(self.tracker.capture_now(session_id).await);
        }

        let result = self.engine.fuse(inputs)?;
        debug!(
            "analyze for '{session_id}': {} ({:.2}, authentic={})",
            result.final_label, result.confidence, result.is_authentic
        );
        self.store.append(session_id, result.clone()).await?;
        Ok(result)
    }

    /// Availability of every configured classifier.
    pub fn classifier_health(&self) -> Vec<ClassifierHealth> {
        let mut health: Vec<ClassifierHealth> = self
            .tracker
            .channels()
            .iter()
            .map(|c| ClassifierHealth {
                modality: c.classifier.modality(),
                available: c.classifier.is_available(),
            })
            .collect();
        health.push(ClassifierHealth {
            modality: self.text_classifier.modality(),
            available: self.text_classifier.is_available(),
        });
        health
    }

    /// Number of capture devices a session currently holds.
    ///
    /// Zero for any session that has been stopped.
    pub fn held_devices(&self, session_id: &str) -> usize {
        self.tracker.held_devices(session_id)
    }

    /// Evict idle inactive sessions. Returns the number removed.
    pub async fn evict_idle_sessions(&self) -> usize {
        self.store.evict_idle().await
    }

    /// The engine configuration this service was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
