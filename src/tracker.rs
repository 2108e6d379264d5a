//! Continuous capture scheduler.
//!
//! One timer loop per active session: while tracking is enabled the loop
//! pulls a fresh sample from each configured capture source, classifies it,
//! fuses whatever the tick produced, and appends the result to the session's
//! history. Start/stop are fast and non-blocking; all capture and
//! classification happens on the loop's own task.
//!
//! Tick discipline:
//! - ticks for one session are serialized; a tick still in flight when the
//!   next is due causes the next to be skipped, never queued
//!   (`MissedTickBehavior::Skip`);
//! - a failing modality is dropped from its tick only, the others proceed;
//! - a tick with zero modality results produces no fusion result and is
//!   counted as skipped;
//! - `stop` cancels the loop, awaits its exit, then releases every device
//!   the session holds, so no capture access happens after `stop` returns.

use crate::capture::{CaptureSource, DeviceRegistry, SampleBuffer};
use crate::classifier::EmotionClassifier;
use crate::config::TrackerConfig;
use crate::emotion::{Modality, ModalityResult};
use crate::error::{EmotionError, Result};
use crate::fusion::FusionEngine;
use crate::session::{SessionStore, TrackingStatus};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A capture source paired with the classifier for its modality.
#[derive(Clone)]
pub struct ModalityChannel {
    /// Where samples come from.
    pub source: Arc<dyn CaptureSource>,
    /// What turns samples into [`ModalityResult`]s.
    pub classifier: Arc<dyn EmotionClassifier>,
}

/// Handle to one session's running timer loop.
struct SessionLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Per-session continuous capture scheduler.
pub struct ContinuousTracker {
    config: TrackerConfig,
    engine: FusionEngine,
    store: Arc<SessionStore>,
    registry: Arc<DeviceRegistry>,
    channels: Vec<ModalityChannel>,
    loops: Mutex<HashMap<String, SessionLoop>>,
    buffers: std::sync::Mutex<HashMap<String, Arc<SampleBuffer>>>,
}

impl ContinuousTracker {
    /// Create a tracker with no channels configured.
    pub fn new(
        config: TrackerConfig,
        engine: FusionEngine,
        store: Arc<SessionStore>,
        registry: Arc<DeviceRegistry>,
    ) -> Self {
        Self {
            config,
            engine,
            store,
            registry,
            channels: Vec::new(),
            loops: Mutex::new(HashMap::new()),
            buffers: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Add a capture channel (source + classifier pair).
    pub fn with_channel(
        mut self,
        source: Arc<dyn CaptureSource>,
        classifier: Arc<dyn EmotionClassifier>,
    ) -> Self {
        self.channels.push(ModalityChannel { source, classifier });
        self
    }

    /// Start continuous tracking for a session.
    ///
    /// Idempotent: starting an already-active session returns its current
    /// status without spawning a second loop. Claims every channel's device
    /// exclusively before the loop starts.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::ResourceBusy`] if another session holds one
    /// of the devices; no claims are kept in that case.
    pub async fn start(&self, session_id: &str) -> Result<TrackingStatus> {
        let mut loops = self.loops.lock().await;

        if let Some(running) = loops.get(session_id) {
            if !running.handle.is_finished() {
                debug!("tracking already active for '{session_id}'");
                return self.store.status(session_id).await;
            }
            loops.remove(session_id);
        }

        for channel in &self.channels {
            if let Err(e) = self.registry.claim(channel.source.device_id(), session_id) {
                // Roll back whatever this call managed to claim.
                self.registry.release_all(session_id);
                return Err(e);
            }
        }

        self.store.ensure(session_id).await;
        self.store.set_active(session_id, true).await?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_session_loop(
            session_id.to_owned(),
            self.config.clone(),
            self.engine.clone(),
            Arc::clone(&self.store),
            self.channels.clone(),
            self.buffer_for(session_id),
            cancel.clone(),
        ));
        loops.insert(session_id.to_owned(), SessionLoop { cancel, handle });

        info!(
            "tracking started for '{session_id}' ({} channels, {}ms interval)",
            self.channels.len(),
            self.config.tick_interval_ms
        );
        self.store.status(session_id).await
    }

    /// Stop continuous tracking for a session.
    ///
    /// Idempotent. Once this returns the loop has exited and every device
    /// the session held has been released.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SessionNotFound`] for an unknown session.
    pub async fn stop(&self, session_id: &str) -> Result<TrackingStatus> {
        if !self.store.exists(session_id).await {
            return Err(EmotionError::SessionNotFound(session_id.to_owned()));
        }

        let running = self.loops.lock().await.remove(session_id);
        if let Some(running) = running {
            running.cancel.cancel();
            if running.handle.await.is_err() {
                warn!("tick loop for '{session_id}' panicked");
            }
        }

        // The loop has exited; hardware handles can be released safely.
        for channel in &self.channels {
            let device = channel.source.device_id();
            if self.registry.holder(device).as_deref() == Some(session_id) {
                channel.source.release().await;
            }
        }
        let released = self.registry.release_all(session_id);
        if !released.is_empty() {
            debug!("released devices for '{session_id}': {released:?}");
        }

        self.buffers
            .lock()
            .expect("buffer map lock poisoned")
            .remove(session_id);
        self.store.set_active(session_id, false).await?;
        info!("tracking stopped for '{session_id}'");
        self.store.status(session_id).await
    }

    /// Whether a timer loop is currently running for the session.
    pub async fn is_running(&self, session_id: &str) -> bool {
        self.loops
            .lock()
            .await
            .get(session_id)
            .map(|l| !l.handle.is_finished())
            .unwrap_or(false)
    }

    /// Force one out-of-cycle capture across all channels the session may
    /// use (devices unclaimed or held by this session).
    ///
    /// Failures are soft: a failing channel is simply absent from the
    /// returned set.
    pub async fn capture_now(&self, session_id: &str) -> Vec<ModalityResult> {
        let timeout = Duration::from_millis(self.config.modality_timeout_ms);
        let buffer = self.buffer_for(session_id);
        let mut results = Vec::new();
        for channel in &self.channels {
            match self.registry.holder(channel.source.device_id()) {
                Some(holder) if holder != session_id => {
                    debug!(
                        "skipping forced capture on '{}': held by '{holder}'",
                        channel.source.device_id()
                    );
                    continue;
                }
                _ => {}
            }
            match capture_and_classify(channel, &buffer, timeout).await {
                Ok(result) => results.push(result),
                Err(e) => debug!(
                    "forced {} capture failed: {e}",
                    channel.classifier.modality()
                ),
            }
        }
        results
    }

    /// Channels configured on this tracker.
    pub fn channels(&self) -> &[ModalityChannel] {
        &self.channels
    }

    /// Number of capture devices the session currently holds.
    pub fn held_devices(&self, session_id: &str) -> usize {
        self.registry.held_by(session_id)
    }

    /// The session's sample buffer, created on first use.
    fn buffer_for(&self, session_id: &str) -> Arc<SampleBuffer> {
        let mut buffers = self.buffers.lock().expect("buffer map lock poisoned");
        Arc::clone(
            buffers
                .entry(session_id.to_owned())
                .or_insert_with(|| Arc::new(SampleBuffer::new())),
        )
    }
}

/// Timer loop for one session.
async fn run_session_loop(
    session_id: String,
    config: TrackerConfig,
    engine: FusionEngine,
    store: Arc<SessionStore>,
    channels: Vec<ModalityChannel>,
    buffer: Arc<SampleBuffer>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let timeout = Duration::from_millis(config.modality_timeout_ms);
    let mut consecutive_failures: HashMap<Modality, u32> = HashMap::new();
    let mut degradation_warned: HashSet<Modality> = HashSet::new();

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        if !store.is_active(&session_id).await {
            break;
        }

        let mut inputs = Vec::new();
        for channel in &channels {
            let modality = channel.classifier.modality();
            match capture_and_classify(channel, &buffer, timeout).await {
                Ok(result) => {
                    consecutive_failures.remove(&modality);
                    degradation_warned.remove(&modality);
                    inputs.push(result);
                }
                Err(e) => {
                    let failures = consecutive_failures.entry(modality).or_insert(0);
                    *failures += 1;
                    if *failures >= config.degradation_after_ticks
                        && degradation_warned.insert(modality)
                    {
                        warn!(
                            "{modality} modality degraded for '{session_id}': \
                             {failures} consecutive failures (last: {e})"
                        );
                    } else {
                        debug!("{modality} failed this tick for '{session_id}': {e}");
                    }
                }
            }
        }

        if inputs.is_empty() {
            debug!("tick skipped for '{session_id}': no modality produced a result");
            if store.record_skipped_tick(&session_id).await.is_err() {
                break;
            }
            continue;
        }

        match engine.fuse(inputs) {
            Ok(result) => {
                debug!(
                    "tick for '{session_id}': {} ({:.2}, authentic={})",
                    result.final_label, result.confidence, result.is_authentic
                );
                if store.append(&session_id, result).await.is_err() {
                    // Session evicted under us; nothing left to track.
                    break;
                }
            }
            Err(e) => warn!("fusion failed for '{session_id}': {e}"),
        }
    }

    debug!("tick loop exited for '{session_id}'");
}

/// Acquire one sample, stage it in the session's buffer, and classify it,
/// all bounded by the per-tick timeout.
async fn capture_and_classify(
    channel: &ModalityChannel,
    buffer: &SampleBuffer,
    timeout: Duration,
) -> Result<ModalityResult> {
    let modality = channel.classifier.modality();
    tokio::time::timeout(timeout, async {
        let sample = channel.source.acquire().await?;
        buffer.put(modality, sample);
        let sample = buffer.take(modality).ok_or_else(|| {
            EmotionError::Channel(format!("pending {modality} sample already consumed"))
        })?;
        channel.classifier.classify(&sample).await
    })
    .await
    .map_err(|_| EmotionError::Classifier(format!("{modality} tick timed out")))?
}
