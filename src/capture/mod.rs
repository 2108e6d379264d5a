//! Capture source port and exclusive device ownership.
//!
//! A capture source supplies raw modality samples on demand (a camera
//! frame, an audio clip). Physical devices are exclusive: the
//! [`DeviceRegistry`] tracks which session holds which device, and a second
//! session starting against a claimed device fails fast with
//! [`EmotionError::ResourceBusy`] rather than silently sharing or blocking.

use crate::classifier::RawSample;
use crate::emotion::Modality;
use crate::error::{EmotionError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Supplier of raw samples for one modality.
///
/// `acquire` may block on hardware (opening a camera, waiting for a frame)
/// and is only ever called off the request path, under a per-tick timeout.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// The modality this source feeds.
    fn modality(&self) -> Modality;

    /// Identity of the physical device backing this source.
    ///
    /// Two sources reporting the same id contend for the same hardware.
    fn device_id(&self) -> &str;

    /// Pull one fresh sample.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::SourceUnavailable`] if the device cannot
    /// deliver a sample right now.
    async fn acquire(&self) -> Result<RawSample>;

    /// Release any open hardware handle.
    ///
    /// Called when the owning session stops tracking; must be safe to call
    /// when nothing is held.
    async fn release(&self);
}

/// Most recent pending raw sample per modality for one tracking session.
///
/// Bounded to one pending sample per modality: a newer sample replaces the
/// older one, never queues behind it. Decouples acquisition from
/// classification in the tick pipeline.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    pending: Mutex<HashMap<Modality, RawSample>>,
}

impl SampleBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a sample, replacing any pending one for the same modality.
    pub fn put(&self, modality: Modality, sample: RawSample) {
        self.pending
            .lock()
            .expect("sample buffer lock poisoned")
            .insert(modality, sample);
    }

    /// Remove and return the pending sample for a modality.
    pub fn take(&self, modality: Modality) -> Option<RawSample> {
        self.pending
            .lock()
            .expect("sample buffer lock poisoned")
            .remove(&modality)
    }

    /// Whether a sample is pending for a modality.
    pub fn has_pending(&self, modality: Modality) -> bool {
        self.pending
            .lock()
            .expect("sample buffer lock poisoned")
            .contains_key(&modality)
    }
}

/// Tracks exclusive device claims across sessions.
///
/// Claims are keyed by device id; each maps to the holding session id.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    claims: Mutex<HashMap<String, String>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a device for a session.
    ///
    /// Re-claiming by the holding session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::ResourceBusy`] if another session holds the
    /// device.
    pub fn claim(&self, device_id: &str, session_id: &str) -> Result<()> {
        let mut claims = self.claims.lock().expect("device registry lock poisoned");
        match claims.get(device_id) {
            Some(holder) if holder != session_id => Err(EmotionError::ResourceBusy(format!(
                "device '{device_id}' is held by session '{holder}'"
            ))),
            Some(_) => Ok(()),
            None => {
                debug!("session '{session_id}' claimed device '{device_id}'");
                claims.insert(device_id.to_owned(), session_id.to_owned());
                Ok(())
            }
        }
    }

    /// The session currently holding a device, if any.
    pub fn holder(&self, device_id: &str) -> Option<String> {
        self.claims
            .lock()
            .expect("device registry lock poisoned")
            .get(device_id)
            .cloned()
    }

    /// Release every device held by a session. Returns the released ids.
    pub fn release_all(&self, session_id: &str) -> Vec<String> {
        let mut claims = self.claims.lock().expect("device registry lock poisoned");
        let released: Vec<String> = claims
            .iter()
            .filter(|(_, holder)| holder.as_str() == session_id)
            .map(|(device, _)| device.clone())
            .collect();
        for device in &released {
            claims.remove(device);
            debug!("session '{session_id}' released device '{device}'");
        }
        released
    }

    /// Number of devices a session currently holds.
    pub fn held_by(&self, session_id: &str) -> usize {
        self.claims
            .lock()
            .expect("device registry lock poisoned")
            .values()
            .filter(|holder| holder.as_str() == session_id)
            .count()
    }
}
