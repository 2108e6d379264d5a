//! Modality classifier ports.
//!
//! A classifier is a pluggable capability: given a raw sample for its
//! modality it returns a label and a confidence, or fails. The fusion path
//! never inspects classifier internals; a missing model is represented by
//! [`NullClassifier`] rather than branched on throughout the engine.

pub mod null;
pub mod text;

pub use null::NullClassifier;
pub use text::TextClassifier;

use crate::emotion::{Modality, ModalityResult};
use crate::error::Result;
use async_trait::async_trait;

/// A raw sample pulled from a capture source, before classification.
#[derive(Debug, Clone)]
pub enum RawSample {
    /// An encoded camera frame.
    Frame(Vec<u8>),
    /// Mono f32 audio samples.
    Audio(Vec<f32>),
    /// A text string.
    Text(String),
}

impl RawSample {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RawSample::Frame(_) => "frame",
            RawSample::Audio(_) => "audio",
            RawSample::Text(_) => "text",
        }
    }
}

/// Emotion classifier for one modality.
///
/// Implementations may block on model inference; callers run them off the
/// request path and under a per-tick timeout.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// The modality this classifier handles.
    fn modality(&self) -> Modality;

    /// Classify one raw sample.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EmotionError::Classifier`] if the sample is
    /// of the wrong kind or inference fails.
    async fn classify(&self, sample: &RawSample) -> Result<ModalityResult>;

    /// Whether the backing model is actually loaded.
    ///
    /// Used by health reporting only; an unavailable classifier still
    /// answers `classify` (with an error).
    fn is_available(&self) -> bool {
        true
    }
}
