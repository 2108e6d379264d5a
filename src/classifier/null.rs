//! Always-unavailable classifier.
//!
//! Stands in for a modality whose model files are missing at construction
//! time. Injecting this instead of branching on "is the model loaded"
//! keeps the fusion path free of availability checks: a null classifier
//! simply fails every call and the tick drops that modality.

use crate::classifier::{EmotionClassifier, RawSample};
use crate::emotion::{Modality, ModalityResult};
use crate::error::{EmotionError, Result};
use async_trait::async_trait;

/// Classifier capability that is absent.
#[derive(Debug, Clone, Copy)]
pub struct NullClassifier {
    modality: Modality,
}

impl NullClassifier {
    /// Create a null classifier for the given modality.
    pub fn new(modality: Modality) -> Self {
        Self { modality }
    }
}

#[async_trait]
impl EmotionClassifier for NullClassifier {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn classify(&self, _sample: &RawSample) -> Result<ModalityResult> {
        Err(EmotionError::Classifier(format!(
            "{} classifier not available",
            self.modality
        )))
    }

    fn is_available(&self) -> bool {
        false
    }
}
