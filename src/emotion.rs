//! Core data model: modalities, emotion labels, and per-tick results.
//!
//! All types here are immutable once created: a [`ModalityResult`] is
//! produced exactly once per successful classifier call, and a
//! [`FusionResult`] exactly once per fusion invocation. The session store
//! owns fusion results after append and never edits them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An input channel with its own independent emotion classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Facial expression (camera frames).
    Face,
    /// Vocal tone (audio clips).
    Voice,
    /// Free text (chat input).
    Text,
}

impl Modality {
    /// All modalities, in tie-break priority order (highest first).
    pub const ALL: [Modality; 3] = [Modality::Face, Modality::Text, Modality::Voice];

    /// Lowercase name for logs and explanations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Face => "face",
            Modality::Voice => "voice",
            Modality::Text => "text",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of emotion labels every classifier maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl EmotionLabel {
    /// All seven labels.
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Fear,
        EmotionLabel::Surprise,
        EmotionLabel::Disgust,
        EmotionLabel::Neutral,
    ];

    /// Lowercase name for logs and explanations.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classifier verdict for one modality sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityResult {
    /// Which channel produced this result.
    pub modality: Modality,
    /// Detected emotion label.
    pub label: EmotionLabel,
    /// Classifier confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// When the underlying sample was captured.
    pub captured_at: DateTime<Utc>,
}

impl ModalityResult {
    /// Create a result stamped with the current time.
    ///
    /// Confidence is clamped into `0.0..=1.0`.
    pub fn new(modality: Modality, label: EmotionLabel, confidence: f32) -> Self {
        Self {
            modality,
            label,
            confidence: confidence.clamp(0.0, 1.0),
            captured_at: Utc::now(),
        }
    }
}

/// The fused verdict over one tick's modality results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    /// Unique id for correlating this analysis with downstream consumers.
    pub analysis_id: Uuid,
    /// The emotion the system settled on.
    pub final_label: EmotionLabel,
    /// Fused confidence in `0.0..=1.0`.
    pub confidence: f32,
    /// Whether the evidence is corroborated strongly enough to be trusted.
    pub is_authentic: bool,
    /// Fraction (adjusted) of present modalities agreeing with `final_label`.
    pub consistency_score: f32,
    /// Deterministic human-readable account of how the verdict was reached.
    pub explanation: String,
    /// The modality results this fusion was computed from.
    pub inputs: Vec<ModalityResult>,
    /// When the fusion ran.
    pub produced_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modality_result_clamps_confidence() {
        let r = ModalityResult::new(Modality::Text, EmotionLabel::Happy, 1.7);
        assert_eq!(r.confidence, 1.0);
        let r = ModalityResult::new(Modality::Face, EmotionLabel::Sad, -0.3);
        assert_eq!(r.confidence, 0.0);
    }

    #[test]
    fn labels_serialize_lowercase() {
        let json = serde_json::to_string(&EmotionLabel::Surprise).unwrap();
        assert_eq!(json, "\"surprise\"");
        let json = serde_json::to_string(&Modality::Face).unwrap();
        assert_eq!(json, "\"face\"");
    }
}
