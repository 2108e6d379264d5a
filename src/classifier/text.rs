//! Keyword-heuristic text emotion classifier.
//!
//! Fast pattern scan over lowercased input text. One keyword table per
//! label; the label with the most hits wins, with confidence growing by hit
//! count with diminishing returns. Text with no hits classifies as neutral.
//!
//! This is the built-in reference implementation of the text modality port;
//! a model-backed classifier can replace it behind the same trait.

use crate::classifier::{EmotionClassifier, RawSample};
use crate::emotion::{EmotionLabel, Modality, ModalityResult};
use crate::error::{EmotionError, Result};
use async_trait::async_trait;

/// (label, keywords)
const KEYWORD_TABLE: &[(EmotionLabel, &[&str])] = &[
    (
        EmotionLabel::Happy,
        &[
            "happy", "joy", "excited", "great", "wonderful", "love", "amazing", "fantastic",
            "delighted", "glad",
        ],
    ),
    (
        EmotionLabel::Sad,
        &[
            "sad", "down", "depressed", "awful", "terrible", "hurt", "cry", "upset", "miserable",
            "lonely",
        ],
    ),
    (
        EmotionLabel::Angry,
        &[
            "angry", "mad", "furious", "hate", "annoyed", "frustrated", "rage", "irritated",
        ],
    ),
    (
        EmotionLabel::Fear,
        &[
            "scared", "afraid", "worried", "anxious", "nervous", "terrified", "panic", "dread",
        ],
    ),
    (
        EmotionLabel::Surprise,
        &["surprised", "shocked", "amazed", "wow", "incredible", "unexpected"],
    ),
    (
        EmotionLabel::Disgust,
        &["disgusted", "gross", "nasty", "revolting", "sick", "repulsed"],
    ),
];

/// Confidence assigned when no keyword matches (neutral fallback).
const NEUTRAL_CONFIDENCE: f32 = 0.6;

/// Classify the emotional tone of free text.
///
/// Pure function; [`TextClassifier`] wraps it behind the port trait.
pub fn classify_text(text: &str) -> ModalityResult {
    let lower = text.to_lowercase();

    let mut best_label = EmotionLabel::Neutral;
    let mut best_score: usize = 0;

    for &(label, keywords) in KEYWORD_TABLE {
        let score = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if score > best_score {
            best_score = score;
            best_label = label;
        }
    }

    if best_score == 0 {
        return ModalityResult::new(Modality::Text, EmotionLabel::Neutral, NEUTRAL_CONFIDENCE);
    }

    // 1 hit -> 0.80, 2 -> 0.90, 3+ -> capped at 0.95.
    let confidence = (0.7 + 0.1 * best_score as f32).min(0.95);
    ModalityResult::new(Modality::Text, best_label, confidence)
}

/// Built-in keyword-based text classifier.
#[derive(Debug, Default, Clone)]
pub struct TextClassifier;

impl TextClassifier {
    /// Create a text classifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmotionClassifier for TextClassifier {
    fn modality(&self) -> Modality {
        Modality::Text
    }

    async fn classify(&self, sample: &RawSample) -> Result<ModalityResult> {
        let RawSample::Text(text) = sample else {
            return Err(EmotionError::Classifier(format!(
                "text classifier received {} sample",
                sample.kind()
            )));
        };
        if text.trim().is_empty() {
            return Err(EmotionError::Classifier("empty text sample".to_owned()));
        }
        Ok(classify_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_text() {
        let result = classify_text("I am so happy and excited today!");
        assert_eq!(result.label, EmotionLabel::Happy);
        assert!(result.confidence >= 0.8);
        assert_eq!(result.modality, Modality::Text);
    }

    #[test]
    fn sad_text() {
        let result = classify_text("I feel really sad and down today");
        assert_eq!(result.label, EmotionLabel::Sad);
        assert!(result.confidence >= 0.8);
    }

    #[test]
    fn plain_text_is_neutral() {
        let result = classify_text("I feel fine");
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert_eq!(result.confidence, NEUTRAL_CONFIDENCE);
    }

    #[test]
    fn more_hits_raise_confidence() {
        let one = classify_text("that was great");
        let many = classify_text("happy, excited, what a wonderful and amazing day, love it");
        assert!(many.confidence > one.confidence);
        assert!(many.confidence <= 0.95);
    }

    #[test]
    fn case_insensitive() {
        let result = classify_text("I AM FURIOUS AND ANGRY");
        assert_eq!(result.label, EmotionLabel::Angry);
    }

    #[tokio::test]
    async fn port_rejects_non_text_samples() {
        let classifier = TextClassifier::new();
        let err = classifier
            .classify(&RawSample::Audio(vec![0.0; 16]))
            .await
            .unwrap_err();
        assert!(matches!(err, EmotionError::Classifier(_)));
    }

    #[tokio::test]
    async fn port_rejects_empty_text() {
        let classifier = TextClassifier::new();
        let err = classifier
            .classify(&RawSample::Text("   ".to_owned()))
            .await
            .unwrap_err();
        assert!(matches!(err, EmotionError::Classifier(_)));
    }
}
