//! Fusion and authenticity engine.
//!
//! Combines the per-modality classifier verdicts from one tick into a single
//! [`FusionResult`]: a final label, a fused confidence, a consistency score,
//! and an authenticity verdict with a deterministic explanation.
//!
//! The engine is deliberately two-tier:
//!
//! 1. **Single modality**: a lone signal (e.g. text claiming "I'm fine") is
//!    exactly the case the system must not blindly trust. The result is
//!    reported with a confidence discount, zero consistency, and
//!    `is_authentic = false`.
//! 2. **Multiple modalities**: labels are put to a plurality vote, fused
//!    confidence is a two-stage weighted average, and authenticity requires
//!    both cross-modality agreement and sufficient confidence.
//!
//! All thresholds and weights come from [`FusionConfig`]; nothing here is
//! hard-coded.

use crate::config::FusionConfig;
use crate::emotion::{EmotionLabel, FusionResult, Modality, ModalityResult};
use crate::error::{EmotionError, Result};
use chrono::Utc;
use uuid::Uuid;

/// Stateless fusion engine, parameterized by [`FusionConfig`].
#[derive(Debug, Clone)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    /// Create an engine with the given tuning.
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fuse one tick's modality results into a single verdict.
    ///
    /// # Errors
    ///
    /// Returns [`EmotionError::NoInput`] if `inputs` is empty; the caller
    /// must skip producing a result for that tick.
    pub fn fuse(&self, inputs: Vec<ModalityResult>) -> Result<FusionResult> {
        match inputs.len() {
            0 => Err(EmotionError::NoInput),
            1 => Ok(self.fuse_single(inputs)),
            _ => Ok(self.fuse_multi(inputs)),
        }
    }

    // ── Single modality ─────────────────────────────────────────────────

    fn fuse_single(&self, inputs: Vec<ModalityResult>) -> FusionResult {
        let input = &inputs[0];
        let confidence =
            (input.confidence * self.config.single_modality_discount).clamp(0.0, 1.0);
        let explanation = format!(
            "{} indicates {} ({:.2}); unverified: authenticity requires a second modality",
            input.modality, input.label, input.confidence
        );

        FusionResult {
            analysis_id: Uuid::new_v4(),
            final_label: input.label,
            confidence,
            is_authentic: false,
            consistency_score: 0.0,
            explanation,
            inputs,
            produced_at: Utc::now(),
        }
    }

    // ── Multiple modalities ─────────────────────────────────────────────

    fn fuse_multi(&self, inputs: Vec<ModalityResult>) -> FusionResult {
        let final_label = self.plurality_label(&inputs);
        let confidence = self.weighted_confidence(&inputs);
        let consistency_score = self.consistency_score(&inputs, final_label);

        let is_authentic = consistency_score >= self.config.authenticity_threshold
            && confidence >= self.config.min_confidence;

        let explanation = build_explanation(
            &self.config,
            &inputs,
            final_label,
            confidence,
            consistency_score,
            is_authentic,
        );

        FusionResult {
            analysis_id: Uuid::new_v4(),
            final_label,
            confidence,
            is_authentic,
            consistency_score,
            explanation,
            inputs,
            produced_at: Utc::now(),
        }
    }

    /// The label with the most modality votes.
    ///
    /// Ties are broken by the highest supporting-modality confidence, then
    /// by that supporter's priority weight, then by fixed modality order
    /// (face, text, voice).
    fn plurality_label(&self, inputs: &[ModalityResult]) -> EmotionLabel {
        let mut best: Option<(EmotionLabel, usize, f32, f32, usize)> = None;

        for label in EmotionLabel::ALL {
            let supporters: Vec<&ModalityResult> =
                inputs.iter().filter(|r| r.label == label).collect();
            if supporters.is_empty() {
                continue;
            }

            let votes = supporters.len();
            let top = supporters
                .iter()
                .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                .expect("supporters is non-empty");
            let top_weight = self.config.weight(top.modality);
            let top_rank = modality_rank(top.modality);

            let better = match &best {
                None => true,
                Some((_, b_votes, b_conf, b_weight, b_rank)) => {
                    (votes, top.confidence, top_weight, std::cmp::Reverse(top_rank))
                        .partial_cmp(&(
                            *b_votes,
                            *b_conf,
                            *b_weight,
                            std::cmp::Reverse(*b_rank),
                        ))
                        .map(|o| o == std::cmp::Ordering::Greater)
                        .unwrap_or(false)
                }
            };
            if better {
                best = Some((label, votes, top.confidence, top_weight, top_rank));
            }
        }

        best.map(|(label, ..)| label)
            .expect("fuse_multi called with non-empty inputs")
    }

    /// Two-stage confidence-weighted average over all present modalities.
    ///
    /// Stage 1 weights each modality by its own reported confidence
    /// (normalized across present modalities); stage 2 re-weights by the
    /// per-modality priority and renormalizes. The result rewards both how
    /// sure a modality is and which modality it is.
    fn weighted_confidence(&self, inputs: &[ModalityResult]) -> f32 {
        let confidence_sum: f32 = inputs.iter().map(|r| r.confidence).sum();

        // All-zero confidences degenerate to priority-only weighting.
        let stage_one = |r: &ModalityResult| -> f32 {
            if confidence_sum > f32::EPSILON {
                r.confidence / confidence_sum
            } else {
                1.0 / inputs.len() as f32
            }
        };

        let weight_sum: f32 = inputs
            .iter()
            .map(|r| stage_one(r) * self.config.weight(r.modality))
            .sum();
        if weight_sum <= f32::EPSILON {
            return 0.0;
        }

        let fused: f32 = inputs
            .iter()
            .map(|r| (stage_one(r) * self.config.weight(r.modality) / weight_sum) * r.confidence)
            .sum();
        fused.clamp(0.0, 1.0)
    }

    /// Agreement fraction, reduced by excessive confidence spread among the
    /// agreeing modalities.
    fn consistency_score(&self, inputs: &[ModalityResult], final_label: EmotionLabel) -> f32 {
        let agreeing: Vec<f32> = inputs
            .iter()
            .filter(|r| r.label == final_label)
            .map(|r| r.confidence)
            .collect();

        let mut score = agreeing.len() as f32 / inputs.len() as f32;

        if agreeing.len() >= 2 {
            let max = agreeing.iter().cloned().fold(f32::MIN, f32::max);
            let min = agreeing.iter().cloned().fold(f32::MAX, f32::min);
            let spread = max - min;
            if spread > self.config.spread_threshold {
                score -= spread;
            }
        }

        score.clamp(0.0, 1.0)
    }
}

/// Tie-break rank of a modality (lower wins): face, text, voice.
fn modality_rank(modality: Modality) -> usize {
    Modality::ALL
        .iter()
        .position(|m| *m == modality)
        .expect("modality is in ALL")
}

// ── Explanation ─────────────────────────────────────────────────────────

/// Build the human-readable account of a multi-modality verdict.
///
/// Pure function of its arguments: the same inputs always produce the same
/// string, so explanations are testable and never templated at random.
fn build_explanation(
    config: &FusionConfig,
    inputs: &[ModalityResult],
    final_label: EmotionLabel,
    confidence: f32,
    consistency_score: f32,
    is_authentic: bool,
) -> String {
    let mut ordered: Vec<&ModalityResult> = inputs.iter().collect();
    ordered.sort_by_key(|r| modality_rank(r.modality));

    let describe = |r: &ModalityResult| -> String {
        format!("{} indicates {} ({:.2})", r.modality, r.label, r.confidence)
    };

    let agreeing: Vec<String> = ordered
        .iter()
        .filter(|r| r.label == final_label)
        .map(|r| describe(*r))
        .collect();
    let disagreeing: Vec<String> = ordered
        .iter()
        .filter(|r| r.label != final_label)
        .map(|r| describe(*r))
        .collect();

    let evidence = if disagreeing.is_empty() {
        format!("{}; all modalities agree", agreeing.join(" and "))
    } else {
        format!(
            "{} but {}; conflicting",
            agreeing.join(" and "),
            disagreeing.join(" and ")
        )
    };

    let verdict = if is_authentic {
        "authentic".to_owned()
    } else if consistency_score < config.authenticity_threshold {
        format!(
            "not authentic (consistency {:.2} below {:.2})",
            consistency_score, config.authenticity_threshold
        )
    } else {
        format!(
            "not authentic (confidence {:.2} below {:.2})",
            confidence, config.min_confidence
        )
    };

    format!("{evidence}; {verdict}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> FusionEngine {
        FusionEngine::new(FusionConfig::default())
    }

    fn input(modality: Modality, label: EmotionLabel, confidence: f32) -> ModalityResult {
        ModalityResult::new(modality, label, confidence)
    }

    // ── Empty and single-modality inputs ────────────────────────────────

    #[test]
    fn empty_input_is_refused() {
        let err = engine().fuse(Vec::new()).unwrap_err();
        assert!(matches!(err, EmotionError::NoInput));
    }

    #[test]
    fn single_modality_is_never_authentic() {
        for label in EmotionLabel::ALL {
            let result = engine()
                .fuse(vec![input(Modality::Text, label, 0.95)])
                .unwrap();
            assert!(!result.is_authentic);
            assert_eq!(result.consistency_score, 0.0);
            assert_eq!(result.final_label, label);
        }
    }

    #[test]
    fn single_modality_discounts_confidence() {
        let result = engine()
            .fuse(vec![input(Modality::Text, EmotionLabel::Happy, 0.95)])
            .unwrap();
        assert!((result.confidence - 0.95 * 0.8).abs() < 1e-6);
        assert!(result.explanation.contains("second modality"));
    }

    // ── Agreement ───────────────────────────────────────────────────────

    #[test]
    fn full_agreement_is_authentic() {
        // Enthusiastic text plus a matching forced face capture.
        let result = engine()
            .fuse(vec![
                input(Modality::Text, EmotionLabel::Happy, 0.95),
                input(Modality::Face, EmotionLabel::Happy, 0.82),
            ])
            .unwrap();
        assert_eq!(result.final_label, EmotionLabel::Happy);
        assert_eq!(result.consistency_score, 1.0);
        assert!(result.is_authentic);
        assert!(result.confidence > 0.82 && result.confidence < 0.95);
        assert!(result.explanation.contains("all modalities agree"));
        assert!(result.explanation.ends_with("authentic"));
    }

    #[test]
    fn agreement_with_low_confidence_is_not_authentic() {
        let result = engine()
            .fuse(vec![
                input(Modality::Text, EmotionLabel::Sad, 0.3),
                input(Modality::Face, EmotionLabel::Sad, 0.35),
            ])
            .unwrap();
        assert_eq!(result.consistency_score, 1.0);
        assert!(!result.is_authentic);
        assert!(result.explanation.contains("confidence"));
    }

    #[test]
    fn wide_confidence_spread_reduces_consistency() {
        // Both agree on happy, but 0.95 vs 0.30 is a 0.65 spread, above the
        // 0.4 threshold, so consistency drops by the spread.
        let result = engine()
            .fuse(vec![
                input(Modality::Text, EmotionLabel::Happy, 0.95),
                input(Modality::Face, EmotionLabel::Happy, 0.30),
            ])
            .unwrap();
        assert!((result.consistency_score - (1.0 - 0.65)).abs() < 1e-5);
        assert!(!result.is_authentic);
    }

    // ── Conflict and tie-breaking ───────────────────────────────────────

    #[test]
    fn opposite_labels_resolved_by_confidence() {
        let result = engine()
            .fuse(vec![
                input(Modality::Face, EmotionLabel::Sad, 0.9),
                input(Modality::Text, EmotionLabel::Happy, 0.7),
            ])
            .unwrap();
        assert_eq!(result.final_label, EmotionLabel::Sad);
        assert!(result.consistency_score <= 0.5);
        assert!(!result.is_authentic);
    }

    #[test]
    fn equal_confidence_tie_falls_to_modality_order() {
        // face and text at identical confidence and priority: face wins by
        // fixed modality order.
        let result = engine()
            .fuse(vec![
                input(Modality::Text, EmotionLabel::Happy, 0.9),
                input(Modality::Face, EmotionLabel::Sad, 0.9),
            ])
            .unwrap();
        assert_eq!(result.final_label, EmotionLabel::Sad);
        assert!(!result.is_authentic);
    }

    #[test]
    fn conflict_explanation_names_both_sides() {
        // "I feel fine" text (neutral 0.6) against a sad face (0.85).
        let result = engine()
            .fuse(vec![
                input(Modality::Text, EmotionLabel::Neutral, 0.6),
                input(Modality::Face, EmotionLabel::Sad, 0.85),
            ])
            .unwrap();
        assert_eq!(result.final_label, EmotionLabel::Sad);
        assert!(!result.is_authentic);
        assert!((result.consistency_score - 0.5).abs() < 1e-6);
        assert!(result.explanation.contains("conflicting"));
        assert!(result.explanation.contains("face indicates sad"));
        assert!(result.explanation.contains("text indicates neutral"));
    }

    #[test]
    fn two_against_one_majority_wins() {
        let result = engine()
            .fuse(vec![
                input(Modality::Face, EmotionLabel::Sad, 0.7),
                input(Modality::Voice, EmotionLabel::Sad, 0.6),
                input(Modality::Text, EmotionLabel::Happy, 0.95),
            ])
            .unwrap();
        assert_eq!(result.final_label, EmotionLabel::Sad);
        assert!((result.consistency_score - 2.0 / 3.0).abs() < 1e-5);
        assert!(result.is_authentic);
    }

    // ── Weighting ───────────────────────────────────────────────────────

    #[test]
    fn voice_priority_weight_lowers_its_pull() {
        let config = FusionConfig::default();
        let high_voice = engine()
            .fuse(vec![
                input(Modality::Voice, EmotionLabel::Happy, 0.9),
                input(Modality::Face, EmotionLabel::Happy, 0.5),
            ])
            .unwrap();
        // Same confidences with the high reading on the full-weight modality.
        let high_face = engine()
            .fuse(vec![
                input(Modality::Face, EmotionLabel::Happy, 0.9),
                input(Modality::Voice, EmotionLabel::Happy, 0.5),
            ])
            .unwrap();
        assert!(config.voice_weight < config.face_weight);
        assert!(high_face.confidence > high_voice.confidence);
    }

    #[test]
    fn fused_confidence_stays_in_range() {
        let result = engine()
            .fuse(vec![
                input(Modality::Face, EmotionLabel::Angry, 1.0),
                input(Modality::Voice, EmotionLabel::Angry, 1.0),
                input(Modality::Text, EmotionLabel::Angry, 1.0),
            ])
            .unwrap();
        assert!(result.confidence <= 1.0);
        assert_eq!(result.consistency_score, 1.0);
        assert!(result.is_authentic);
    }

    #[test]
    fn zero_confidence_inputs_do_not_panic() {
        let result = engine()
            .fuse(vec![
                input(Modality::Face, EmotionLabel::Neutral, 0.0),
                input(Modality::Text, EmotionLabel::Neutral, 0.0),
            ])
            .unwrap();
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_authentic);
    }

    // ── Determinism ─────────────────────────────────────────────────────

    #[test]
    fn explanation_is_deterministic() {
        let inputs = vec![
            input(Modality::Text, EmotionLabel::Happy, 0.95),
            input(Modality::Face, EmotionLabel::Sad, 0.82),
        ];
        let a = engine().fuse(inputs.clone()).unwrap();
        let b = engine().fuse(inputs).unwrap();
        assert_eq!(a.explanation, b.explanation);
    }

    #[test]
    fn thresholds_come_from_config() {
        let mut config = FusionConfig::default();
        config.authenticity_threshold = 0.4;
        let lenient = FusionEngine::new(config);
        // 1-of-2 agreement (0.5) passes a 0.4 threshold.
        let result = lenient
            .fuse(vec![
                input(Modality::Face, EmotionLabel::Sad, 0.9),
                input(Modality::Text, EmotionLabel::Happy, 0.6),
            ])
            .unwrap();
        assert!(result.is_authentic);
    }
}
