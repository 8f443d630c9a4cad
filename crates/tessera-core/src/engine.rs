//! Match/decision policy: one claimed identity's gallery against the
//! embeddings extracted from a live probe frame.
//!
//! The gallery passed in is already scoped to the claimed identity by the
//! workflow; this engine never ranks candidates across identities.

use crate::capability::DEFAULT_MATCH_THRESHOLD;
use crate::types::Embedding;

/// Terminal outcome of a match evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    /// At least one stored embedding matched the primary probe embedding.
    Matched { similarity: f32 },
    /// A face was present but nothing in the gallery matched.
    NotMatched { best_similarity: f32 },
    /// No face was detected in the live capture. A business outcome, not
    /// an error.
    NoProbeFace,
}

impl MatchDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, MatchDecision::Matched { .. })
    }
}

/// Fixed-threshold cosine matcher.
pub struct MatchEngine {
    threshold: f32,
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl MatchEngine {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Decide whether the probe belongs to the identity that owns `gallery`.
    ///
    /// Only the primary probe embedding (first in detection order) is
    /// evaluated when the live frame contained several faces. The gallery
    /// is always traversed in full, so the outcome does not depend on the
    /// order stored samples were enrolled in.
    pub fn decide(&self, probes: &[Embedding], gallery: &[Embedding]) -> MatchDecision {
        let Some(probe) = probes.first() else {
            return MatchDecision::NoProbeFace;
        };

        if probes.len() > 1 {
            tracing::debug!(
                faces = probes.len(),
                "multiple faces in probe frame; evaluating primary only"
            );
        }

        let mut best = f32::NEG_INFINITY;
        for stored in gallery {
            let sim = probe.similarity(stored);
            if sim > best {
                best = sim;
            }
        }

        if best >= self.threshold {
            MatchDecision::Matched { similarity: best }
        } else {
            MatchDecision::NotMatched {
                best_similarity: if best == f32::NEG_INFINITY { 0.0 } else { best },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding {
            values: values.to_vec(),
            model_version: None,
        }
    }

    #[test]
    fn empty_probe_set_is_no_probe_face() {
        let engine = MatchEngine::default();
        let gallery = vec![emb(&[1.0, 0.0])];
        assert_eq!(engine.decide(&[], &gallery), MatchDecision::NoProbeFace);
    }

    #[test]
    fn any_stored_hit_matches() {
        let engine = MatchEngine::default();
        let probes = vec![emb(&[1.0, 0.0, 0.0])];
        // Two decoys, one genuine sample.
        let gallery = vec![
            emb(&[0.0, 1.0, 0.0]),
            emb(&[0.0, 0.0, 1.0]),
            emb(&[1.0, 0.0, 0.0]),
        ];

        let decision = engine.decide(&probes, &gallery);
        match decision {
            MatchDecision::Matched { similarity } => {
                assert!((similarity - 1.0).abs() < 1e-6);
            }
            other => panic!("expected Matched, got {other:?}"),
        }
    }

    #[test]
    fn no_hit_is_not_matched_with_best_similarity() {
        let engine = MatchEngine::default();
        let probes = vec![emb(&[1.0, 0.0])];
        let gallery = vec![emb(&[0.0, 1.0])];

        match engine.decide(&probes, &gallery) {
            MatchDecision::NotMatched { best_similarity } => {
                assert!(best_similarity.abs() < 1e-6);
            }
            other => panic!("expected NotMatched, got {other:?}"),
        }
    }

    #[test]
    fn empty_gallery_is_not_matched() {
        let engine = MatchEngine::default();
        let probes = vec![emb(&[1.0, 0.0])];
        match engine.decide(&probes, &[]) {
            MatchDecision::NotMatched { best_similarity } => {
                assert_eq!(best_similarity, 0.0);
            }
            other => panic!("expected NotMatched, got {other:?}"),
        }
    }

    #[test]
    fn gallery_order_does_not_change_outcome() {
        let engine = MatchEngine::default();
        let probes = vec![emb(&[1.0, 0.0, 0.0])];
        let mut gallery = vec![
            emb(&[1.0, 0.0, 0.0]),
            emb(&[0.0, 1.0, 0.0]),
            emb(&[0.0, 0.0, 1.0]),
        ];

        let first = engine.decide(&probes, &gallery);
        gallery.rotate_left(1);
        let rotated = engine.decide(&probes, &gallery);
        gallery.reverse();
        let reversed = engine.decide(&probes, &gallery);

        assert_eq!(first, rotated);
        assert_eq!(first, reversed);
    }

    #[test]
    fn only_primary_probe_embedding_is_evaluated() {
        let engine = MatchEngine::default();
        // Primary face does not match the gallery; a bystander's would.
        let probes = vec![emb(&[0.0, 1.0]), emb(&[1.0, 0.0])];
        let gallery = vec![emb(&[1.0, 0.0])];

        match engine.decide(&probes, &gallery) {
            MatchDecision::NotMatched { .. } => {}
            other => panic!("secondary probe face must not grant access, got {other:?}"),
        }
    }

    #[test]
    fn custom_threshold_is_respected() {
        let strict = MatchEngine::new(0.99);
        let probes = vec![emb(&[1.0, 0.1])];
        let gallery = vec![emb(&[1.0, 0.0])];

        assert!(!strict.decide(&probes, &gallery).is_granted());
        assert!(MatchEngine::new(0.5).decide(&probes, &gallery).is_granted());
    }
}
