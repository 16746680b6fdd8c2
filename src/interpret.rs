use std::cmp::Ordering;

use crate::error::ApiError;
use crate::taxonomy::DiseaseTaxonomy;

/// How many alternatives `/predict` reports alongside the top class.
pub const TOP_K: usize = 3;

/// Confidence bucket for a top-1 score. Boundaries are inclusive for the
/// higher bucket: 0.90 is VeryHigh, 0.80 is High, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBucket {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceBucket {
    pub fn from_confidence(confidence: f32) -> Self {
        if confidence >= 0.9 {
            ConfidenceBucket::VeryHigh
        } else if confidence >= 0.8 {
            ConfidenceBucket::High
        } else if confidence >= 0.7 {
            ConfidenceBucket::Medium
        } else if confidence >= 0.6 {
            ConfidenceBucket::Low
        } else {
            ConfidenceBucket::VeryLow
        }
    }

    pub fn level(&self) -> &'static str {
        match self {
            ConfidenceBucket::VeryHigh => "Very High",
            ConfidenceBucket::High => "High",
            ConfidenceBucket::Medium => "Medium",
            ConfidenceBucket::Low => "Low",
            ConfidenceBucket::VeryLow => "Very Low",
        }
    }

    /// Fixed phrase used verbatim in the response.
    pub fn reliability(&self) -> &'static str {
        match self {
            ConfidenceBucket::VeryHigh => "Very Reliable",
            ConfidenceBucket::High => "Reliable",
            ConfidenceBucket::Medium => "Moderately Reliable",
            ConfidenceBucket::Low => "Needs Verification",
            ConfidenceBucket::VeryLow => "Manual Inspection Required",
        }
    }
}

/// A probability vector turned into a ranked report, still index-based;
/// the wire layer resolves indices against the taxonomy.
pub struct Interpretation {
    pub top_index: usize,
    pub confidence: f32,
    pub bucket: ConfidenceBucket,
    /// Descending by score, ties broken by ascending index.
    pub top_k: Vec<(usize, f32)>,
    /// All scores in taxonomy order.
    pub scores: Vec<f32>,
}

/// Index of the maximal score; equal maxima resolve to the lowest index,
/// reproducibly.
fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }
    best
}

fn rank_top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    indices
        .into_iter()
        .take(k)
        .map(|i| (i, scores[i]))
        .collect()
}

pub fn interpret(
    scores: Vec<f32>,
    taxonomy: &DiseaseTaxonomy,
) -> Result<Interpretation, ApiError> {
    if scores.len() != taxonomy.len() {
        return Err(ApiError::Inference(format!(
            "{} scores for a {}-class taxonomy",
            scores.len(),
            taxonomy.len()
        )));
    }
    let top_index = argmax(&scores);
    let confidence = scores[top_index];
    Ok(Interpretation {
        top_index,
        confidence,
        bucket: ConfidenceBucket::from_confidence(confidence),
        top_k: rank_top_k(&scores, TOP_K),
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine(scores: [f32; 9]) -> Vec<f32> {
        scores.to_vec()
    }

    #[test]
    fn top_class_is_the_argmax() {
        let taxonomy = DiseaseTaxonomy::default();
        let result =
            interpret(nine([0.0, 0.1, 0.6, 0.1, 0.05, 0.05, 0.0, 0.05, 0.05]), &taxonomy).unwrap();
        assert_eq!(result.top_index, 2);
        assert!((result.confidence - 0.6).abs() < f32::EPSILON);
    }

    #[test]
    fn ties_resolve_to_the_lowest_index_reproducibly() {
        let taxonomy = DiseaseTaxonomy::default();
        let scores = nine([0.0, 0.3, 0.0, 0.3, 0.0, 0.3, 0.0, 0.05, 0.05]);
        for _ in 0..10 {
            let result = interpret(scores.clone(), &taxonomy).unwrap();
            assert_eq!(result.top_index, 1);
        }
    }

    #[test]
    fn top_k_is_descending_with_index_tiebreak() {
        let taxonomy = DiseaseTaxonomy::default();
        let result =
            interpret(nine([0.1, 0.25, 0.05, 0.25, 0.0, 0.3, 0.0, 0.05, 0.0]), &taxonomy).unwrap();
        let indices: Vec<usize> = result.top_k.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![5, 1, 3]);
    }

    #[test]
    fn bucket_examples_from_each_band() {
        use ConfidenceBucket::*;
        for (confidence, expected) in [
            (0.95, VeryHigh),
            (0.85, High),
            (0.75, Medium),
            (0.65, Low),
            (0.50, VeryLow),
        ] {
            assert_eq!(ConfidenceBucket::from_confidence(confidence), expected);
        }
    }

    #[test]
    fn bucket_boundaries_are_inclusive_upper() {
        use ConfidenceBucket::*;
        assert_eq!(ConfidenceBucket::from_confidence(0.90), VeryHigh);
        assert_eq!(ConfidenceBucket::from_confidence(0.80), High);
        assert_eq!(ConfidenceBucket::from_confidence(0.70), Medium);
        assert_eq!(ConfidenceBucket::from_confidence(0.60), Low);
        assert_eq!(ConfidenceBucket::from_confidence(0.5999), VeryLow);
    }

    #[test]
    fn bucket_phrases_are_fixed() {
        assert_eq!(ConfidenceBucket::VeryHigh.level(), "Very High");
        assert_eq!(ConfidenceBucket::VeryHigh.reliability(), "Very Reliable");
        assert_eq!(
            ConfidenceBucket::VeryLow.reliability(),
            "Manual Inspection Required"
        );
    }

    #[test]
    fn score_count_must_match_taxonomy() {
        let taxonomy = DiseaseTaxonomy::default();
        assert!(matches!(
            interpret(vec![0.5, 0.5], &taxonomy),
            Err(ApiError::Inference(_))
        ));
    }
}
