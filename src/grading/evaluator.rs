use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::{
    error::{PortalError, Result},
    grading::scale::{band_for, GradeBand, GradeLetter, GRADE_SCALE},
};

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Share of the final score contributed by each exam sitting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkingWeights {
    pub mid_term: f64,
    pub end_term: f64,
}

impl MarkingWeights {
    pub fn new(mid_term: f64, end_term: f64) -> Result<Self> {
        if !mid_term.is_finite() || !end_term.is_finite() || mid_term < 0.0 || end_term < 0.0 {
            return Err(PortalError::Config(format!(
                "marking weights must be non-negative numbers (got {} / {})",
                mid_term, end_term
            )));
        }

        if (mid_term + end_term - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(PortalError::Config(format!(
                "marking weights must sum to 1.0 (got {} + {})",
                mid_term, end_term
            )));
        }

        Ok(Self { mid_term, end_term })
    }
}

impl Default for MarkingWeights {
    fn default() -> Self {
        Self {
            mid_term: 0.2,
            end_term: 0.8,
        }
    }
}

/// Grade derived from a score. Recomputed on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeResult {
    pub letter: GradeLetter,
    pub label: &'static str,
    pub description: &'static str,
    pub color_tag: &'static str,
}

impl From<&GradeBand> for GradeResult {
    fn from(band: &GradeBand) -> Self {
        Self {
            letter: band.letter,
            label: band.label,
            description: band.description,
            color_tag: band.color_tag,
        }
    }
}

/// Letter counts; every letter is present even when zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    counts: BTreeMap<GradeLetter, usize>,
}

impl GradeDistribution {
    fn empty() -> Self {
        Self {
            counts: GradeLetter::ALL.iter().map(|letter| (*letter, 0)).collect(),
        }
    }

    pub fn get(&self, letter: GradeLetter) -> usize {
        self.counts.get(&letter).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GradeLetter, usize)> + '_ {
        self.counts.iter().map(|(letter, count)| (*letter, *count))
    }
}

pub struct GradeEvaluator {
    weights: MarkingWeights,
}

impl GradeEvaluator {
    pub fn new(weights: MarkingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> MarkingWeights {
        self.weights
    }

    /// Map a score to its band.
    ///
    /// Scores not captured by any band (negative, above 100, NaN, or
    /// fractional values between two integer bands) fall back to E.
    pub fn classify(&self, score: f64) -> GradeResult {
        GRADE_SCALE
            .iter()
            .find(|band| band.contains(score))
            .unwrap_or_else(|| band_for(GradeLetter::E))
            .into()
    }

    /// Weighted final score, rounded half-up to a whole number
    pub fn final_score(&self, mid_term: f64, end_term: f64) -> f64 {
        let weighted = mid_term * self.weights.mid_term + end_term * self.weights.end_term;
        (weighted + 0.5).floor()
    }

    pub fn combined_score(&self, mid_term: f64, end_term: f64) -> GradeResult {
        self.classify(self.final_score(mid_term, end_term))
    }

    pub fn distribution(&self, scores: &[f64]) -> GradeDistribution {
        let mut distribution = GradeDistribution::empty();
        for score in scores {
            let letter = self.classify(*score).letter;
            *distribution.counts.entry(letter).or_insert(0) += 1;
        }
        distribution
    }

    pub fn is_valid_score(score: f64) -> bool {
        score.is_finite() && (0.0..=100.0).contains(&score)
    }

    pub fn bands(&self) -> &'static [GradeBand] {
        &GRADE_SCALE
    }

    /// Display range for a letter, e.g. "80–100%"
    pub fn band_range(letter: GradeLetter) -> String {
        let band = band_for(letter);
        if letter == GradeLetter::E {
            return format!("Below {}%", band.max_score + 1);
        }
        format!("{}–{}%", band.min_score, band.max_score)
    }
}

impl Default for GradeEvaluator {
    fn default() -> Self {
        Self::new(MarkingWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_band_edges() {
        let evaluator = GradeEvaluator::default();
        assert_eq!(evaluator.classify(100.0).letter, GradeLetter::A);
        assert_eq!(evaluator.classify(80.0).letter, GradeLetter::A);
        assert_eq!(evaluator.classify(79.0).letter, GradeLetter::B);
        assert_eq!(evaluator.classify(65.0).letter, GradeLetter::B);
        assert_eq!(evaluator.classify(64.0).letter, GradeLetter::C);
        assert_eq!(evaluator.classify(50.0).letter, GradeLetter::C);
        assert_eq!(evaluator.classify(49.0).letter, GradeLetter::D);
        assert_eq!(evaluator.classify(40.0).letter, GradeLetter::D);
        assert_eq!(evaluator.classify(39.0).letter, GradeLetter::E);
        assert_eq!(evaluator.classify(0.0).letter, GradeLetter::E);
    }

    #[test]
    fn test_classify_out_of_range_falls_back_to_e() {
        let evaluator = GradeEvaluator::default();
        assert_eq!(evaluator.classify(-5.0).letter, GradeLetter::E);
        assert_eq!(evaluator.classify(150.0).letter, GradeLetter::E);
        assert_eq!(evaluator.classify(f64::NAN).letter, GradeLetter::E);
        // between the B and A bands
        assert_eq!(evaluator.classify(79.5).letter, GradeLetter::E);
    }

    #[test]
    fn test_classify_carries_band_details() {
        let grade = GradeEvaluator::default().classify(72.0);
        assert_eq!(grade.label, "Very Good");
        assert_eq!(grade.color_tag, "primary");
        assert!(grade.description.starts_with("Very Good:"));
    }

    #[test]
    fn test_combined_score() {
        let evaluator = GradeEvaluator::default();
        assert_eq!(evaluator.combined_score(100.0, 100.0).letter, GradeLetter::A);
        assert_eq!(evaluator.combined_score(0.0, 0.0).letter, GradeLetter::E);
        assert_eq!(evaluator.final_score(50.0, 50.0), 50.0);
        assert_eq!(evaluator.combined_score(50.0, 50.0).letter, GradeLetter::C);
    }

    #[test]
    fn test_final_score_rounds_half_up() {
        let evaluator = GradeEvaluator::default();
        // 0.2 * 62.5 + 0.8 * 0 = 12.5
        assert_eq!(evaluator.final_score(62.5, 0.0), 13.0);
        // 0.2 * 40 + 0.8 * 79 = 71.2
        assert_eq!(evaluator.final_score(40.0, 79.0), 71.0);
        // 0.2 * 100 + 0.8 * 74.5 = 79.6 -> 80 lands in A
        assert_eq!(evaluator.combined_score(100.0, 74.5).letter, GradeLetter::A);
    }

    #[test]
    fn test_custom_weights() {
        let evaluator = GradeEvaluator::new(MarkingWeights::new(0.5, 0.5).unwrap());
        assert_eq!(evaluator.final_score(90.0, 40.0), 65.0);
        assert_eq!(evaluator.combined_score(90.0, 40.0).letter, GradeLetter::B);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(MarkingWeights::new(0.3, 0.8).is_err());
        assert!(MarkingWeights::new(-0.2, 1.2).is_err());
        assert!(MarkingWeights::new(f64::NAN, 1.0).is_err());
        assert!(MarkingWeights::new(0.25, 0.75).is_ok());
    }

    #[test]
    fn test_distribution_seeds_every_letter() {
        let evaluator = GradeEvaluator::default();

        let distribution = evaluator.distribution(&[85.0, 70.0, 55.0, 45.0, 10.0]);
        for letter in GradeLetter::ALL {
            assert_eq!(distribution.get(letter), 1);
        }

        let empty = evaluator.distribution(&[]);
        assert_eq!(empty.iter().count(), 5);
        assert_eq!(empty.total(), 0);

        let skewed = evaluator.distribution(&[90.0, 95.0, -1.0]);
        assert_eq!(skewed.get(GradeLetter::A), 2);
        assert_eq!(skewed.get(GradeLetter::B), 0);
        assert_eq!(skewed.get(GradeLetter::E), 1);
    }

    #[test]
    fn test_is_valid_score() {
        assert!(GradeEvaluator::is_valid_score(0.0));
        assert!(GradeEvaluator::is_valid_score(100.0));
        assert!(GradeEvaluator::is_valid_score(55.5));
        assert!(!GradeEvaluator::is_valid_score(-0.1));
        assert!(!GradeEvaluator::is_valid_score(100.1));
        assert!(!GradeEvaluator::is_valid_score(f64::NAN));
        assert!(!GradeEvaluator::is_valid_score(f64::INFINITY));
    }

    #[test]
    fn test_band_range() {
        assert_eq!(GradeEvaluator::band_range(GradeLetter::A), "80–100%");
        assert_eq!(GradeEvaluator::band_range(GradeLetter::D), "40–49%");
        assert_eq!(GradeEvaluator::band_range(GradeLetter::E), "Below 40%");
    }
}
