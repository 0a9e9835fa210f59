pub mod scale;
pub mod evaluator;

pub use scale::{GradeBand, GradeLetter, GRADE_SCALE};
pub use evaluator::{GradeDistribution, GradeEvaluator, GradeResult, MarkingWeights};
