//! Pure rubric arithmetic: answer scoring, aggregation and final-grade derivation.

mod aggregate;
mod letters;
mod scoring;

pub use aggregate::{
    aggregate, derive_final_grade, round_grade, rubric_breakdown, weighted_aggregate,
    RubricBreakdown, SectionScore,
};
pub use letters::{letter_for, letter_score, LETTER_SCORES};
pub use scoring::{numeric_value, score_answer};
