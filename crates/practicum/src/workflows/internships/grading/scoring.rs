use super::super::domain::EvaluationItem;
use super::letters::letter_score;

/// Convert a raw answer into the item's score.
///
/// Schema options win over the letter scale, which wins over a plain number.
/// Unparseable answers score zero.
pub fn score_answer(item: &EvaluationItem, selected_value: &str) -> f64 {
    if let Some(score) = item.options_schema.lookup(selected_value) {
        return score;
    }

    if let Some(score) = letter_score(selected_value) {
        return score;
    }

    numeric_value(selected_value).unwrap_or(0.0)
}

/// The raw answer read as a finite number, if it is one.
pub fn numeric_value(selected_value: &str) -> Option<f64> {
    selected_value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
