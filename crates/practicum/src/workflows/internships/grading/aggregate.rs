use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::super::domain::{EvaluationItem, EvaluationResponse, EvaluationType};

/// Round half away from zero to two decimals.
pub fn round_grade(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of the stored response scores, `0` when nothing was answered.
pub fn aggregate(responses: &[EvaluationResponse]) -> f64 {
    if responses.is_empty() {
        return 0.0;
    }

    let total: f64 = responses.iter().map(|response| response.score).sum();
    round_grade(total / responses.len() as f64)
}

/// Weight-adjusted mean over responses whose item is known and carries a positive weight.
pub fn weighted_aggregate(responses: &[EvaluationResponse], items: &[EvaluationItem]) -> f64 {
    let weights: HashMap<_, _> = items.iter().map(|item| (&item.id, item.weight)).collect();

    let (weighted, total_weight) = responses
        .iter()
        .filter_map(|response| {
            weights
                .get(&response.item_id)
                .copied()
                .filter(|weight| weight.is_finite() && *weight > 0.0)
                .map(|weight| (response.score * weight, weight))
        })
        .fold((0.0, 0.0), |(sum, weights), (score, weight)| {
            (sum + score, weights + weight)
        });

    if total_weight <= 0.0 {
        0.0
    } else {
        round_grade(weighted / total_weight)
    }
}

/// Combine the two partial grades.
///
/// A missing or zero grade counts as "not graded yet", so a single graded part
/// stands on its own until the other one arrives.
pub fn derive_final_grade(supervisor_grade: Option<f64>, report_grade: Option<f64>) -> f64 {
    let graded = |grade: Option<f64>| grade.filter(|value| *value > 0.0);

    match (graded(supervisor_grade), graded(report_grade)) {
        (Some(supervisor), Some(report)) => round_grade((supervisor + report) / 2.0),
        (Some(supervisor), None) => supervisor,
        (None, Some(report)) => report,
        (None, None) => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionScore {
    pub section: String,
    pub answered: usize,
    pub items: usize,
    pub weighted_score: f64,
}

/// Per-section view of one rubric for an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RubricBreakdown {
    pub evaluation_type: EvaluationType,
    pub sections: Vec<SectionScore>,
    pub weighted_score: f64,
}

pub fn rubric_breakdown(
    evaluation_type: EvaluationType,
    items: &[EvaluationItem],
    responses: &[EvaluationResponse],
) -> RubricBreakdown {
    let mut rubric: Vec<&EvaluationItem> = items
        .iter()
        .filter(|item| item.evaluation_type == evaluation_type)
        .collect();
    rubric.sort_by_key(|item| item.order);

    let mut sections: BTreeMap<&str, (Vec<EvaluationItem>, Vec<EvaluationResponse>)> =
        BTreeMap::new();
    for item in &rubric {
        let entry = sections.entry(item.section.as_str()).or_default();
        entry.0.push((*item).clone());
        entry.1.extend(
            responses
                .iter()
                .filter(|response| response.item_id == item.id)
                .cloned(),
        );
    }

    let in_rubric: Vec<EvaluationResponse> = responses
        .iter()
        .filter(|response| rubric.iter().any(|item| item.id == response.item_id))
        .cloned()
        .collect();
    let rubric_items: Vec<EvaluationItem> = rubric.into_iter().cloned().collect();

    RubricBreakdown {
        evaluation_type,
        sections: sections
            .into_iter()
            .map(|(section, (items, answered))| SectionScore {
                section: section.to_string(),
                answered: answered.len(),
                items: items.len(),
                weighted_score: weighted_aggregate(&answered, &items),
            })
            .collect(),
        weighted_score: weighted_aggregate(&in_rubric, &rubric_items),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::internships::domain::{
        EvaluationId, EvaluationItemId, OptionsSchema, ResponseId,
    };
    use chrono::Utc;

    fn response(item: &str, score: f64) -> EvaluationResponse {
        EvaluationResponse {
            id: ResponseId::generate(),
            evaluation_id: EvaluationId::from("eva-1"),
            item_id: EvaluationItemId::from(item),
            selected_value: score.to_string(),
            numeric_value: Some(score),
            score,
            comment: None,
            updated_at: Utc::now(),
        }
    }

    fn item(id: &str, section: &str, weight: f64) -> EvaluationItem {
        EvaluationItem {
            id: EvaluationItemId::from(id),
            evaluation_type: EvaluationType::Supervisor,
            label: id.to_string(),
            section: section.to_string(),
            order: 0,
            weight,
            max_score: 7.0,
            options_schema: OptionsSchema::NoSchema,
            is_active: true,
        }
    }

    #[test]
    fn aggregate_of_nothing_is_zero() {
        assert_eq!(aggregate(&[]), 0.0);
    }

    #[test]
    fn aggregate_is_the_rounded_mean() {
        let responses = vec![response("a", 7.0), response("b", 5.0)];
        assert_eq!(aggregate(&responses), 6.0);

        let responses = vec![response("a", 7.0), response("b", 6.0), response("c", 6.0)];
        assert_eq!(aggregate(&responses), 6.33);
    }

    #[test]
    fn final_grade_treats_zero_as_ungraded() {
        assert_eq!(derive_final_grade(Some(0.0), Some(0.0)), 0.0);
        assert_eq!(derive_final_grade(None, None), 0.0);
        assert_eq!(derive_final_grade(Some(6.0), Some(0.0)), 6.0);
        assert_eq!(derive_final_grade(Some(6.0), None), 6.0);
        assert_eq!(derive_final_grade(Some(0.0), Some(5.0)), 5.0);
        assert_eq!(derive_final_grade(Some(6.0), Some(4.0)), 5.0);
        assert_eq!(derive_final_grade(Some(6.5), Some(4.0)), 5.25);
    }

    #[test]
    fn weighted_aggregate_ignores_unknown_and_weightless_items() {
        let items = vec![item("a", "Core", 2.0), item("b", "Core", 1.0), item("c", "Core", 0.0)];
        let responses = vec![
            response("a", 7.0),
            response("b", 4.0),
            response("c", 0.0),
            response("ghost", 1.0),
        ];
        assert_eq!(weighted_aggregate(&responses, &items), 6.0);
        assert_eq!(weighted_aggregate(&[], &items), 0.0);
    }

    #[test]
    fn breakdown_groups_by_section() {
        let items = vec![
            item("a", "Attitude", 1.0),
            item("b", "Attitude", 1.0),
            item("c", "Technique", 1.0),
        ];
        let responses = vec![response("a", 7.0), response("c", 4.0)];

        let breakdown = rubric_breakdown(EvaluationType::Supervisor, &items, &responses);

        assert_eq!(breakdown.sections.len(), 2);
        assert_eq!(breakdown.sections[0].section, "Attitude");
        assert_eq!(breakdown.sections[0].answered, 1);
        assert_eq!(breakdown.sections[0].items, 2);
        assert_eq!(breakdown.sections[0].weighted_score, 7.0);
        assert_eq!(breakdown.weighted_score, 5.5);
        assert!(rubric_breakdown(EvaluationType::Report, &items, &responses)
            .sections
            .is_empty());
    }
}
