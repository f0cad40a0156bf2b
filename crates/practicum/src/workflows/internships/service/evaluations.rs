use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::PlacementService;
use crate::workflows::internships::domain::{
    EvaluationId, EvaluationItem, EvaluationItemId, EvaluationResponse, EvaluationType,
    InternshipEvaluation, ResponseId,
};
use crate::workflows::internships::error::PlacementError;
use crate::workflows::internships::grading::{
    aggregate, derive_final_grade, numeric_value, rubric_breakdown, score_answer,
    RubricBreakdown,
};
use crate::workflows::internships::repository::{
    DocumentFiles, PlacementRepository, PlacementTransaction,
};

/// What to do with a response's comment when an answer is re-submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CommentUpdate {
    #[default]
    Keep,
    Clear,
    Set(String),
}

impl CommentUpdate {
    fn apply(&self, current: Option<String>) -> Option<String> {
        match self {
            CommentUpdate::Keep => current,
            CommentUpdate::Clear => None,
            CommentUpdate::Set(comment) => Some(comment.clone()),
        }
    }
}

/// One answer of a submitted rubric batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub item_id: EvaluationItemId,
    pub value: String,
    pub comment: CommentUpdate,
}

/// Grade and comment overrides applied outside the rubric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationPatch {
    pub supervisor_grade: Option<f64>,
    pub report_grade: Option<f64>,
    pub supervisor_comments: Option<String>,
    pub report_comments: Option<String>,
}

/// Evaluation as returned to callers: the record, its answers and how each rubric section scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationView {
    #[serde(flatten)]
    pub evaluation: InternshipEvaluation,
    pub responses: Vec<EvaluationResponse>,
    pub rubric: Vec<RubricBreakdown>,
}

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    /// Upsert a batch of answers for one rubric and recompute the grades it feeds.
    ///
    /// Answers naming unknown or inactive items of `evaluation_type` are skipped. The
    /// per-type grade always covers every stored response of that type, so partial
    /// batches accumulate.
    pub fn submit_responses(
        &self,
        evaluation_id: &EvaluationId,
        evaluation_type: EvaluationType,
        answers: &[Answer],
    ) -> Result<EvaluationView, PlacementError> {
        let view = self.repository.transaction(|tx| {
            let mut evaluation = find_evaluation(&*tx, evaluation_id)?;
            let items = tx.evaluation_items()?;
            let active: HashMap<&EvaluationItemId, &EvaluationItem> = items
                .iter()
                .filter(|item| item.is_active && item.evaluation_type == evaluation_type)
                .map(|item| (&item.id, item))
                .collect();

            let now = Utc::now();
            for answer in answers {
                let Some(item) = active.get(&answer.item_id) else {
                    continue;
                };

                let existing = tx.response(&evaluation.id, &item.id)?;
                let (id, comment) = match existing {
                    Some(current) => (current.id, current.comment),
                    None => (ResponseId::generate(), None),
                };

                tx.upsert_response(&EvaluationResponse {
                    id,
                    evaluation_id: evaluation.id.clone(),
                    item_id: item.id.clone(),
                    selected_value: answer.value.clone(),
                    numeric_value: numeric_value(&answer.value),
                    score: score_answer(item, &answer.value),
                    comment: answer.comment.apply(comment),
                    updated_at: now,
                })?;
            }

            let responses = tx.responses_for(&evaluation.id, Some(evaluation_type))?;
            let grade = aggregate(&responses);
            match evaluation_type {
                EvaluationType::Supervisor => evaluation.supervisor_grade = Some(grade),
                EvaluationType::Report => evaluation.report_grade = Some(grade),
            }
            evaluation.final_grade = Some(derive_final_grade(
                evaluation.supervisor_grade,
                evaluation.report_grade,
            ));
            evaluation.completed_at.get_or_insert(now);
            tx.update_evaluation(&evaluation)?;

            view_of(&*tx, evaluation, &items)
        })?;

        info!(
            evaluation_id = %view.evaluation.id,
            evaluation_type = %evaluation_type,
            grade = ?view.evaluation.grade_for(evaluation_type),
            final_grade = ?view.evaluation.final_grade,
            "evaluation grades recomputed"
        );
        Ok(view)
    }

    /// Overwrite the supervisor grade directly.
    pub fn apply_supervisor_note(
        &self,
        evaluation_id: &EvaluationId,
        grade: f64,
    ) -> Result<InternshipEvaluation, PlacementError> {
        self.update_evaluation(
            evaluation_id,
            EvaluationPatch {
                supervisor_grade: Some(grade),
                ..EvaluationPatch::default()
            },
        )
        .map(|view| view.evaluation)
    }

    /// Overwrite the report grade directly.
    pub fn apply_report_note(
        &self,
        evaluation_id: &EvaluationId,
        grade: f64,
    ) -> Result<InternshipEvaluation, PlacementError> {
        self.update_evaluation(
            evaluation_id,
            EvaluationPatch {
                report_grade: Some(grade),
                ..EvaluationPatch::default()
            },
        )
        .map(|view| view.evaluation)
    }

    pub fn update_evaluation(
        &self,
        evaluation_id: &EvaluationId,
        patch: EvaluationPatch,
    ) -> Result<EvaluationView, PlacementError> {
        self.repository.transaction(|tx| {
            let mut evaluation = find_evaluation(&*tx, evaluation_id)?;

            let regrade = patch.supervisor_grade.is_some() || patch.report_grade.is_some();
            if let Some(grade) = patch.supervisor_grade {
                evaluation.supervisor_grade = Some(grade);
            }
            if let Some(grade) = patch.report_grade {
                evaluation.report_grade = Some(grade);
            }
            if regrade {
                evaluation.final_grade = Some(derive_final_grade(
                    evaluation.supervisor_grade,
                    evaluation.report_grade,
                ));
            }
            if let Some(comments) = patch.supervisor_comments {
                evaluation.supervisor_comments = Some(comments);
            }
            if let Some(comments) = patch.report_comments {
                evaluation.report_comments = Some(comments);
            }

            tx.update_evaluation(&evaluation)?;
            let items = tx.evaluation_items()?;
            view_of(&*tx, evaluation, &items)
        })
    }

    pub fn get_evaluation(
        &self,
        evaluation_id: &EvaluationId,
    ) -> Result<EvaluationView, PlacementError> {
        self.repository.transaction(|tx| {
            let evaluation = find_evaluation(&*tx, evaluation_id)?;
            let items = tx.evaluation_items()?;
            view_of(&*tx, evaluation, &items)
        })
    }

    /// Remove an evaluation, its responses and its signature document together.
    pub fn delete_evaluation(&self, evaluation_id: &EvaluationId) -> Result<(), PlacementError> {
        let signature = self.repository.transaction(|tx| {
            let evaluation = find_evaluation(&*tx, evaluation_id)?;

            let signature = match &evaluation.signature_document {
                Some(document_id) => tx.document(document_id)?,
                None => None,
            };
            let removed = tx.delete_responses(&evaluation.id)?;
            tx.delete_evaluation(&evaluation.id)?;
            if let Some(document) = &signature {
                tx.delete_document(&document.id)?;
            }

            info!(evaluation_id = %evaluation.id, responses = removed, "evaluation deleted");
            Ok::<_, PlacementError>(signature)
        })?;

        if let Some(document) = signature {
            self.discard_file(&document);
        }
        Ok(())
    }
}

fn find_evaluation(
    tx: &dyn PlacementTransaction,
    evaluation_id: &EvaluationId,
) -> Result<InternshipEvaluation, PlacementError> {
    tx.evaluation(evaluation_id)?
        .ok_or_else(|| PlacementError::EvaluationNotFound(evaluation_id.clone()))
}

fn view_of(
    tx: &dyn PlacementTransaction,
    evaluation: InternshipEvaluation,
    items: &[EvaluationItem],
) -> Result<EvaluationView, PlacementError> {
    let responses = tx.responses_for(&evaluation.id, None)?;
    let rubric = [EvaluationType::Supervisor, EvaluationType::Report]
        .into_iter()
        .map(|evaluation_type| rubric_breakdown(evaluation_type, items, &responses))
        .collect();

    Ok(EvaluationView {
        evaluation,
        responses,
        rubric,
    })
}
