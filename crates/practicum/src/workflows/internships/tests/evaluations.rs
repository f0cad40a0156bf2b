use super::common::*;
use crate::workflows::internships::domain::{EvaluationId, EvaluationItemId, EvaluationType};
use crate::workflows::internships::repository::PlacementRepository;
use crate::workflows::internships::service::{Answer, CommentUpdate, EvaluationPatch};
use crate::workflows::internships::{DocumentOwner, PlacementError};

fn answer(item: &str, value: &str) -> Answer {
    Answer {
        item_id: EvaluationItemId::from(item),
        value: value.to_string(),
        comment: CommentUpdate::Keep,
    }
}

fn opened_evaluation(service: &TestService) -> EvaluationId {
    started_internship(service)
        .evaluation_id
        .expect("evaluation opened with the internship")
}

#[test]
fn supervisor_answers_set_supervisor_and_final_grade() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);

    let view = service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[answer("sup-punctuality", "A"), answer("sup-teamwork", "C")],
        )
        .expect("responses stored");

    assert_eq!(view.evaluation.supervisor_grade, Some(6.0));
    assert_eq!(view.evaluation.report_grade, None);
    assert_eq!(view.evaluation.final_grade, Some(6.0));
    assert!(view.evaluation.completed_at.is_some());
    assert_eq!(view.responses.len(), 2);
}

#[test]
fn resubmitting_identical_answers_is_idempotent() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);
    let answers = [answer("sup-punctuality", "B"), answer("sup-quality", "5.5")];

    let first = service
        .submit_responses(&evaluation_id, EvaluationType::Supervisor, &answers)
        .expect("first batch");
    let second = service
        .submit_responses(&evaluation_id, EvaluationType::Supervisor, &answers)
        .expect("second batch");

    assert_eq!(first.evaluation.supervisor_grade, second.evaluation.supervisor_grade);
    assert_eq!(first.evaluation.final_grade, second.evaluation.final_grade);
    assert_eq!(second.responses.len(), 2);
    let ids: Vec<_> = first.responses.iter().map(|response| &response.id).collect();
    let again: Vec<_> = second.responses.iter().map(|response| &response.id).collect();
    assert_eq!(ids, again);
}

#[test]
fn partial_batches_accumulate_into_one_grade() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);

    service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[answer("sup-punctuality", "A")],
        )
        .expect("first batch");
    let view = service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[answer("sup-teamwork", "D")],
        )
        .expect("second batch");

    assert_eq!(view.evaluation.supervisor_grade, Some(5.5));
    assert_eq!(view.responses.len(), 2);
}

#[test]
fn both_rubrics_average_into_the_final_grade() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);

    service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[answer("sup-punctuality", "B")],
        )
        .expect("supervisor batch");
    let view = service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Report,
            &[answer("rep-structure", "adequate"), answer("rep-analysis", "3")],
        )
        .expect("report batch");

    assert_eq!(view.evaluation.report_grade, Some(4.0));
    assert_eq!(view.evaluation.final_grade, Some(5.0));
    let structure = view
        .responses
        .iter()
        .find(|response| response.item_id.as_str() == "rep-structure")
        .expect("structure answered");
    assert_eq!(structure.score, 5.0);
    assert_eq!(structure.numeric_value, None);
}

#[test]
fn answers_for_other_rubrics_or_unknown_items_are_ignored() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);

    let view = service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[
                answer("rep-structure", "excellent"),
                answer("itm-unknown", "A"),
                answer("sup-teamwork", "E"),
            ],
        )
        .expect("batch stored");

    assert_eq!(view.responses.len(), 1);
    assert_eq!(view.evaluation.supervisor_grade, Some(2.0));
}

#[test]
fn comments_are_kept_cleared_or_replaced() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);
    let submit = |comment: CommentUpdate| {
        service
            .submit_responses(
                &evaluation_id,
                EvaluationType::Supervisor,
                &[Answer {
                    item_id: EvaluationItemId::from("sup-teamwork"),
                    value: "B".to_string(),
                    comment,
                }],
            )
            .expect("batch stored")
            .responses[0]
            .comment
            .clone()
    };

    assert_eq!(
        submit(CommentUpdate::Set("Reliable".to_string())).as_deref(),
        Some("Reliable")
    );
    assert_eq!(submit(CommentUpdate::Keep).as_deref(), Some("Reliable"));
    assert_eq!(submit(CommentUpdate::Clear), None);
}

#[test]
fn unknown_evaluation_is_reported() {
    let (service, _, _) = build_service();
    match service.submit_responses(
        &EvaluationId::from("eva-missing"),
        EvaluationType::Report,
        &[answer("rep-analysis", "A")],
    ) {
        Err(PlacementError::EvaluationNotFound(id)) => assert_eq!(id.as_str(), "eva-missing"),
        other => panic!("expected missing evaluation, got {other:?}"),
    }
}

#[test]
fn direct_notes_recompute_the_final_grade() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);

    let evaluation = service
        .apply_supervisor_note(&evaluation_id, 6.0)
        .expect("supervisor note");
    assert_eq!(evaluation.final_grade, Some(6.0));

    let evaluation = service
        .apply_report_note(&evaluation_id, 4.0)
        .expect("report note");
    assert_eq!(evaluation.final_grade, Some(5.0));

    let evaluation = service
        .apply_supervisor_note(&evaluation_id, 0.0)
        .expect("cleared supervisor note");
    assert_eq!(evaluation.final_grade, Some(4.0));
}

#[test]
fn patch_updates_comments_without_touching_grades() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);

    let view = service
        .update_evaluation(
            &evaluation_id,
            EvaluationPatch {
                supervisor_comments: Some("Strong start".to_string()),
                ..EvaluationPatch::default()
            },
        )
        .expect("patched");

    assert_eq!(
        view.evaluation.supervisor_comments.as_deref(),
        Some("Strong start")
    );
    assert_eq!(view.evaluation.final_grade, None);
}

#[test]
fn view_breaks_rubrics_down_by_section() {
    let (service, _, _) = build_service();
    let evaluation_id = opened_evaluation(&service);
    service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[answer("sup-initiative", "A"), answer("sup-quality", "C")],
        )
        .expect("batch stored");

    let view = service.get_evaluation(&evaluation_id).expect("view loads");
    let supervisor = view
        .rubric
        .iter()
        .find(|breakdown| breakdown.evaluation_type == EvaluationType::Supervisor)
        .expect("supervisor rubric");
    let technical = supervisor
        .sections
        .iter()
        .find(|section| section.section == "Technical performance")
        .expect("technical section");
    assert_eq!(technical.answered, 2);
    assert_eq!(technical.items, 2);
}

#[test]
fn deleting_an_evaluation_removes_responses_and_signature() {
    let (service, repository, files) = build_service();
    let evaluation_id = opened_evaluation(&service);
    service
        .submit_responses(
            &evaluation_id,
            EvaluationType::Supervisor,
            &[answer("sup-teamwork", "A")],
        )
        .expect("batch stored");
    let signature = service
        .attach_document(
            &DocumentOwner::EvaluationSignature(evaluation_id.clone()),
            upload("signature.png", "signatures/eva.png"),
        )
        .expect("signature attached");

    service
        .delete_evaluation(&evaluation_id)
        .expect("evaluation deleted");

    assert_eq!(files.removed(), vec!["signatures/eva.png".to_string()]);
    let (document, responses) = repository
        .transaction(|tx| {
            Ok::<_, PlacementError>((
                tx.document(&signature.id)?,
                tx.responses_for(&evaluation_id, None)?,
            ))
        })
        .expect("state readable");
    assert!(document.is_none());
    assert!(responses.is_empty());
    assert!(matches!(
        service.get_evaluation(&evaluation_id),
        Err(PlacementError::EvaluationNotFound(_))
    ));
}
