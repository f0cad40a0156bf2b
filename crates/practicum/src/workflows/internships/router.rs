use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use super::domain::{
    ApplicationId, ApplicationStatus, CenterId, EvaluationId, EvaluationItemId, EvaluationType,
    InternshipId, InternshipStatus, OfferId, OfferStatus, ReportId, UserId,
};
use super::error::PlacementError;
use super::repository::{ApplicationQuery, DocumentFiles, PlacementRepository};
use super::service::{
    Answer, CommentUpdate, DocumentOwner, EvaluationPatch, NewDocument, NewInternship, NewOffer,
    PlacementService,
};

type SharedService<R, F> = State<Arc<PlacementService<R, F>>>;

/// Router builder exposing the placement workflow under `/api/v1`.
pub fn placement_router<R, F>(service: Arc<PlacementService<R, F>>) -> Router
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    Router::new()
        .route("/api/v1/offers", post(create_offer_handler::<R, F>))
        .route("/api/v1/offers/:id", delete(delete_offer_handler::<R, F>))
        .route(
            "/api/v1/offers/:id/status",
            patch(offer_status_handler::<R, F>),
        )
        .route(
            "/api/v1/applications",
            post(create_application_handler::<R, F>).get(list_applications_handler::<R, F>),
        )
        .route(
            "/api/v1/applications/:id",
            get(get_application_handler::<R, F>),
        )
        .route(
            "/api/v1/applications/:id/status",
            patch(application_status_handler::<R, F>),
        )
        .route(
            "/api/v1/applications/:id/reports",
            post(create_report_handler::<R, F>).get(list_reports_handler::<R, F>),
        )
        .route("/api/v1/reports/:id", delete(delete_report_handler::<R, F>))
        .route(
            "/api/v1/internships",
            post(create_internship_handler::<R, F>),
        )
        .route(
            "/api/v1/internships/:id/status",
            patch(internship_status_handler::<R, F>),
        )
        .route(
            "/api/v1/internships/:id/final-report",
            put(attach_final_report_handler::<R, F>).delete(detach_final_report_handler::<R, F>),
        )
        .route(
            "/api/v1/centers/:id/convention",
            put(attach_convention_handler::<R, F>).delete(detach_convention_handler::<R, F>),
        )
        .route(
            "/api/v1/internship-evaluations/:id",
            get(get_evaluation_handler::<R, F>)
                .patch(update_evaluation_handler::<R, F>)
                .delete(delete_evaluation_handler::<R, F>),
        )
        .route(
            "/api/v1/internship-evaluations/:id/signature",
            put(attach_signature_handler::<R, F>).delete(detach_signature_handler::<R, F>),
        )
        .route(
            "/api/v1/internship-evaluations/:id/:evaluation_type",
            post(submit_responses_handler::<R, F>),
        )
        .with_state(service)
}

fn respond<T: Serialize>(status: StatusCode, outcome: Result<T, PlacementError>) -> Response {
    match outcome {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error.into_response(),
    }
}

fn bad_request(message: impl ToString) -> Response {
    let payload = json!({
        "error": message.to_string(),
    });
    (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateApplicationRequest {
    pub(crate) student_id: UserId,
    pub(crate) offer_id: OfferId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusRequest {
    pub(crate) status: String,
}

/// Answer values arrive as JSON strings or numbers and are stored as their raw text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum AnswerValue {
    Text(String),
    Number(serde_json::Number),
}

impl AnswerValue {
    fn into_raw(self) -> String {
        match self {
            AnswerValue::Text(text) => text,
            AnswerValue::Number(number) => number.to_string(),
        }
    }
}

/// Distinguishes an omitted field (`None`) from an explicit `null` (`Some(None)`).
fn deserialize_explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerPayload {
    pub(crate) item_id: EvaluationItemId,
    pub(crate) value: AnswerValue,
    #[serde(default, deserialize_with = "deserialize_explicit_null")]
    pub(crate) comment: Option<Option<String>>,
}

impl From<AnswerPayload> for Answer {
    fn from(payload: AnswerPayload) -> Self {
        let comment = match payload.comment {
            None => CommentUpdate::Keep,
            Some(None) => CommentUpdate::Clear,
            Some(Some(comment)) => CommentUpdate::Set(comment),
        };
        Answer {
            item_id: payload.item_id,
            value: payload.value.into_raw(),
            comment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponsesRequest {
    #[serde(default)]
    pub(crate) answers: Vec<AnswerPayload>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EvaluationPatchRequest {
    #[serde(default)]
    pub(crate) supervisor_grade: Option<f64>,
    #[serde(default)]
    pub(crate) report_grade: Option<f64>,
    #[serde(default)]
    pub(crate) supervisor_comments: Option<String>,
    #[serde(default)]
    pub(crate) report_comments: Option<String>,
}

pub(crate) async fn create_offer_handler<R, F>(
    State(service): SharedService<R, F>,
    axum::Json(offer): axum::Json<NewOffer>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(StatusCode::CREATED, service.create_offer(offer))
}

pub(crate) async fn delete_offer_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(offer_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(StatusCode::OK, service.delete_offer(&OfferId(offer_id)))
}

pub(crate) async fn offer_status_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(offer_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let status = match request.status.parse::<OfferStatus>() {
        Ok(status) => status,
        Err(error) => return bad_request(error),
    };
    respond(
        StatusCode::OK,
        service.set_offer_status(&OfferId(offer_id), status),
    )
}

pub(crate) async fn create_application_handler<R, F>(
    State(service): SharedService<R, F>,
    axum::Json(request): axum::Json<CreateApplicationRequest>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(
        StatusCode::CREATED,
        service.create_application(&request.student_id, &request.offer_id),
    )
}

pub(crate) async fn list_applications_handler<R, F>(
    State(service): SharedService<R, F>,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(StatusCode::OK, service.list_applications(&query))
}

pub(crate) async fn get_application_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(application_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(
        StatusCode::OK,
        service.get_application(&ApplicationId(application_id)),
    )
}

pub(crate) async fn application_status_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let status = match request.status.parse::<ApplicationStatus>() {
        Ok(status) => status,
        Err(error) => return bad_request(error),
    };
    respond(
        StatusCode::OK,
        service.set_application_status(&ApplicationId(application_id), status),
    )
}

pub(crate) async fn create_report_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(application_id): Path<String>,
    axum::Json(document): axum::Json<NewDocument>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(
        StatusCode::CREATED,
        service.create_report(&ApplicationId(application_id), document),
    )
}

pub(crate) async fn list_reports_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(application_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(
        StatusCode::OK,
        service.list_reports(&ApplicationId(application_id)),
    )
}

pub(crate) async fn delete_report_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(report_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(StatusCode::OK, service.delete_report(&ReportId(report_id)))
}

pub(crate) async fn create_internship_handler<R, F>(
    State(service): SharedService<R, F>,
    axum::Json(request): axum::Json<NewInternship>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(StatusCode::CREATED, service.create_internship(request))
}

pub(crate) async fn internship_status_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(internship_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let status = match request.status.parse::<InternshipStatus>() {
        Ok(status) => status,
        Err(error) => return bad_request(error),
    };
    respond(
        StatusCode::OK,
        service.transition(&InternshipId(internship_id), status),
    )
}

fn attach<R, F>(
    service: &PlacementService<R, F>,
    owner: DocumentOwner,
    document: NewDocument,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(StatusCode::OK, service.attach_document(&owner, document))
}

fn detach<R, F>(service: &PlacementService<R, F>, owner: DocumentOwner) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(
        StatusCode::OK,
        service
            .detach_document(&owner)
            .map(|removed| json!({ "removed": removed })),
    )
}

pub(crate) async fn attach_final_report_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(internship_id): Path<String>,
    axum::Json(document): axum::Json<NewDocument>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let owner = DocumentOwner::InternshipFinalReport(InternshipId(internship_id));
    attach(&service, owner, document)
}

pub(crate) async fn detach_final_report_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(internship_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    detach(
        &service,
        DocumentOwner::InternshipFinalReport(InternshipId(internship_id)),
    )
}

pub(crate) async fn attach_convention_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(center_id): Path<String>,
    axum::Json(document): axum::Json<NewDocument>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    attach(
        &service,
        DocumentOwner::CenterConvention(CenterId(center_id)),
        document,
    )
}

pub(crate) async fn detach_convention_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(center_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    detach(&service, DocumentOwner::CenterConvention(CenterId(center_id)))
}

pub(crate) async fn get_evaluation_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(evaluation_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    respond(
        StatusCode::OK,
        service.get_evaluation(&EvaluationId(evaluation_id)),
    )
}

pub(crate) async fn submit_responses_handler<R, F>(
    State(service): SharedService<R, F>,
    Path((evaluation_id, evaluation_type)): Path<(String, String)>,
    axum::Json(request): axum::Json<SubmitResponsesRequest>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let evaluation_type = match evaluation_type.parse::<EvaluationType>() {
        Ok(evaluation_type) => evaluation_type,
        Err(error) => return bad_request(error),
    };
    let answers: Vec<Answer> = request.answers.into_iter().map(Answer::from).collect();

    respond(
        StatusCode::OK,
        service.submit_responses(&EvaluationId(evaluation_id), evaluation_type, &answers),
    )
}

pub(crate) async fn update_evaluation_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(evaluation_id): Path<String>,
    axum::Json(request): axum::Json<EvaluationPatchRequest>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let patch = EvaluationPatch {
        supervisor_grade: request.supervisor_grade,
        report_grade: request.report_grade,
        supervisor_comments: request.supervisor_comments,
        report_comments: request.report_comments,
    };
    respond(
        StatusCode::OK,
        service.update_evaluation(&EvaluationId(evaluation_id), patch),
    )
}

pub(crate) async fn delete_evaluation_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(evaluation_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    let id = EvaluationId(evaluation_id);
    respond(
        StatusCode::OK,
        service
            .delete_evaluation(&id)
            .map(|()| json!({ "deleted": id })),
    )
}

pub(crate) async fn attach_signature_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(evaluation_id): Path<String>,
    axum::Json(document): axum::Json<NewDocument>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    attach(
        &service,
        DocumentOwner::EvaluationSignature(EvaluationId(evaluation_id)),
        document,
    )
}

pub(crate) async fn detach_signature_handler<R, F>(
    State(service): SharedService<R, F>,
    Path(evaluation_id): Path<String>,
) -> Response
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    detach(
        &service,
        DocumentOwner::EvaluationSignature(EvaluationId(evaluation_id)),
    )
}
