use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::domain::{
    ApplicationId, CenterId, EvaluationId, InternshipId, InternshipStatus, OfferId, OfferTypeId,
    ReportId, UserId,
};
use super::repository::RepositoryError;

/// Stable, machine-readable classification of a business failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OfferNotFound,
    OfferNotAvailable,
    ActiveInternshipExists,
    AcademicRequirementsNotMet,
    DuplicateApplication,
    EvaluationNotFound,
    DependentRecords,
    ApplicationNotFound,
    ApplicationNotApproved,
    InternshipNotFound,
    InternshipAlreadyExists,
    CenterNotFound,
    ReportNotFound,
    InvalidTransition,
    InvalidOffer,
    InvalidDocument,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::OfferNotFound => "OFFER_NOT_FOUND",
            ErrorKind::OfferNotAvailable => "OFFER_NOT_AVAILABLE",
            ErrorKind::ActiveInternshipExists => "ACTIVE_INTERNSHIP_EXISTS",
            ErrorKind::AcademicRequirementsNotMet => "ACADEMIC_REQUIREMENTS_NOT_MET",
            ErrorKind::DuplicateApplication => "DUPLICATE_APPLICATION",
            ErrorKind::EvaluationNotFound => "EVALUATION_NOT_FOUND",
            ErrorKind::DependentRecords => "DEPENDENT_RECORDS",
            ErrorKind::ApplicationNotFound => "APPLICATION_NOT_FOUND",
            ErrorKind::ApplicationNotApproved => "APPLICATION_NOT_APPROVED",
            ErrorKind::InternshipNotFound => "INTERNSHIP_NOT_FOUND",
            ErrorKind::InternshipAlreadyExists => "INTERNSHIP_ALREADY_EXISTS",
            ErrorKind::CenterNotFound => "CENTER_NOT_FOUND",
            ErrorKind::ReportNotFound => "REPORT_NOT_FOUND",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::InvalidOffer => "INVALID_OFFER",
            ErrorKind::InvalidDocument => "INVALID_DOCUMENT",
        }
    }

    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::OfferNotFound
            | ErrorKind::EvaluationNotFound
            | ErrorKind::ApplicationNotFound
            | ErrorKind::InternshipNotFound
            | ErrorKind::CenterNotFound
            | ErrorKind::ReportNotFound => StatusCode::NOT_FOUND,
            ErrorKind::OfferNotAvailable
            | ErrorKind::AcademicRequirementsNotMet
            | ErrorKind::ApplicationNotApproved
            | ErrorKind::InvalidOffer
            | ErrorKind::InvalidDocument => StatusCode::BAD_REQUEST,
            ErrorKind::ActiveInternshipExists
            | ErrorKind::DuplicateApplication
            | ErrorKind::DependentRecords
            | ErrorKind::InternshipAlreadyExists
            | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
        }
    }
}

/// Error raised by the placement services.
#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("offer {0} does not exist")]
    OfferNotFound(OfferId),
    #[error("offer {0} is not accepting applications")]
    OfferNotAvailable(OfferId),
    #[error("student {0} already has an internship in progress")]
    ActiveInternshipExists(UserId),
    #[error("student {student} has no approved academic requirement for practice type {practice_type}")]
    AcademicRequirementsNotMet {
        student: UserId,
        practice_type: OfferTypeId,
    },
    #[error("student {student} already applied to offer {offer}")]
    DuplicateApplication { student: UserId, offer: OfferId },
    #[error("evaluation {0} does not exist")]
    EvaluationNotFound(EvaluationId),
    #[error("{0}")]
    DependentRecords(String),
    #[error("application {0} does not exist")]
    ApplicationNotFound(ApplicationId),
    #[error("application {0} has not been approved")]
    ApplicationNotApproved(ApplicationId),
    #[error("internship {0} does not exist")]
    InternshipNotFound(InternshipId),
    #[error("application {0} already has an internship")]
    InternshipAlreadyExists(ApplicationId),
    #[error("internship center {0} does not exist")]
    CenterNotFound(CenterId),
    #[error("report {0} does not exist")]
    ReportNotFound(ReportId),
    #[error("cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("invalid offer: {0}")]
    InvalidOffer(String),
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PlacementError {
    pub(crate) fn internship_transition(from: InternshipStatus, to: InternshipStatus) -> Self {
        PlacementError::InvalidTransition {
            from: from.label().to_string(),
            to: to.label().to_string(),
        }
    }

    /// `None` for storage failures, which carry no client-facing kind.
    pub fn kind(&self) -> Option<ErrorKind> {
        let kind = match self {
            PlacementError::OfferNotFound(_) => ErrorKind::OfferNotFound,
            PlacementError::OfferNotAvailable(_) => ErrorKind::OfferNotAvailable,
            PlacementError::ActiveInternshipExists(_) => ErrorKind::ActiveInternshipExists,
            PlacementError::AcademicRequirementsNotMet { .. } => {
                ErrorKind::AcademicRequirementsNotMet
            }
            PlacementError::DuplicateApplication { .. } => ErrorKind::DuplicateApplication,
            PlacementError::EvaluationNotFound(_) => ErrorKind::EvaluationNotFound,
            PlacementError::DependentRecords(_) => ErrorKind::DependentRecords,
            PlacementError::ApplicationNotFound(_) => ErrorKind::ApplicationNotFound,
            PlacementError::ApplicationNotApproved(_) => ErrorKind::ApplicationNotApproved,
            PlacementError::InternshipNotFound(_) => ErrorKind::InternshipNotFound,
            PlacementError::InternshipAlreadyExists(_) => ErrorKind::InternshipAlreadyExists,
            PlacementError::CenterNotFound(_) => ErrorKind::CenterNotFound,
            PlacementError::ReportNotFound(_) => ErrorKind::ReportNotFound,
            PlacementError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PlacementError::InvalidOffer(_) => ErrorKind::InvalidOffer,
            PlacementError::InvalidDocument(_) => ErrorKind::InvalidDocument,
            PlacementError::Repository(_) => return None,
        };
        Some(kind)
    }
}

impl IntoResponse for PlacementError {
    fn into_response(self) -> Response {
        match self.kind() {
            Some(kind) => {
                let payload = json!({
                    "kind": kind.code(),
                    "error": self.to_string(),
                });
                (kind.status(), Json(payload)).into_response()
            }
            None => {
                tracing::error!(error = %self, "placement storage failure");
                let payload = json!({
                    "error": self.to_string(),
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_stable_codes_and_statuses() {
        let error = PlacementError::DuplicateApplication {
            student: UserId::from("stu-1"),
            offer: OfferId::from("off-1"),
        };
        let kind = error.kind().expect("business error");
        assert_eq!(kind.code(), "DUPLICATE_APPLICATION");
        assert_eq!(kind.status(), StatusCode::CONFLICT);

        let kind = PlacementError::OfferNotAvailable(OfferId::from("off-1"))
            .kind()
            .expect("business error");
        assert_eq!(kind.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_failures_have_no_kind() {
        let error = PlacementError::from(RepositoryError::Unavailable("disk".to_string()));
        assert!(error.kind().is_none());
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
