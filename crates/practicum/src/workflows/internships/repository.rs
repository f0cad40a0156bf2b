use serde::{Deserialize, Serialize};

use super::domain::{
    AcademicRequirement, Application, ApplicationId, ApplicationReport, ApplicationStatus,
    CenterId, Document, DocumentId, EvaluationId, EvaluationItem, EvaluationItemId,
    EvaluationResponse, EvaluationType, Internship, InternshipCenter, InternshipEvaluation,
    InternshipId, Offer, OfferId, OfferType, OfferTypeId, Person, ReportId, UserId,
};

/// Storage abstraction so the services can be exercised against any backend.
///
/// Every unit of work runs through [`PlacementRepository::transaction`]: the closure
/// sees a consistent view, and its writes become visible together or not at all.
/// Implementations serialize writers for the duration of the closure.
pub trait PlacementRepository: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn PlacementTransaction) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Operations available inside a transaction.
///
/// Inserts return [`RepositoryError::Conflict`] when they would break a uniqueness rule:
/// one application per (student, offer), one internship per application, one evaluation
/// per internship.
pub trait PlacementTransaction {
    fn person(&self, id: &UserId) -> Result<Option<Person>, RepositoryError>;
    fn save_person(&mut self, person: &Person) -> Result<(), RepositoryError>;

    fn offer_type(&self, id: &OfferTypeId) -> Result<Option<OfferType>, RepositoryError>;
    fn save_offer_type(&mut self, offer_type: &OfferType) -> Result<(), RepositoryError>;

    fn center(&self, id: &CenterId) -> Result<Option<InternshipCenter>, RepositoryError>;
    /// Insert or rename a center. The convention reference is written only by
    /// [`PlacementTransaction::set_center_convention`]; a new center starts without one.
    fn save_center(&mut self, center: &InternshipCenter) -> Result<(), RepositoryError>;
    fn set_center_convention(
        &mut self,
        id: &CenterId,
        document: Option<&DocumentId>,
    ) -> Result<(), RepositoryError>;

    fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
    /// Types in the order they were attached to the offer.
    fn offer_types_for(&self, offer: &OfferId) -> Result<Vec<OfferType>, RepositoryError>;
    fn insert_offer(
        &mut self,
        offer: &Offer,
        offer_types: &[OfferTypeId],
    ) -> Result<(), RepositoryError>;
    fn update_offer(&mut self, offer: &Offer) -> Result<(), RepositoryError>;
    fn delete_offer(&mut self, id: &OfferId) -> Result<bool, RepositoryError>;

    fn academic_requirement(
        &self,
        student: &UserId,
        practice_type: &OfferTypeId,
    ) -> Result<Option<AcademicRequirement>, RepositoryError>;
    fn save_academic_requirement(
        &mut self,
        requirement: &AcademicRequirement,
    ) -> Result<(), RepositoryError>;

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn application_for(
        &self,
        student: &UserId,
        offer: &OfferId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn count_applications_for_offer(&self, offer: &OfferId) -> Result<usize, RepositoryError>;
    fn insert_application(&mut self, application: &Application) -> Result<(), RepositoryError>;
    fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError>;
    fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Page<Application>, RepositoryError>;

    fn internship(&self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError>;
    fn internship_for_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<Internship>, RepositoryError>;
    /// Whether any of the student's applications led to an `in_progress` internship.
    fn has_active_internship(&self, student: &UserId) -> Result<bool, RepositoryError>;
    fn insert_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError>;
    fn update_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError>;

    fn evaluation(&self, id: &EvaluationId)
        -> Result<Option<InternshipEvaluation>, RepositoryError>;
    fn evaluation_for_internship(
        &self,
        internship: &InternshipId,
    ) -> Result<Option<InternshipEvaluation>, RepositoryError>;
    fn insert_evaluation(
        &mut self,
        evaluation: &InternshipEvaluation,
    ) -> Result<(), RepositoryError>;
    fn update_evaluation(
        &mut self,
        evaluation: &InternshipEvaluation,
    ) -> Result<(), RepositoryError>;
    fn delete_evaluation(&mut self, id: &EvaluationId) -> Result<bool, RepositoryError>;

    /// Every rubric item, active or not, ordered by type then order.
    fn evaluation_items(&self) -> Result<Vec<EvaluationItem>, RepositoryError>;
    fn save_evaluation_item(&mut self, item: &EvaluationItem) -> Result<(), RepositoryError>;

    fn response(
        &self,
        evaluation: &EvaluationId,
        item: &EvaluationItemId,
    ) -> Result<Option<EvaluationResponse>, RepositoryError>;
    /// Responses of `evaluation`, restricted to items of `evaluation_type` when given.
    fn responses_for(
        &self,
        evaluation: &EvaluationId,
        evaluation_type: Option<EvaluationType>,
    ) -> Result<Vec<EvaluationResponse>, RepositoryError>;
    /// Insert or replace the response keyed by its (evaluation, item) pair.
    fn upsert_response(&mut self, response: &EvaluationResponse) -> Result<(), RepositoryError>;
    fn delete_responses(&mut self, evaluation: &EvaluationId) -> Result<usize, RepositoryError>;

    fn document(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
    fn insert_document(&mut self, document: &Document) -> Result<(), RepositoryError>;
    fn delete_document(&mut self, id: &DocumentId) -> Result<bool, RepositoryError>;

    fn report(&self, id: &ReportId) -> Result<Option<ApplicationReport>, RepositoryError>;
    fn reports_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<ApplicationReport>, RepositoryError>;
    fn insert_report(&mut self, report: &ApplicationReport) -> Result<(), RepositoryError>;
    fn delete_report(&mut self, id: &ReportId) -> Result<bool, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Filters accepted by the application listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub offer_type_id: Option<OfferTypeId>,
}

impl ApplicationQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }

    /// Lowercased search needle, `None` when blank.
    pub fn needle(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

/// Removes the stored bytes behind a [`Document`] once its row is gone.
pub trait DocumentFiles: Send + Sync {
    fn remove(&self, relative_path: &str) -> std::io::Result<()>;
}
