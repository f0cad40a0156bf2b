//! Placement workflow: the eligibility gate in front of applications, the internship
//! lifecycle, rubric grading of evaluations and document linkage.

pub mod domain;
pub(crate) mod eligibility;
pub mod error;
pub mod grading;
pub mod memory;
pub mod repository;
pub mod router;
pub mod rubric;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use domain::{
    AcademicRequirement, Application, ApplicationDetails, ApplicationId, ApplicationReport,
    ApplicationStatus, CenterId, Document, DocumentId, EvaluationId, EvaluationItem,
    EvaluationItemId, EvaluationResponse, EvaluationType, Internship, InternshipCenter,
    InternshipEvaluation, InternshipId, InternshipStatus, Offer, OfferId, OfferStatus, OfferType,
    OfferTypeId, OptionsSchema, Person, PersonRole, ReportId, RequirementStatus, ScoredOption,
    UserId,
};
pub use error::{ErrorKind, PlacementError};
pub use memory::MemoryRepository;
pub use repository::{
    ApplicationQuery, DocumentFiles, Page, PlacementRepository, PlacementTransaction,
    RepositoryError,
};
pub use router::placement_router;
pub use rubric::{default_rubric, import_items, seed_rubric, RubricImportError};
pub use service::{
    Answer, CommentUpdate, DocumentOwner, EvaluationPatch, EvaluationView, InternshipCreated,
    NewDocument, NewInternship, NewOffer, PlacementService,
};
pub use sqlite::SqliteRepository;
