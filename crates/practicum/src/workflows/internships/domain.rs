use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Mint a fresh identifier for a row about to be inserted.
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(
    /// Stable user identifier supplied by the authentication session.
    UserId,
    "usr"
);
entity_id!(OfferId, "off");
entity_id!(OfferTypeId, "oft");
entity_id!(CenterId, "ctr");
entity_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId,
    "app"
);
entity_id!(InternshipId, "int");
entity_id!(EvaluationId, "eva");
entity_id!(EvaluationItemId, "itm");
entity_id!(ResponseId, "rsp");
entity_id!(DocumentId, "doc");
entity_id!(ReportId, "rpt");

/// Error raised when a status label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let trimmed = value.trim();
                $(
                    if trimmed.eq_ignore_ascii_case($label) {
                        return Ok($name::$variant);
                    }
                )+
                Err(UnknownLabel {
                    kind: $kind,
                    value: value.to_string(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled_enum!(
    /// Publication state of an offer; only published offers accept applications.
    OfferStatus, "offer status", {
        Published => "published",
        Closed => "closed",
        Filled => "filled",
    }
);

labelled_enum!(
    /// Review state of an application.
    ApplicationStatus, "application status", {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

labelled_enum!(
    RequirementStatus, "requirement status", {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

labelled_enum!(
    /// Forward-only lifecycle of a realized placement.
    InternshipStatus, "internship status", {
        InProgress => "in_progress",
        PendingEvaluation => "pending_evaluation",
        Finished => "finished",
    }
);

labelled_enum!(
    /// Which rubric an item or a submitted batch belongs to.
    EvaluationType, "evaluation type", {
        Supervisor => "SUPERVISOR",
        Report => "REPORT",
    }
);

labelled_enum!(
    PersonRole, "person role", {
        Student => "student",
        Supervisor => "supervisor",
        Coordinator => "coordinator",
    }
);

impl ApplicationStatus {
    /// Applications only leave `pending`, and only once.
    pub fn can_become(self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
        )
    }
}

impl InternshipStatus {
    const fn rank(self) -> u8 {
        match self {
            InternshipStatus::InProgress => 0,
            InternshipStatus::PendingEvaluation => 1,
            InternshipStatus::Finished => 2,
        }
    }

    /// Only strictly forward moves are legal.
    pub fn can_become(self, next: InternshipStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// Anyone the placement workflow refers to by user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: PersonRole,
}

/// Practice type an offer is classified under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferType {
    pub id: OfferTypeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternshipCenter {
    pub id: CenterId,
    pub name: String,
    pub convention_document: Option<DocumentId>,
}

/// Maximum number of practice types a single offer can be classified under.
pub const MAX_OFFER_TYPES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,
    pub title: String,
    pub description: String,
    pub deadline: NaiveDate,
    pub status: OfferStatus,
    pub center_id: Option<CenterId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicRequirement {
    pub student_id: UserId,
    pub practice_type: OfferTypeId,
    pub status: RequirementStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    pub student_id: UserId,
    pub offer_id: OfferId,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An application returned together with the offer graph callers render alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetails {
    #[serde(flatten)]
    pub application: Application,
    pub offer: Offer,
    pub offer_types: Vec<OfferType>,
    pub center: Option<InternshipCenter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Internship {
    pub id: InternshipId,
    pub application_id: Option<ApplicationId>,
    pub supervisor_id: UserId,
    pub coordinator_id: UserId,
    pub status: InternshipStatus,
    pub final_report: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
}

/// One selectable answer of a schema-driven rubric item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOption {
    pub key: String,
    pub score: f64,
}

/// Answer schema attached to a rubric item.
///
/// Parsed once when the item is loaded; anything that is not a well-formed
/// `{"options":[{"key":..,"score":..}]}` document becomes [`OptionsSchema::NoSchema`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OptionsSchema {
    #[default]
    NoSchema,
    Options(Vec<ScoredOption>),
}

#[derive(Deserialize, Serialize)]
struct OptionsDocument {
    options: Vec<ScoredOption>,
}

impl OptionsSchema {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return OptionsSchema::NoSchema;
        };

        match serde_json::from_str::<OptionsDocument>(raw) {
            Ok(document)
                if !document.options.is_empty()
                    && document.options.iter().all(|option| option.score.is_finite()) =>
            {
                OptionsSchema::Options(document.options)
            }
            _ => OptionsSchema::NoSchema,
        }
    }

    /// Persisted JSON form, `None` when there is no schema.
    pub fn to_json(&self) -> Option<String> {
        match self {
            OptionsSchema::NoSchema => None,
            OptionsSchema::Options(options) => serde_json::to_string(&OptionsDocument {
                options: options.clone(),
            })
            .ok(),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<f64> {
        match self {
            OptionsSchema::NoSchema => None,
            OptionsSchema::Options(options) => options
                .iter()
                .find(|option| option.key == key)
                .map(|option| option.score),
        }
    }
}

impl Serialize for OptionsSchema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionsSchema::NoSchema => serializer.serialize_none(),
            OptionsSchema::Options(options) => OptionsDocument {
                options: options.clone(),
            }
            .serialize(serializer),
        }
    }
}

/// Rubric row. Reference data shared by every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationItem {
    pub id: EvaluationItemId,
    pub evaluation_type: EvaluationType,
    pub label: String,
    pub section: String,
    pub order: i32,
    pub weight: f64,
    pub max_score: f64,
    pub options_schema: OptionsSchema,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResponse {
    pub id: ResponseId,
    pub evaluation_id: EvaluationId,
    pub item_id: EvaluationItemId,
    pub selected_value: String,
    pub numeric_value: Option<f64>,
    pub score: f64,
    pub comment: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternshipEvaluation {
    pub id: EvaluationId,
    pub internship_id: InternshipId,
    pub supervisor_grade: Option<f64>,
    pub report_grade: Option<f64>,
    pub final_grade: Option<f64>,
    pub supervisor_comments: Option<String>,
    pub report_comments: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub signature_document: Option<DocumentId>,
    pub created_at: DateTime<Utc>,
}

impl InternshipEvaluation {
    /// Empty grading record for a freshly created internship.
    pub fn blank(internship_id: InternshipId, now: DateTime<Utc>) -> Self {
        Self {
            id: EvaluationId::generate(),
            internship_id,
            supervisor_grade: None,
            report_grade: None,
            final_grade: None,
            supervisor_comments: None,
            report_comments: None,
            completed_at: None,
            signature_document: None,
            created_at: now,
        }
    }

    pub fn grade_for(&self, evaluation_type: EvaluationType) -> Option<f64> {
        match evaluation_type {
            EvaluationType::Supervisor => self.supervisor_grade,
            EvaluationType::Report => self.report_grade,
        }
    }
}

/// Uploaded file metadata; the bytes live with the document storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub relative_path: String,
    pub mime_type: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}

/// Join row linking an application to one of its uploaded reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationReport {
    pub id: ReportId,
    pub application_id: ApplicationId,
    pub document_id: DocumentId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_schema_parses_well_formed_documents() {
        let schema = OptionsSchema::parse(Some(
            r#"{"options":[{"key":"excellent","score":7},{"key":"poor","score":2.5}]}"#,
        ));
        assert_eq!(schema.lookup("excellent"), Some(7.0));
        assert_eq!(schema.lookup("poor"), Some(2.5));
        assert_eq!(schema.lookup("EXCELLENT"), None);
    }

    #[test]
    fn options_schema_falls_back_on_malformed_input() {
        for raw in [
            None,
            Some(""),
            Some("not json"),
            Some(r#"{"choices":[]}"#),
            Some(r#"{"options":[]}"#),
            Some(r#"{"options":[{"key":"a"}]}"#),
            Some(r#"[{"key":"a","score":1}]"#),
        ] {
            assert_eq!(OptionsSchema::parse(raw), OptionsSchema::NoSchema, "{raw:?}");
        }
    }

    #[test]
    fn options_schema_json_survives_storage() {
        let schema = OptionsSchema::Options(vec![ScoredOption {
            key: "met".to_string(),
            score: 6.0,
        }]);
        let stored = schema.to_json().expect("schema serializes");
        assert_eq!(OptionsSchema::parse(Some(&stored)), schema);
        assert_eq!(OptionsSchema::NoSchema.to_json(), None);
    }

    #[test]
    fn status_labels_parse_case_insensitively() {
        assert_eq!("supervisor".parse(), Ok(EvaluationType::Supervisor));
        assert_eq!("REPORT".parse(), Ok(EvaluationType::Report));
        assert_eq!(" In_Progress ".parse(), Ok(InternshipStatus::InProgress));
        assert!("archived".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn application_status_only_leaves_pending() {
        assert!(ApplicationStatus::Pending.can_become(ApplicationStatus::Approved));
        assert!(ApplicationStatus::Pending.can_become(ApplicationStatus::Rejected));
        assert!(!ApplicationStatus::Approved.can_become(ApplicationStatus::Rejected));
        assert!(!ApplicationStatus::Pending.can_become(ApplicationStatus::Pending));
    }

    #[test]
    fn internship_status_moves_forward_only() {
        use InternshipStatus::*;
        assert!(InProgress.can_become(PendingEvaluation));
        assert!(InProgress.can_become(Finished));
        assert!(PendingEvaluation.can_become(Finished));
        assert!(!Finished.can_become(InProgress));
        assert!(!PendingEvaluation.can_become(PendingEvaluation));
    }

    #[test]
    fn generated_ids_carry_their_prefix() {
        let id = EvaluationId::generate();
        assert!(id.as_str().starts_with("eva-"));
        assert_ne!(id, EvaluationId::generate());
    }
}
