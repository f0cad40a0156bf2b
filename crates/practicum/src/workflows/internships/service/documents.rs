use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::PlacementService;
use crate::workflows::internships::domain::{
    ApplicationId, ApplicationReport, CenterId, Document, DocumentId, EvaluationId, InternshipId,
    ReportId, UserId,
};
use crate::workflows::internships::error::PlacementError;
use crate::workflows::internships::repository::{
    DocumentFiles, PlacementRepository, PlacementTransaction,
};

/// Entity slot a single document can be attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOwner {
    InternshipFinalReport(InternshipId),
    CenterConvention(CenterId),
    EvaluationSignature(EvaluationId),
}

/// Metadata for a file the caller already stored under the upload root.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDocument {
    pub name: String,
    pub relative_path: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub uploaded_by: UserId,
}

impl NewDocument {
    /// Validate the metadata and mint the row. A missing MIME type is guessed from the name.
    pub(crate) fn into_document(self, now: DateTime<Utc>) -> Result<Document, PlacementError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(PlacementError::InvalidDocument(
                "document name is required".to_string(),
            ));
        }

        let relative_path = self.relative_path.trim();
        let escapes_root = Path::new(relative_path)
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if relative_path.is_empty() || escapes_root {
            return Err(PlacementError::InvalidDocument(format!(
                "'{relative_path}' is not a path relative to the upload root"
            )));
        }

        let mime_type = match self.mime_type.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw.parse::<mime::Mime>().map_err(|err| {
                PlacementError::InvalidDocument(format!("mime type '{raw}': {err}"))
            })?,
            _ => mime_guess::from_path(name).first_or_octet_stream(),
        };

        Ok(Document {
            id: DocumentId::generate(),
            name: name.to_string(),
            relative_path: relative_path.to_string(),
            mime_type: mime_type.to_string(),
            uploaded_by: self.uploaded_by,
            uploaded_at: now,
        })
    }
}

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    /// Point `owner` at a new document, deleting whatever it referenced before.
    pub fn attach_document(
        &self,
        owner: &DocumentOwner,
        new_document: NewDocument,
    ) -> Result<Document, PlacementError> {
        let document = new_document.into_document(Utc::now())?;

        let previous = self.repository.transaction(|tx| {
            tx.insert_document(&document)?;
            let previous = swap_reference(tx, owner, Some(document.id.clone()))?;
            remove_row(tx, previous)
        })?;

        info!(document_id = %document.id, owner = ?owner, "document attached");
        if let Some(previous) = previous {
            self.discard_file(&previous);
        }
        Ok(document)
    }

    /// Clear `owner`'s document slot, returning the removed document.
    pub fn detach_document(
        &self,
        owner: &DocumentOwner,
    ) -> Result<Option<Document>, PlacementError> {
        let removed = self.repository.transaction(|tx| {
            let previous = swap_reference(tx, owner, None)?;
            remove_row(tx, previous)
        })?;

        if let Some(document) = &removed {
            info!(document_id = %document.id, owner = ?owner, "document detached");
            self.discard_file(document);
        }
        Ok(removed)
    }

    /// Store an uploaded report for an application.
    pub fn create_report(
        &self,
        application_id: &ApplicationId,
        new_document: NewDocument,
    ) -> Result<ApplicationReport, PlacementError> {
        let now = Utc::now();
        let document = new_document.into_document(now)?;

        let report = self.repository.transaction(|tx| {
            if tx.application(application_id)?.is_none() {
                return Err(PlacementError::ApplicationNotFound(application_id.clone()));
            }

            tx.insert_document(&document)?;
            let report = ApplicationReport {
                id: ReportId::generate(),
                application_id: application_id.clone(),
                document_id: document.id.clone(),
                created_at: now,
            };
            tx.insert_report(&report)?;
            Ok(report)
        })?;

        info!(report_id = %report.id, application_id = %application_id, "report uploaded");
        Ok(report)
    }

    /// Reports uploaded for an application, oldest first.
    pub fn list_reports(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationReport>, PlacementError> {
        self.repository.transaction(|tx| {
            if tx.application(application_id)?.is_none() {
                return Err(PlacementError::ApplicationNotFound(application_id.clone()));
            }
            Ok(tx.reports_for(application_id)?)
        })
    }

    pub fn delete_report(&self, report_id: &ReportId) -> Result<ApplicationReport, PlacementError> {
        let (report, document) = self.repository.transaction(|tx| {
            let report = tx
                .report(report_id)?
                .ok_or_else(|| PlacementError::ReportNotFound(report_id.clone()))?;
            tx.delete_report(&report.id)?;
            let document = remove_row(tx, Some(report.document_id.clone()))?;
            Ok::<_, PlacementError>((report, document))
        })?;

        info!(report_id = %report.id, "report deleted");
        if let Some(document) = document {
            self.discard_file(&document);
        }
        Ok(report)
    }
}

/// Replace the owner's document reference, returning the one it held before.
fn swap_reference(
    tx: &mut dyn PlacementTransaction,
    owner: &DocumentOwner,
    next: Option<DocumentId>,
) -> Result<Option<DocumentId>, PlacementError> {
    match owner {
        DocumentOwner::InternshipFinalReport(id) => {
            let mut internship = tx
                .internship(id)?
                .ok_or_else(|| PlacementError::InternshipNotFound(id.clone()))?;
            let previous = std::mem::replace(&mut internship.final_report, next);
            tx.update_internship(&internship)?;
            Ok(previous)
        }
        DocumentOwner::CenterConvention(id) => {
            let center = tx
                .center(id)?
                .ok_or_else(|| PlacementError::CenterNotFound(id.clone()))?;
            tx.set_center_convention(id, next.as_ref())?;
            Ok(center.convention_document)
        }
        DocumentOwner::EvaluationSignature(id) => {
            let mut evaluation = tx
                .evaluation(id)?
                .ok_or_else(|| PlacementError::EvaluationNotFound(id.clone()))?;
            let previous = std::mem::replace(&mut evaluation.signature_document, next);
            tx.update_evaluation(&evaluation)?;
            Ok(previous)
        }
    }
}

fn remove_row(
    tx: &mut dyn PlacementTransaction,
    document_id: Option<DocumentId>,
) -> Result<Option<Document>, PlacementError> {
    let Some(document_id) = document_id else {
        return Ok(None);
    };
    let document = tx.document(&document_id)?;
    tx.delete_document(&document_id)?;
    Ok(document)
}
