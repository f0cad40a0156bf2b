//! Placement service: every operation is one repository transaction.

mod applications;
mod directory;
mod documents;
mod evaluations;
mod lifecycle;
mod offers;

use std::sync::Arc;

use tracing::warn;

use super::domain::Document;
use super::repository::{DocumentFiles, PlacementRepository};

pub use documents::{DocumentOwner, NewDocument};
pub use evaluations::{Answer, CommentUpdate, EvaluationPatch, EvaluationView};
pub use lifecycle::{InternshipCreated, NewInternship};
pub use offers::NewOffer;

/// Service composing the placement store with the collaborator that owns document bytes.
pub struct PlacementService<R, F> {
    repository: Arc<R>,
    files: Arc<F>,
}

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    pub fn new(repository: Arc<R>, files: Arc<F>) -> Self {
        Self { repository, files }
    }

    /// Drop the bytes behind a document whose row was already committed away.
    fn discard_file(&self, document: &Document) {
        if let Err(err) = self.files.remove(&document.relative_path) {
            warn!(
                document_id = %document.id,
                path = %document.relative_path,
                error = %err,
                "document row removed but backing file could not be deleted"
            );
        }
    }
}
