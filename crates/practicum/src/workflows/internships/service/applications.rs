use chrono::Utc;
use tracing::info;

use super::PlacementService;
use crate::workflows::internships::domain::{
    Application, ApplicationDetails, ApplicationId, ApplicationStatus, OfferId, UserId,
};
use crate::workflows::internships::eligibility;
use crate::workflows::internships::error::PlacementError;
use crate::workflows::internships::repository::{
    ApplicationQuery, DocumentFiles, Page, PlacementRepository, PlacementTransaction,
};

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    /// Admit a student to an offer, returning the new `pending` application with its offer graph.
    pub fn create_application(
        &self,
        student_id: &UserId,
        offer_id: &OfferId,
    ) -> Result<ApplicationDetails, PlacementError> {
        let details = self.repository.transaction(|tx| {
            let application = eligibility::admit(tx, student_id, offer_id, Utc::now())?;
            hydrate(&*tx, application)
        })?;

        info!(
            application_id = %details.application.id,
            student_id = %student_id,
            offer_id = %offer_id,
            "application created"
        );
        Ok(details)
    }

    pub fn get_application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationDetails, PlacementError> {
        self.repository.transaction(|tx| {
            let application = tx
                .application(application_id)?
                .ok_or_else(|| PlacementError::ApplicationNotFound(application_id.clone()))?;
            hydrate(&*tx, application)
        })
    }

    /// Record the reviewer's decision; applications leave `pending` exactly once.
    pub fn set_application_status(
        &self,
        application_id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, PlacementError> {
        let application = self.repository.transaction(|tx| {
            let mut application = tx
                .application(application_id)?
                .ok_or_else(|| PlacementError::ApplicationNotFound(application_id.clone()))?;

            if !application.status.can_become(status) {
                return Err(PlacementError::InvalidTransition {
                    from: application.status.label().to_string(),
                    to: status.label().to_string(),
                });
            }

            application.status = status;
            application.updated_at = Utc::now();
            tx.update_application(&application)?;
            Ok(application)
        })?;

        info!(
            application_id = %application.id,
            status = %application.status,
            "application reviewed"
        );
        Ok(application)
    }

    pub fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Page<ApplicationDetails>, PlacementError> {
        self.repository.transaction(|tx| {
            let page = tx.list_applications(query)?;
            let items = page
                .items
                .into_iter()
                .map(|application| hydrate(&*tx, application))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                items,
                total: page.total,
                offset: page.offset,
                limit: page.limit,
            })
        })
    }
}

fn hydrate(
    tx: &dyn PlacementTransaction,
    application: Application,
) -> Result<ApplicationDetails, PlacementError> {
    let offer = tx
        .offer(&application.offer_id)?
        .ok_or_else(|| PlacementError::OfferNotFound(application.offer_id.clone()))?;
    let offer_types = tx.offer_types_for(&offer.id)?;
    let center = match &offer.center_id {
        Some(center_id) => tx.center(center_id)?,
        None => None,
    };

    Ok(ApplicationDetails {
        application,
        offer,
        offer_types,
        center,
    })
}
