use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use super::PlacementService;
use crate::workflows::internships::domain::{
    CenterId, Offer, OfferId, OfferStatus, OfferTypeId, MAX_OFFER_TYPES,
};
use crate::workflows::internships::error::PlacementError;
use crate::workflows::internships::repository::{DocumentFiles, PlacementRepository};

/// Payload for publishing an offer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOffer {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub center_id: Option<CenterId>,
    #[serde(default)]
    pub offer_type_ids: Vec<OfferTypeId>,
    #[serde(default)]
    pub status: Option<OfferStatus>,
}

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    /// Persist an offer together with its ordered practice types.
    pub fn create_offer(&self, new_offer: NewOffer) -> Result<Offer, PlacementError> {
        let title = new_offer.title.trim();
        if title.is_empty() {
            return Err(PlacementError::InvalidOffer(
                "offer title is required".to_string(),
            ));
        }
        if new_offer.offer_type_ids.len() > MAX_OFFER_TYPES {
            return Err(PlacementError::InvalidOffer(format!(
                "an offer carries at most {MAX_OFFER_TYPES} practice types"
            )));
        }
        let mut seen = HashSet::new();
        if !new_offer.offer_type_ids.iter().all(|id| seen.insert(id)) {
            return Err(PlacementError::InvalidOffer(
                "practice types must be distinct".to_string(),
            ));
        }

        let offer = Offer {
            id: OfferId::generate(),
            title: title.to_string(),
            description: new_offer.description.trim().to_string(),
            deadline: new_offer.deadline,
            status: new_offer.status.unwrap_or(OfferStatus::Published),
            center_id: new_offer.center_id,
            created_at: Utc::now(),
        };

        self.repository.transaction(|tx| {
            if let Some(center_id) = &offer.center_id {
                if tx.center(center_id)?.is_none() {
                    return Err(PlacementError::CenterNotFound(center_id.clone()));
                }
            }
            for offer_type in &new_offer.offer_type_ids {
                if tx.offer_type(offer_type)?.is_none() {
                    return Err(PlacementError::InvalidOffer(format!(
                        "practice type {offer_type} does not exist"
                    )));
                }
            }
            tx.insert_offer(&offer, &new_offer.offer_type_ids)?;
            Ok(())
        })?;

        info!(offer_id = %offer.id, status = %offer.status, "offer created");
        Ok(offer)
    }

    /// Close, fill or republish an offer. Existing applications are left untouched.
    pub fn set_offer_status(
        &self,
        offer_id: &OfferId,
        status: OfferStatus,
    ) -> Result<Offer, PlacementError> {
        let offer = self.repository.transaction(|tx| {
            let mut offer = tx
                .offer(offer_id)?
                .ok_or_else(|| PlacementError::OfferNotFound(offer_id.clone()))?;
            offer.status = status;
            tx.update_offer(&offer)?;
            Ok::<_, PlacementError>(offer)
        })?;

        info!(offer_id = %offer.id, status = %offer.status, "offer status changed");
        Ok(offer)
    }

    /// Remove an offer nobody has applied to yet.
    pub fn delete_offer(&self, offer_id: &OfferId) -> Result<Offer, PlacementError> {
        let offer = self.repository.transaction(|tx| {
            let offer = tx
                .offer(offer_id)?
                .ok_or_else(|| PlacementError::OfferNotFound(offer_id.clone()))?;

            let applications = tx.count_applications_for_offer(offer_id)?;
            if applications > 0 {
                return Err(PlacementError::DependentRecords(format!(
                    "offer {offer_id} still has {applications} application(s)"
                )));
            }

            tx.delete_offer(offer_id)?;
            Ok(offer)
        })?;

        info!(offer_id = %offer.id, "offer deleted");
        Ok(offer)
    }
}
