//! Reference data the workflow reads but never derives: people, practice types,
//! centers and academic standing.

use super::PlacementService;
use crate::workflows::internships::domain::{
    AcademicRequirement, InternshipCenter, OfferType, Person,
};
use crate::workflows::internships::error::PlacementError;
use crate::workflows::internships::repository::{DocumentFiles, PlacementRepository};

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    pub fn register_person(&self, person: &Person) -> Result<(), PlacementError> {
        self.repository.transaction(|tx| Ok(tx.save_person(person)?))
    }

    pub fn register_offer_type(&self, offer_type: &OfferType) -> Result<(), PlacementError> {
        self.repository
            .transaction(|tx| Ok(tx.save_offer_type(offer_type)?))
    }

    pub fn register_center(&self, center: &InternshipCenter) -> Result<(), PlacementError> {
        self.repository.transaction(|tx| Ok(tx.save_center(center)?))
    }

    pub fn record_academic_requirement(
        &self,
        requirement: &AcademicRequirement,
    ) -> Result<(), PlacementError> {
        self.repository
            .transaction(|tx| Ok(tx.save_academic_requirement(requirement)?))
    }
}
