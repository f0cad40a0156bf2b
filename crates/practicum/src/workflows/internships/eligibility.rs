//! Admission rules a student must pass before an application row exists.

use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, OfferId, OfferStatus, RequirementStatus,
    UserId,
};
use super::error::PlacementError;
use super::repository::{PlacementTransaction, RepositoryError};

/// Run the admission checks in order and insert a `pending` application.
///
/// Must be called inside the transaction that commits the insert, so the
/// duplicate check and the write cannot interleave with another submission.
pub(crate) fn admit(
    tx: &mut dyn PlacementTransaction,
    student: &UserId,
    offer_id: &OfferId,
    now: DateTime<Utc>,
) -> Result<Application, PlacementError> {
    let offer = tx
        .offer(offer_id)?
        .ok_or_else(|| PlacementError::OfferNotFound(offer_id.clone()))?;

    if offer.status != OfferStatus::Published {
        return Err(PlacementError::OfferNotAvailable(offer.id));
    }

    if tx.has_active_internship(student)? {
        return Err(PlacementError::ActiveInternshipExists(student.clone()));
    }

    // Only the first attached practice type is checked.
    if let Some(practice_type) = tx.offer_types_for(&offer.id)?.into_iter().next() {
        let approved = tx
            .academic_requirement(student, &practice_type.id)?
            .is_some_and(|requirement| requirement.status == RequirementStatus::Approved);
        if !approved {
            return Err(PlacementError::AcademicRequirementsNotMet {
                student: student.clone(),
                practice_type: practice_type.id,
            });
        }
    }

    let duplicate = || PlacementError::DuplicateApplication {
        student: student.clone(),
        offer: offer.id.clone(),
    };

    if tx.application_for(student, &offer.id)?.is_some() {
        return Err(duplicate());
    }

    let application = Application {
        id: ApplicationId::generate(),
        student_id: student.clone(),
        offer_id: offer.id.clone(),
        status: ApplicationStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    match tx.insert_application(&application) {
        Ok(()) => Ok(application),
        Err(RepositoryError::Conflict) => Err(duplicate()),
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::internships::domain::{
        AcademicRequirement, Offer, OfferType, OfferTypeId,
    };
    use crate::workflows::internships::memory::MemoryRepository;
    use crate::workflows::internships::repository::PlacementRepository;
    use chrono::NaiveDate;

    fn offer(status: OfferStatus) -> Offer {
        Offer {
            id: OfferId::from("off-1"),
            title: "Data intern".to_string(),
            description: "Pipelines".to_string(),
            deadline: NaiveDate::from_ymd_opt(2026, 11, 30).expect("valid date"),
            status,
            center_id: None,
            created_at: Utc::now(),
        }
    }

    fn repository_with(offer: Offer, types: &[&str]) -> MemoryRepository {
        let repository = MemoryRepository::new();
        repository
            .transaction(|tx| {
                let mut ids = Vec::new();
                for id in types {
                    let offer_type = OfferType {
                        id: OfferTypeId::from(*id),
                        name: id.to_string(),
                    };
                    tx.save_offer_type(&offer_type)?;
                    ids.push(offer_type.id);
                }
                tx.insert_offer(&offer, &ids)
            })
            .map_err(|err: RepositoryError| err)
            .expect("seed");
        repository
    }

    fn admit_student(repository: &MemoryRepository) -> Result<Application, PlacementError> {
        repository.transaction(|tx| {
            admit(
                tx,
                &UserId::from("stu-1"),
                &OfferId::from("off-1"),
                Utc::now(),
            )
        })
    }

    #[test]
    fn closed_offers_reject_before_anything_else() {
        let repository = repository_with(offer(OfferStatus::Closed), &["oft-a"]);
        assert!(matches!(
            admit_student(&repository),
            Err(PlacementError::OfferNotAvailable(_))
        ));
    }

    #[test]
    fn only_the_first_practice_type_is_consulted() {
        let repository = repository_with(offer(OfferStatus::Published), &["oft-a", "oft-b"]);
        repository
            .transaction(|tx| {
                tx.save_academic_requirement(&AcademicRequirement {
                    student_id: UserId::from("stu-1"),
                    practice_type: OfferTypeId::from("oft-b"),
                    status: RequirementStatus::Approved,
                })
            })
            .map_err(|err: RepositoryError| err)
            .expect("requirement");

        match admit_student(&repository) {
            Err(PlacementError::AcademicRequirementsNotMet { practice_type, .. }) => {
                assert_eq!(practice_type, OfferTypeId::from("oft-a"));
            }
            other => panic!("expected missing requirement, got {other:?}"),
        }
    }

    #[test]
    fn untyped_offers_skip_the_requirement_check() {
        let repository = repository_with(offer(OfferStatus::Published), &[]);
        let application = admit_student(&repository).expect("admitted");
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert!(matches!(
            admit_student(&repository),
            Err(PlacementError::DuplicateApplication { .. })
        ));
    }
}
