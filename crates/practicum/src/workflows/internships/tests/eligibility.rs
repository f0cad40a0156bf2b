use super::common::*;
use crate::workflows::internships::domain::{
    ApplicationStatus, OfferId, OfferStatus, RequirementStatus, UserId,
};
use crate::workflows::internships::repository::{ApplicationQuery, PlacementRepository};
use crate::workflows::internships::service::NewInternship;
use crate::workflows::internships::{
    AcademicRequirement, InternshipStatus, OfferTypeId, PlacementError, RepositoryError,
};

#[test]
fn eligible_student_gets_a_hydrated_pending_application() {
    let (service, _, _) = build_service();
    let offer = published_offer(&service, "Backend intern");
    approve_requirement(&service, &student());

    let details = service
        .create_application(&student(), &offer.id)
        .expect("application created");

    assert_eq!(details.application.status, ApplicationStatus::Pending);
    assert_eq!(details.offer.id, offer.id);
    assert_eq!(details.offer_types.len(), 1);
    assert_eq!(details.offer_types[0].id, OfferTypeId::from(PRACTICE_TYPE));
    assert!(details.center.is_none());
}

#[test]
fn missing_offer_is_reported_first() {
    let (service, _, _) = build_service();
    match service.create_application(&student(), &OfferId::from("off-missing")) {
        Err(PlacementError::OfferNotFound(id)) => assert_eq!(id.as_str(), "off-missing"),
        other => panic!("expected missing offer, got {other:?}"),
    }
}

#[test]
fn unpublished_offer_wins_over_duplicate_application() {
    let (service, repository, _) = build_service();
    let offer = published_offer(&service, "Backend intern");
    approve_requirement(&service, &student());
    service
        .create_application(&student(), &offer.id)
        .expect("first application");

    let mut closed = offer.clone();
    closed.status = OfferStatus::Closed;
    repository
        .transaction(|tx| tx.update_offer(&closed))
        .map_err(|err: RepositoryError| err)
        .expect("offer closed");

    match service.create_application(&student(), &offer.id) {
        Err(PlacementError::OfferNotAvailable(_)) => {}
        other => panic!("expected unavailable offer, got {other:?}"),
    }
}

#[test]
fn pending_requirement_blocks_application() {
    let (service, _, _) = build_service();
    let offer = published_offer(&service, "Backend intern");
    service
        .record_academic_requirement(&AcademicRequirement {
            student_id: student(),
            practice_type: OfferTypeId::from(PRACTICE_TYPE),
            status: RequirementStatus::Pending,
        })
        .expect("requirement recorded");

    match service.create_application(&student(), &offer.id) {
        Err(error @ PlacementError::AcademicRequirementsNotMet { .. }) => {
            assert_eq!(
                error.kind().map(|kind| kind.code()),
                Some("ACADEMIC_REQUIREMENTS_NOT_MET")
            );
        }
        other => panic!("expected requirement failure, got {other:?}"),
    }
}

#[test]
fn second_application_to_the_same_offer_is_a_duplicate() {
    let (service, _, _) = build_service();
    let offer = published_offer(&service, "Backend intern");
    approve_requirement(&service, &student());
    service
        .create_application(&student(), &offer.id)
        .expect("first application");

    match service.create_application(&student(), &offer.id) {
        Err(PlacementError::DuplicateApplication { student: who, offer: which }) => {
            assert_eq!(who, student());
            assert_eq!(which, offer.id);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
}

#[test]
fn student_with_internship_in_progress_cannot_apply_again() {
    let (service, _, _) = build_service();
    started_internship(&service);
    let another = published_offer(&service, "Data intern");

    match service.create_application(&student(), &another.id) {
        Err(PlacementError::ActiveInternshipExists(who)) => assert_eq!(who, student()),
        other => panic!("expected active internship, got {other:?}"),
    }
}

#[test]
fn finished_internship_no_longer_blocks_new_applications() {
    let (service, _, _) = build_service();
    let created = started_internship(&service);
    service
        .transition(&created.internship.id, InternshipStatus::Finished)
        .expect("internship finished");

    let another = published_offer(&service, "Data intern");
    let details = service
        .create_application(&student(), &another.id)
        .expect("student may apply again");
    assert_eq!(details.application.status, ApplicationStatus::Pending);
}

#[test]
fn listing_filters_by_status_and_search() {
    let (service, _, _) = build_service();
    approve_requirement(&service, &student());
    let backend = published_offer(&service, "Backend intern");
    let data = published_offer(&service, "Data intern");
    let first = service
        .create_application(&student(), &backend.id)
        .expect("backend application");
    service
        .create_application(&student(), &data.id)
        .expect("data application");
    service
        .set_application_status(&first.application.id, ApplicationStatus::Rejected)
        .expect("rejected");

    let pending = service
        .list_applications(&ApplicationQuery {
            status: Some(ApplicationStatus::Pending),
            ..ApplicationQuery::default()
        })
        .expect("listing");
    assert_eq!(pending.total, 1);
    assert_eq!(pending.items[0].offer.title, "Data intern");

    let by_student = service
        .list_applications(&ApplicationQuery {
            search: Some("ana".to_string()),
            limit: Some(1),
            ..ApplicationQuery::default()
        })
        .expect("listing");
    assert_eq!(by_student.total, 2);
    assert_eq!(by_student.items.len(), 1);
    assert_eq!(by_student.limit, 1);

    let nobody = service
        .list_applications(&ApplicationQuery {
            search: Some("zzz".to_string()),
            ..ApplicationQuery::default()
        })
        .expect("listing");
    assert!(nobody.items.is_empty());
}

#[test]
fn rejected_applications_cannot_become_internships() {
    let (service, _, _) = build_service();
    let offer = published_offer(&service, "Backend intern");
    approve_requirement(&service, &student());
    let details = service
        .create_application(&student(), &offer.id)
        .expect("application");
    service
        .set_application_status(&details.application.id, ApplicationStatus::Rejected)
        .expect("rejected");

    match service.set_application_status(&details.application.id, ApplicationStatus::Approved) {
        Err(PlacementError::InvalidTransition { .. }) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }

    match service.create_internship(NewInternship {
        application_id: details.application.id.clone(),
        supervisor_id: UserId::from(SUPERVISOR),
        coordinator_id: UserId::from(COORDINATOR),
    }) {
        Err(PlacementError::ApplicationNotApproved(id)) => {
            assert_eq!(id, details.application.id)
        }
        other => panic!("expected unapproved application, got {other:?}"),
    }
}

#[test]
fn offers_reject_more_than_two_practice_types() {
    let (service, _, _) = build_service();
    let mut offer = new_offer("Crowded intern", OfferStatus::Published);
    offer.offer_type_ids = vec![
        OfferTypeId::from("oft-a"),
        OfferTypeId::from("oft-b"),
        OfferTypeId::from("oft-c"),
    ];
    assert!(matches!(
        service.create_offer(offer),
        Err(PlacementError::InvalidOffer(_))
    ));

    let mut offer = new_offer("Ghost intern", OfferStatus::Published);
    offer.offer_type_ids = vec![OfferTypeId::from("oft-unknown")];
    assert!(matches!(
        service.create_offer(offer),
        Err(PlacementError::InvalidOffer(_))
    ));
}

#[test]
fn offers_with_applications_cannot_be_deleted() {
    let (service, _, _) = build_service();
    let untouched = published_offer(&service, "Unclaimed intern");
    service
        .delete_offer(&untouched.id)
        .expect("offer without applications deletes");
    assert!(matches!(
        service.delete_offer(&untouched.id),
        Err(PlacementError::OfferNotFound(_))
    ));

    let application = approved_application(&service, "Claimed intern");
    match service.delete_offer(&application.offer_id) {
        Err(error @ PlacementError::DependentRecords(_)) => {
            assert_eq!(
                error.kind().map(|kind| kind.code()),
                Some("DEPENDENT_RECORDS")
            );
        }
        other => panic!("expected dependent records, got {other:?}"),
    }
}
