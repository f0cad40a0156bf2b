use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::internships::domain::{
    AcademicRequirement, Application, ApplicationStatus, Offer, OfferStatus, OfferType,
    OfferTypeId, Person, PersonRole, RequirementStatus, UserId,
};
use crate::workflows::internships::repository::{
    DocumentFiles, PlacementRepository, PlacementTransaction, RepositoryError,
};
use crate::workflows::internships::rubric::{default_rubric, seed_rubric};
use crate::workflows::internships::service::{
    InternshipCreated, NewDocument, NewInternship, NewOffer, PlacementService,
};
use crate::workflows::internships::MemoryRepository;

pub(super) const STUDENT: &str = "stu-ana";
pub(super) const SUPERVISOR: &str = "sup-bruno";
pub(super) const COORDINATOR: &str = "coo-carla";
pub(super) const PRACTICE_TYPE: &str = "oft-professional";

pub(super) type TestService = PlacementService<MemoryRepository, RecordingFiles>;

/// Records removed paths; optionally fails every removal.
#[derive(Default)]
pub(super) struct RecordingFiles {
    removed: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingFiles {
    pub(super) fn failing() -> Self {
        Self {
            removed: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(super) fn removed(&self) -> Vec<String> {
        self.removed.lock().expect("files mutex poisoned").clone()
    }
}

impl DocumentFiles for RecordingFiles {
    fn remove(&self, relative_path: &str) -> std::io::Result<()> {
        if self.fail {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            ));
        }
        self.removed
            .lock()
            .expect("files mutex poisoned")
            .push(relative_path.to_string());
        Ok(())
    }
}

pub(super) struct UnavailableRepository;

impl PlacementRepository for UnavailableRepository {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn PlacementTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>, Arc<RecordingFiles>) {
    build_service_with(RecordingFiles::default())
}

pub(super) fn build_service_with(
    files: RecordingFiles,
) -> (TestService, Arc<MemoryRepository>, Arc<RecordingFiles>) {
    let repository = Arc::new(MemoryRepository::new());
    let files = Arc::new(files);
    let items = default_rubric().expect("default rubric parses");
    seed_rubric(repository.as_ref(), &items).expect("rubric seeds");

    let service = PlacementService::new(repository.clone(), files.clone());
    for (id, name, role) in [
        (STUDENT, "Ana Student", PersonRole::Student),
        (SUPERVISOR, "Bruno Supervisor", PersonRole::Supervisor),
        (COORDINATOR, "Carla Coordinator", PersonRole::Coordinator),
    ] {
        service
            .register_person(&Person {
                id: UserId::from(id),
                name: name.to_string(),
                email: format!("{id}@campus.test"),
                role,
            })
            .expect("person registers");
    }
    service
        .register_offer_type(&OfferType {
            id: OfferTypeId::from(PRACTICE_TYPE),
            name: "Professional practice".to_string(),
        })
        .expect("offer type registers");

    (service, repository, files)
}

pub(super) fn student() -> UserId {
    UserId::from(STUDENT)
}

pub(super) fn new_offer(title: &str, status: OfferStatus) -> NewOffer {
    NewOffer {
        title: title.to_string(),
        description: "Build and operate internal services".to_string(),
        deadline: NaiveDate::from_ymd_opt(2026, 12, 15).expect("valid date"),
        center_id: None,
        offer_type_ids: vec![OfferTypeId::from(PRACTICE_TYPE)],
        status: Some(status),
    }
}

pub(super) fn published_offer(service: &TestService, title: &str) -> Offer {
    service
        .create_offer(new_offer(title, OfferStatus::Published))
        .expect("offer created")
}

pub(super) fn approve_requirement(service: &TestService, student: &UserId) {
    service
        .record_academic_requirement(&AcademicRequirement {
            student_id: student.clone(),
            practice_type: OfferTypeId::from(PRACTICE_TYPE),
            status: RequirementStatus::Approved,
        })
        .expect("requirement recorded");
}

/// Eligible student applies and the application is approved.
pub(super) fn approved_application(service: &TestService, title: &str) -> Application {
    let offer = published_offer(service, title);
    approve_requirement(service, &student());
    let details = service
        .create_application(&student(), &offer.id)
        .expect("application created");
    service
        .set_application_status(&details.application.id, ApplicationStatus::Approved)
        .expect("application approved")
}

pub(super) fn started_internship(service: &TestService) -> InternshipCreated {
    let application = approved_application(service, "Platform intern");
    service
        .create_internship(NewInternship {
            application_id: application.id,
            supervisor_id: UserId::from(SUPERVISOR),
            coordinator_id: UserId::from(COORDINATOR),
        })
        .expect("internship created")
}

pub(super) fn upload(name: &str, relative_path: &str) -> NewDocument {
    NewDocument {
        name: name.to_string(),
        relative_path: relative_path.to_string(),
        mime_type: None,
        uploaded_by: UserId::from(COORDINATOR),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
