use std::collections::HashMap;
use std::sync::Mutex;

use super::domain::{
    AcademicRequirement, Application, ApplicationId, ApplicationReport, CenterId, Document,
    DocumentId, EvaluationId, EvaluationItem, EvaluationItemId, EvaluationResponse,
    EvaluationType, Internship, InternshipCenter, InternshipEvaluation, InternshipId,
    InternshipStatus, Offer, OfferId, OfferType, OfferTypeId, Person, ReportId, UserId,
};
use super::repository::{
    ApplicationQuery, Page, PlacementRepository, PlacementTransaction, RepositoryError,
};

/// Process-local store. A transaction reads the committed tables directly; its first
/// write takes a staged copy, which is swapped in only when the unit of work succeeds.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlacementRepository for MemoryRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn PlacementTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut committed = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))?;

        let mut unit = Staged::new(&committed);
        let outcome = work(&mut unit)?;
        if let Some(staged) = unit.staged {
            *committed = staged;
        }
        Ok(outcome)
    }
}

/// Copy-on-write view over the committed tables.
struct Staged<'a> {
    committed: &'a Tables,
    staged: Option<Tables>,
}

impl<'a> Staged<'a> {
    fn new(committed: &'a Tables) -> Self {
        Self {
            committed,
            staged: None,
        }
    }

    fn read(&self) -> &Tables {
        self.staged.as_ref().unwrap_or(self.committed)
    }

    fn write(&mut self) -> &mut Tables {
        let committed = self.committed;
        self.staged.get_or_insert_with(|| committed.clone())
    }
}

macro_rules! delegate_to_tables {
    (
        read { $(fn $read:ident(&self $(, $rarg:ident: $rty:ty)*) -> $rret:ty;)* }
        write { $(fn $write:ident(&mut self $(, $warg:ident: $wty:ty)*) -> $wret:ty;)* }
    ) => {
        impl PlacementTransaction for Staged<'_> {
            $(fn $read(&self $(, $rarg: $rty)*) -> $rret {
                self.read().$read($($rarg),*)
            })*
            $(fn $write(&mut self $(, $warg: $wty)*) -> $wret {
                self.write().$write($($warg),*)
            })*
        }
    };
}

delegate_to_tables! {
    read {
        fn person(&self, id: &UserId) -> Result<Option<Person>, RepositoryError>;
        fn offer_type(&self, id: &OfferTypeId) -> Result<Option<OfferType>, RepositoryError>;
        fn center(&self, id: &CenterId) -> Result<Option<InternshipCenter>, RepositoryError>;
        fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError>;
        fn offer_types_for(&self, offer: &OfferId) -> Result<Vec<OfferType>, RepositoryError>;
        fn academic_requirement(
            &self,
            student: &UserId,
            practice_type: &OfferTypeId
        ) -> Result<Option<AcademicRequirement>, RepositoryError>;
        fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
        fn application_for(
            &self,
            student: &UserId,
            offer: &OfferId
        ) -> Result<Option<Application>, RepositoryError>;
        fn count_applications_for_offer(&self, offer: &OfferId) -> Result<usize, RepositoryError>;
        fn list_applications(
            &self,
            query: &ApplicationQuery
        ) -> Result<Page<Application>, RepositoryError>;
        fn internship(&self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError>;
        fn internship_for_application(
            &self,
            application: &ApplicationId
        ) -> Result<Option<Internship>, RepositoryError>;
        fn has_active_internship(&self, student: &UserId) -> Result<bool, RepositoryError>;
        fn evaluation(
            &self,
            id: &EvaluationId
        ) -> Result<Option<InternshipEvaluation>, RepositoryError>;
        fn evaluation_for_internship(
            &self,
            internship: &InternshipId
        ) -> Result<Option<InternshipEvaluation>, RepositoryError>;
        fn evaluation_items(&self) -> Result<Vec<EvaluationItem>, RepositoryError>;
        fn response(
            &self,
            evaluation: &EvaluationId,
            item: &EvaluationItemId
        ) -> Result<Option<EvaluationResponse>, RepositoryError>;
        fn responses_for(
            &self,
            evaluation: &EvaluationId,
            evaluation_type: Option<EvaluationType>
        ) -> Result<Vec<EvaluationResponse>, RepositoryError>;
        fn document(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError>;
        fn report(&self, id: &ReportId) -> Result<Option<ApplicationReport>, RepositoryError>;
        fn reports_for(
            &self,
            application: &ApplicationId
        ) -> Result<Vec<ApplicationReport>, RepositoryError>;
    }
    write {
        fn save_person(&mut self, person: &Person) -> Result<(), RepositoryError>;
        fn save_offer_type(&mut self, offer_type: &OfferType) -> Result<(), RepositoryError>;
        fn save_center(&mut self, center: &InternshipCenter) -> Result<(), RepositoryError>;
        fn set_center_convention(
            &mut self,
            id: &CenterId,
            document: Option<&DocumentId>
        ) -> Result<(), RepositoryError>;
        fn insert_offer(
            &mut self,
            offer: &Offer,
            offer_types: &[OfferTypeId]
        ) -> Result<(), RepositoryError>;
        fn update_offer(&mut self, offer: &Offer) -> Result<(), RepositoryError>;
        fn delete_offer(&mut self, id: &OfferId) -> Result<bool, RepositoryError>;
        fn save_academic_requirement(
            &mut self,
            requirement: &AcademicRequirement
        ) -> Result<(), RepositoryError>;
        fn insert_application(&mut self, application: &Application) -> Result<(), RepositoryError>;
        fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError>;
        fn insert_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError>;
        fn update_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError>;
        fn insert_evaluation(
            &mut self,
            evaluation: &InternshipEvaluation
        ) -> Result<(), RepositoryError>;
        fn update_evaluation(
            &mut self,
            evaluation: &InternshipEvaluation
        ) -> Result<(), RepositoryError>;
        fn delete_evaluation(&mut self, id: &EvaluationId) -> Result<bool, RepositoryError>;
        fn save_evaluation_item(&mut self, item: &EvaluationItem) -> Result<(), RepositoryError>;
        fn upsert_response(&mut self, response: &EvaluationResponse) -> Result<(), RepositoryError>;
        fn delete_responses(&mut self, evaluation: &EvaluationId) -> Result<usize, RepositoryError>;
        fn insert_document(&mut self, document: &Document) -> Result<(), RepositoryError>;
        fn delete_document(&mut self, id: &DocumentId) -> Result<bool, RepositoryError>;
        fn insert_report(&mut self, report: &ApplicationReport) -> Result<(), RepositoryError>;
        fn delete_report(&mut self, id: &ReportId) -> Result<bool, RepositoryError>;
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    people: HashMap<UserId, Person>,
    offer_types: HashMap<OfferTypeId, OfferType>,
    centers: HashMap<CenterId, InternshipCenter>,
    offers: HashMap<OfferId, Offer>,
    offer_type_links: Vec<(OfferId, OfferTypeId)>,
    requirements: HashMap<(UserId, OfferTypeId), AcademicRequirement>,
    applications: HashMap<ApplicationId, Application>,
    internships: HashMap<InternshipId, Internship>,
    evaluations: HashMap<EvaluationId, InternshipEvaluation>,
    items: HashMap<EvaluationItemId, EvaluationItem>,
    responses: HashMap<(EvaluationId, EvaluationItemId), EvaluationResponse>,
    documents: HashMap<DocumentId, Document>,
    reports: HashMap<ReportId, ApplicationReport>,
}

impl Tables {
    fn item_order(&self, item: &EvaluationItemId) -> (i32, EvaluationItemId) {
        let order = self.items.get(item).map(|item| item.order).unwrap_or(i32::MAX);
        (order, item.clone())
    }

    fn matches(&self, application: &Application, query: &ApplicationQuery) -> bool {
        if query
            .status
            .is_some_and(|status| status != application.status)
        {
            return false;
        }

        if let Some(offer_type) = &query.offer_type_id {
            let linked = self
                .offer_type_links
                .iter()
                .any(|(offer, linked)| offer == &application.offer_id && linked == offer_type);
            if !linked {
                return false;
            }
        }

        match query.needle() {
            None => true,
            Some(needle) => {
                let offer_title = self
                    .offers
                    .get(&application.offer_id)
                    .map(|offer| offer.title.to_lowercase())
                    .unwrap_or_default();
                let student_name = self
                    .people
                    .get(&application.student_id)
                    .map(|person| person.name.to_lowercase())
                    .unwrap_or_default();
                offer_title.contains(&needle) || student_name.contains(&needle)
            }
        }
    }
}

fn replace_existing<K, V>(map: &mut HashMap<K, V>, key: K, value: V) -> Result<(), RepositoryError>
where
    K: std::hash::Hash + Eq,
{
    match map.get_mut(&key) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(RepositoryError::NotFound),
    }
}

impl PlacementTransaction for Tables {
    fn person(&self, id: &UserId) -> Result<Option<Person>, RepositoryError> {
        Ok(self.people.get(id).cloned())
    }

    fn save_person(&mut self, person: &Person) -> Result<(), RepositoryError> {
        self.people.insert(person.id.clone(), person.clone());
        Ok(())
    }

    fn offer_type(&self, id: &OfferTypeId) -> Result<Option<OfferType>, RepositoryError> {
        Ok(self.offer_types.get(id).cloned())
    }

    fn save_offer_type(&mut self, offer_type: &OfferType) -> Result<(), RepositoryError> {
        self.offer_types
            .insert(offer_type.id.clone(), offer_type.clone());
        Ok(())
    }

    fn center(&self, id: &CenterId) -> Result<Option<InternshipCenter>, RepositoryError> {
        Ok(self.centers.get(id).cloned())
    }

    fn save_center(&mut self, center: &InternshipCenter) -> Result<(), RepositoryError> {
        let convention_document = self
            .centers
            .get(&center.id)
            .and_then(|stored| stored.convention_document.clone());
        self.centers.insert(
            center.id.clone(),
            InternshipCenter {
                convention_document,
                ..center.clone()
            },
        );
        Ok(())
    }

    fn set_center_convention(
        &mut self,
        id: &CenterId,
        document: Option<&DocumentId>,
    ) -> Result<(), RepositoryError> {
        if document.is_some_and(|document| !self.documents.contains_key(document)) {
            return Err(RepositoryError::NotFound);
        }
        let center = self.centers.get_mut(id).ok_or(RepositoryError::NotFound)?;
        center.convention_document = document.cloned();
        Ok(())
    }

    fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.offers.get(id).cloned())
    }

    fn offer_types_for(&self, offer: &OfferId) -> Result<Vec<OfferType>, RepositoryError> {
        Ok(self
            .offer_type_links
            .iter()
            .filter(|(linked, _)| linked == offer)
            .filter_map(|(_, offer_type)| self.offer_types.get(offer_type).cloned())
            .collect())
    }

    fn insert_offer(
        &mut self,
        offer: &Offer,
        offer_types: &[OfferTypeId],
    ) -> Result<(), RepositoryError> {
        if self.offers.contains_key(&offer.id) {
            return Err(RepositoryError::Conflict);
        }
        if offer_types
            .iter()
            .any(|offer_type| !self.offer_types.contains_key(offer_type))
        {
            return Err(RepositoryError::NotFound);
        }

        self.offers.insert(offer.id.clone(), offer.clone());
        self.offer_type_links.extend(
            offer_types
                .iter()
                .map(|offer_type| (offer.id.clone(), offer_type.clone())),
        );
        Ok(())
    }

    fn update_offer(&mut self, offer: &Offer) -> Result<(), RepositoryError> {
        replace_existing(&mut self.offers, offer.id.clone(), offer.clone())
    }

    fn delete_offer(&mut self, id: &OfferId) -> Result<bool, RepositoryError> {
        self.offer_type_links.retain(|(offer, _)| offer != id);
        Ok(self.offers.remove(id).is_some())
    }

    fn academic_requirement(
        &self,
        student: &UserId,
        practice_type: &OfferTypeId,
    ) -> Result<Option<AcademicRequirement>, RepositoryError> {
        Ok(self
            .requirements
            .get(&(student.clone(), practice_type.clone()))
            .cloned())
    }

    fn save_academic_requirement(
        &mut self,
        requirement: &AcademicRequirement,
    ) -> Result<(), RepositoryError> {
        self.requirements.insert(
            (
                requirement.student_id.clone(),
                requirement.practice_type.clone(),
            ),
            requirement.clone(),
        );
        Ok(())
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.applications.get(id).cloned())
    }

    fn application_for(
        &self,
        student: &UserId,
        offer: &OfferId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .applications
            .values()
            .find(|application| {
                &application.student_id == student && &application.offer_id == offer
            })
            .cloned())
    }

    fn count_applications_for_offer(&self, offer: &OfferId) -> Result<usize, RepositoryError> {
        Ok(self
            .applications
            .values()
            .filter(|application| &application.offer_id == offer)
            .count())
    }

    fn insert_application(&mut self, application: &Application) -> Result<(), RepositoryError> {
        let duplicate = self.applications.values().any(|existing| {
            existing.student_id == application.student_id
                && existing.offer_id == application.offer_id
        });
        if duplicate || self.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }

        self.applications
            .insert(application.id.clone(), application.clone());
        Ok(())
    }

    fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError> {
        replace_existing(
            &mut self.applications,
            application.id.clone(),
            application.clone(),
        )
    }

    fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Page<Application>, RepositoryError> {
        let mut matching: Vec<&Application> = self
            .applications
            .values()
            .filter(|application| self.matches(application, query))
            .collect();
        matching.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });

        let limit = query.effective_limit();
        Ok(Page {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(query.offset)
                .take(limit)
                .cloned()
                .collect(),
            offset: query.offset,
            limit,
        })
    }

    fn internship(&self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError> {
        Ok(self.internships.get(id).cloned())
    }

    fn internship_for_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<Internship>, RepositoryError> {
        Ok(self
            .internships
            .values()
            .find(|internship| internship.application_id.as_ref() == Some(application))
            .cloned())
    }

    fn has_active_internship(&self, student: &UserId) -> Result<bool, RepositoryError> {
        Ok(self
            .applications
            .values()
            .filter(|application| &application.student_id == student)
            .any(|application| {
                self.internships.values().any(|internship| {
                    internship.application_id.as_ref() == Some(&application.id)
                        && internship.status == InternshipStatus::InProgress
                })
            }))
    }

    fn insert_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError> {
        let taken = internship.application_id.as_ref().is_some_and(|application| {
            self.internships
                .values()
                .any(|existing| existing.application_id.as_ref() == Some(application))
        });
        if taken || self.internships.contains_key(&internship.id) {
            return Err(RepositoryError::Conflict);
        }

        self.internships
            .insert(internship.id.clone(), internship.clone());
        Ok(())
    }

    fn update_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError> {
        replace_existing(
            &mut self.internships,
            internship.id.clone(),
            internship.clone(),
        )
    }

    fn evaluation(
        &self,
        id: &EvaluationId,
    ) -> Result<Option<InternshipEvaluation>, RepositoryError> {
        Ok(self.evaluations.get(id).cloned())
    }

    fn evaluation_for_internship(
        &self,
        internship: &InternshipId,
    ) -> Result<Option<InternshipEvaluation>, RepositoryError> {
        Ok(self
            .evaluations
            .values()
            .find(|evaluation| &evaluation.internship_id == internship)
            .cloned())
    }

    fn insert_evaluation(
        &mut self,
        evaluation: &InternshipEvaluation,
    ) -> Result<(), RepositoryError> {
        let taken = self
            .evaluations
            .values()
            .any(|existing| existing.internship_id == evaluation.internship_id);
        if taken || self.evaluations.contains_key(&evaluation.id) {
            return Err(RepositoryError::Conflict);
        }

        self.evaluations
            .insert(evaluation.id.clone(), evaluation.clone());
        Ok(())
    }

    fn update_evaluation(
        &mut self,
        evaluation: &InternshipEvaluation,
    ) -> Result<(), RepositoryError> {
        replace_existing(
            &mut self.evaluations,
            evaluation.id.clone(),
            evaluation.clone(),
        )
    }

    fn delete_evaluation(&mut self, id: &EvaluationId) -> Result<bool, RepositoryError> {
        Ok(self.evaluations.remove(id).is_some())
    }

    fn evaluation_items(&self) -> Result<Vec<EvaluationItem>, RepositoryError> {
        let mut items: Vec<EvaluationItem> = self.items.values().cloned().collect();
        items.sort_by(|left, right| {
            left.evaluation_type
                .label()
                .cmp(right.evaluation_type.label())
                .then(left.order.cmp(&right.order))
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(items)
    }

    fn save_evaluation_item(&mut self, item: &EvaluationItem) -> Result<(), RepositoryError> {
        self.items.insert(item.id.clone(), item.clone());
        Ok(())
    }

    fn response(
        &self,
        evaluation: &EvaluationId,
        item: &EvaluationItemId,
    ) -> Result<Option<EvaluationResponse>, RepositoryError> {
        Ok(self
            .responses
            .get(&(evaluation.clone(), item.clone()))
            .cloned())
    }

    fn responses_for(
        &self,
        evaluation: &EvaluationId,
        evaluation_type: Option<EvaluationType>,
    ) -> Result<Vec<EvaluationResponse>, RepositoryError> {
        let mut responses: Vec<EvaluationResponse> = self
            .responses
            .values()
            .filter(|response| &response.evaluation_id == evaluation)
            .filter(|response| match evaluation_type {
                None => true,
                Some(wanted) => self
                    .items
                    .get(&response.item_id)
                    .is_some_and(|item| item.evaluation_type == wanted),
            })
            .cloned()
            .collect();
        responses.sort_by_key(|response| self.item_order(&response.item_id));
        Ok(responses)
    }

    fn upsert_response(&mut self, response: &EvaluationResponse) -> Result<(), RepositoryError> {
        self.responses.insert(
            (response.evaluation_id.clone(), response.item_id.clone()),
            response.clone(),
        );
        Ok(())
    }

    fn delete_responses(&mut self, evaluation: &EvaluationId) -> Result<usize, RepositoryError> {
        let before = self.responses.len();
        self.responses
            .retain(|(owner, _), _| owner != evaluation);
        Ok(before - self.responses.len())
    }

    fn document(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        Ok(self.documents.get(id).cloned())
    }

    fn insert_document(&mut self, document: &Document) -> Result<(), RepositoryError> {
        if self.documents.contains_key(&document.id) {
            return Err(RepositoryError::Conflict);
        }
        self.documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn delete_document(&mut self, id: &DocumentId) -> Result<bool, RepositoryError> {
        Ok(self.documents.remove(id).is_some())
    }

    fn report(&self, id: &ReportId) -> Result<Option<ApplicationReport>, RepositoryError> {
        Ok(self.reports.get(id).cloned())
    }

    fn reports_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<ApplicationReport>, RepositoryError> {
        let mut reports: Vec<ApplicationReport> = self
            .reports
            .values()
            .filter(|report| &report.application_id == application)
            .cloned()
            .collect();
        reports.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(reports)
    }

    fn insert_report(&mut self, report: &ApplicationReport) -> Result<(), RepositoryError> {
        if !self.applications.contains_key(&report.application_id)
            || !self.documents.contains_key(&report.document_id)
        {
            return Err(RepositoryError::NotFound);
        }
        if self.reports.contains_key(&report.id) {
            return Err(RepositoryError::Conflict);
        }
        self.reports.insert(report.id.clone(), report.clone());
        Ok(())
    }

    fn delete_report(&mut self, id: &ReportId) -> Result<bool, RepositoryError> {
        Ok(self.reports.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::internships::domain::ApplicationStatus;
    use chrono::Utc;

    fn application(student: &str, offer: &str) -> Application {
        let now = Utc::now();
        Application {
            id: ApplicationId::generate(),
            student_id: UserId::from(student),
            offer_id: OfferId::from(offer),
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn reads_do_not_stage_a_copy() {
        let tables = Tables::default();
        let mut unit = Staged::new(&tables);

        unit.application(&ApplicationId::from("app-1")).expect("read succeeds");
        unit.list_applications(&ApplicationQuery::default()).expect("listing succeeds");
        assert!(unit.staged.is_none());

        unit.insert_application(&application("stu-1", "off-1")).expect("insert succeeds");
        assert!(unit.staged.is_some());
        assert!(tables.applications.is_empty());
        assert_eq!(unit.read().applications.len(), 1);
    }

    #[test]
    fn failed_transactions_leave_no_trace() {
        let repository = MemoryRepository::new();
        let first = application("stu-1", "off-1");

        let result: Result<(), RepositoryError> = repository.transaction(|tx| {
            tx.insert_application(&first)?;
            Err(RepositoryError::Unavailable("boom".to_string()))
        });
        assert!(result.is_err());

        let stored: Option<Application> = repository
            .transaction(|tx| tx.application(&first.id))
            .expect("read succeeds");
        assert!(stored.is_none());
    }

    #[test]
    fn second_application_for_the_same_pair_conflicts() {
        let repository = MemoryRepository::new();
        repository
            .transaction(|tx| tx.insert_application(&application("stu-1", "off-1")))
            .expect("first insert");

        let second: Result<(), RepositoryError> = repository
            .transaction(|tx| tx.insert_application(&application("stu-1", "off-1")));
        assert!(matches!(second, Err(RepositoryError::Conflict)));

        repository
            .transaction(|tx| tx.insert_application(&application("stu-1", "off-2")))
            .expect("other offer is fine");
    }
}
