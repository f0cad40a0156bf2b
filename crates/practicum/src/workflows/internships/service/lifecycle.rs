use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::PlacementService;
use crate::workflows::internships::domain::{
    ApplicationId, ApplicationStatus, EvaluationId, Internship, InternshipEvaluation,
    InternshipId, InternshipStatus, UserId,
};
use crate::workflows::internships::error::PlacementError;
use crate::workflows::internships::repository::{
    DocumentFiles, PlacementRepository, PlacementTransaction, RepositoryError,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInternship {
    pub application_id: ApplicationId,
    pub supervisor_id: UserId,
    pub coordinator_id: UserId,
}

/// A freshly created internship and the evaluation opened for it, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternshipCreated {
    #[serde(flatten)]
    pub internship: Internship,
    pub evaluation_id: Option<EvaluationId>,
}

impl<R, F> PlacementService<R, F>
where
    R: PlacementRepository + 'static,
    F: DocumentFiles + 'static,
{
    /// Turn an approved application into an `in_progress` internship and open its evaluation.
    pub fn create_internship(
        &self,
        request: NewInternship,
    ) -> Result<InternshipCreated, PlacementError> {
        let created = self.repository.transaction(|tx| {
            let application = tx
                .application(&request.application_id)?
                .ok_or_else(|| PlacementError::ApplicationNotFound(request.application_id.clone()))?;

            if application.status != ApplicationStatus::Approved {
                return Err(PlacementError::ApplicationNotApproved(application.id));
            }
            if tx.internship_for_application(&application.id)?.is_some() {
                return Err(PlacementError::InternshipAlreadyExists(application.id));
            }

            let internship = Internship {
                id: InternshipId::generate(),
                application_id: Some(application.id.clone()),
                supervisor_id: request.supervisor_id.clone(),
                coordinator_id: request.coordinator_id.clone(),
                status: InternshipStatus::InProgress,
                final_report: None,
                created_at: Utc::now(),
            };

            match tx.insert_internship(&internship) {
                Ok(()) => {}
                Err(RepositoryError::Conflict) => {
                    return Err(PlacementError::InternshipAlreadyExists(application.id))
                }
                Err(other) => return Err(other.into()),
            }

            let evaluation = ensure_evaluation_in(tx, &internship, Utc::now())?;
            Ok(InternshipCreated {
                internship,
                evaluation_id: evaluation.map(|evaluation| evaluation.id),
            })
        })?;

        info!(
            internship_id = %created.internship.id,
            evaluation_id = ?created.evaluation_id,
            "internship created"
        );
        Ok(created)
    }

    /// Open the internship's evaluation when its graph is complete; safe to repeat.
    pub fn ensure_evaluation(
        &self,
        internship_id: &InternshipId,
    ) -> Result<Option<InternshipEvaluation>, PlacementError> {
        self.repository.transaction(|tx| {
            let internship = tx
                .internship(internship_id)?
                .ok_or_else(|| PlacementError::InternshipNotFound(internship_id.clone()))?;
            ensure_evaluation_in(tx, &internship, Utc::now())
        })
    }

    pub fn transition(
        &self,
        internship_id: &InternshipId,
        status: InternshipStatus,
    ) -> Result<Internship, PlacementError> {
        let internship = self.repository.transaction(|tx| {
            let mut internship = tx
                .internship(internship_id)?
                .ok_or_else(|| PlacementError::InternshipNotFound(internship_id.clone()))?;

            if !internship.status.can_become(status) {
                return Err(PlacementError::internship_transition(
                    internship.status,
                    status,
                ));
            }

            internship.status = status;
            tx.update_internship(&internship)?;
            Ok(internship)
        })?;

        info!(internship_id = %internship.id, status = %internship.status, "internship moved");
        Ok(internship)
    }
}

/// Returns the internship's evaluation after the call, or `None` when the
/// supervisor, coordinator, application or student cannot be resolved.
pub(crate) fn ensure_evaluation_in(
    tx: &mut dyn PlacementTransaction,
    internship: &Internship,
    now: DateTime<Utc>,
) -> Result<Option<InternshipEvaluation>, PlacementError> {
    if let Some(existing) = tx.evaluation_for_internship(&internship.id)? {
        return Ok(Some(existing));
    }

    let student = match &internship.application_id {
        Some(application_id) => tx
            .application(application_id)?
            .map(|application| application.student_id),
        None => None,
    };

    let complete = match student {
        Some(student) => {
            tx.person(&student)?.is_some()
                && tx.person(&internship.supervisor_id)?.is_some()
                && tx.person(&internship.coordinator_id)?.is_some()
        }
        None => false,
    };

    if !complete {
        warn!(
            internship_id = %internship.id,
            "internship graph incomplete; evaluation not created"
        );
        return Ok(None);
    }

    let evaluation = InternshipEvaluation::blank(internship.id.clone(), now);
    match tx.insert_evaluation(&evaluation) {
        Ok(()) => {
            info!(
                internship_id = %internship.id,
                evaluation_id = %evaluation.id,
                "evaluation opened"
            );
            Ok(Some(evaluation))
        }
        Err(RepositoryError::Conflict) => Ok(tx.evaluation_for_internship(&internship.id)?),
        Err(other) => Err(other.into()),
    }
}
