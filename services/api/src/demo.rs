use crate::infra::DiskDocumentFiles;
use chrono::{Local, NaiveDate};
use clap::Args;
use practicum::config::AppConfig;
use practicum::error::AppError;
use practicum::workflows::internships::grading::letter_for;
use practicum::workflows::internships::rubric::import_items_from_path;
use practicum::workflows::internships::{
    default_rubric, seed_rubric, AcademicRequirement, Answer, ApplicationStatus, CommentUpdate,
    EvaluationItemId, EvaluationType, EvaluationView, MemoryRepository, NewInternship, NewOffer,
    OfferStatus, OfferType, OfferTypeId, Person, PersonRole, PlacementError, PlacementService,
    RequirementStatus, SqliteRepository, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Application deadline for the demo offer (YYYY-MM-DD). Defaults to 30 days from today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) deadline: Option<NaiveDate>,
    /// Skip the report rubric so only the supervisor grade counts.
    #[arg(long)]
    pub(crate) supervisor_only: bool,
    /// Print the final evaluation as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RubricImportArgs {
    /// CSV export with one rubric item per row
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// SQLite database to store the items in (defaults to APP_DATABASE_PATH)
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn run_rubric_import(args: RubricImportArgs) -> Result<(), AppError> {
    let items = import_items_from_path(&args.csv)?;
    let database = match args.database {
        Some(path) => Some(path),
        None => AppConfig::load()?.storage.database_path,
    };

    match database {
        Some(path) => {
            let repository = SqliteRepository::open(&path)?;
            let stored = seed_rubric(&repository, &items)?;
            println!(
                "Stored {} rubric items from {} in {}",
                stored,
                args.csv.display(),
                path.display()
            );
        }
        None => {
            println!(
                "Validated {} rubric items from {}; no database configured, nothing stored",
                items.len(),
                args.csv.display()
            );
        }
    }

    for evaluation_type in [EvaluationType::Supervisor, EvaluationType::Report] {
        let active = items
            .iter()
            .filter(|item| item.evaluation_type == evaluation_type && item.is_active)
            .count();
        println!("- {}: {} active items", evaluation_type, active);
    }
    Ok(())
}

const STUDENT: &str = "stu-demo";
const SUPERVISOR: &str = "sup-demo";
const COORDINATOR: &str = "coo-demo";
const PRACTICE_TYPE: &str = "oft-professional";

type DemoService = PlacementService<MemoryRepository, DiskDocumentFiles>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let deadline = args
        .deadline
        .unwrap_or_else(|| Local::now().date_naive() + chrono::Duration::days(30));

    println!("Internship placement demo (in-memory store)");
    let service = match demo_service() {
        Ok(service) => service,
        Err(err) => {
            println!("  Setup failed: {}", err);
            return Ok(());
        }
    };

    match walk_placement(&service, deadline, args.supervisor_only) {
        Ok(None) => println!("  No evaluation was opened for the internship"),
        Ok(Some(view)) => {
            render_evaluation(&view);
            if args.json {
                match serde_json::to_string_pretty(&view) {
                    Ok(json) => println!("\nEvaluation payload:\n{}", json),
                    Err(err) => println!("\nEvaluation payload unavailable: {}", err),
                }
            }
        }
        Err(err) => println!("  Demo stopped: {}", err),
    }
    Ok(())
}

fn demo_service() -> Result<DemoService, AppError> {
    let repository = MemoryRepository::new();
    let seeded = seed_rubric(&repository, &default_rubric()?)?;
    println!("- Seeded default rubric with {} items", seeded);

    let service = PlacementService::new(
        Arc::new(repository),
        Arc::new(DiskDocumentFiles::new("uploads")),
    );
    let people = [
        (STUDENT, "Demo Student", PersonRole::Student),
        (SUPERVISOR, "Demo Supervisor", PersonRole::Supervisor),
        (COORDINATOR, "Demo Coordinator", PersonRole::Coordinator),
    ];
    for (id, name, role) in people {
        service.register_person(&Person {
            id: UserId::from(id),
            name: name.to_string(),
            email: format!("{id}@campus.example"),
            role,
        })?;
    }
    service.register_offer_type(&OfferType {
        id: OfferTypeId::from(PRACTICE_TYPE),
        name: "Professional practice".to_string(),
    })?;
    service.record_academic_requirement(&AcademicRequirement {
        student_id: UserId::from(STUDENT),
        practice_type: OfferTypeId::from(PRACTICE_TYPE),
        status: RequirementStatus::Approved,
    })?;
    Ok(service)
}

fn walk_placement(
    service: &DemoService,
    deadline: NaiveDate,
    supervisor_only: bool,
) -> Result<Option<EvaluationView>, PlacementError> {
    let offer = service.create_offer(NewOffer {
        title: "Platform engineering intern".to_string(),
        description: "Operate the internal deployment pipeline".to_string(),
        deadline,
        center_id: None,
        offer_type_ids: vec![OfferTypeId::from(PRACTICE_TYPE)],
        status: Some(OfferStatus::Published),
    })?;
    println!("- Published offer '{}' ({}), deadline {}", offer.title, offer.id, deadline);

    let details = service.create_application(&UserId::from(STUDENT), &offer.id)?;
    println!(
        "- Application {} received -> status {}",
        details.application.id, details.application.status
    );

    let application =
        service.set_application_status(&details.application.id, ApplicationStatus::Approved)?;
    println!("- Application {} -> status {}", application.id, application.status);

    let created = service.create_internship(NewInternship {
        application_id: application.id,
        supervisor_id: UserId::from(SUPERVISOR),
        coordinator_id: UserId::from(COORDINATOR),
    })?;
    println!(
        "- Internship {} started -> status {}",
        created.internship.id, created.internship.status
    );
    let Some(evaluation_id) = created.evaluation_id else {
        return Ok(None);
    };
    println!("- Evaluation {} opened", evaluation_id);

    let supervisor_answers = [
        answer("sup-punctuality", "A", Some("Never missed a stand-up")),
        answer("sup-teamwork", "B", None),
        answer("sup-initiative", "6", None),
        answer("sup-quality", "C", Some("Needs more test coverage")),
    ];
    let mut view = service.submit_responses(
        &evaluation_id,
        EvaluationType::Supervisor,
        &supervisor_answers,
    )?;
    println!(
        "- Supervisor rubric submitted ({} answers)",
        supervisor_answers.len()
    );

    if !supervisor_only {
        let report_answers = [
            answer("rep-structure", "adequate", None),
            answer("rep-analysis", "B", None),
            answer("rep-conclusions", "5.5", None),
        ];
        view = service.submit_responses(&evaluation_id, EvaluationType::Report, &report_answers)?;
        println!("- Report rubric submitted ({} answers)", report_answers.len());
    }

    Ok(Some(view))
}

fn answer(item: &str, value: &str, comment: Option<&str>) -> Answer {
    Answer {
        item_id: EvaluationItemId::from(item),
        value: value.to_string(),
        comment: match comment {
            Some(comment) => CommentUpdate::Set(comment.to_string()),
            None => CommentUpdate::Keep,
        },
    }
}

fn grade_label(grade: Option<f64>) -> String {
    match grade {
        Some(grade) => format!("{grade:.2}"),
        None => "pending".to_string(),
    }
}

fn render_evaluation(view: &EvaluationView) {
    let evaluation = &view.evaluation;
    println!("\nEvaluation {}", evaluation.id);
    println!("Supervisor grade: {}", grade_label(evaluation.supervisor_grade));
    println!("Report grade: {}", grade_label(evaluation.report_grade));
    match evaluation.final_grade {
        Some(grade) => println!("Final grade: {:.2} ({})", grade, letter_for(grade)),
        None => println!("Final grade: pending"),
    }

    for breakdown in &view.rubric {
        println!(
            "\n{} rubric (weighted {:.2})",
            breakdown.evaluation_type, breakdown.weighted_score
        );
        for section in &breakdown.sections {
            println!(
                "- {}: {}/{} answered | {}",
                section.section,
                section.answered,
                section.items,
                grade_label(Some(section.weighted_score))
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_flow_reaches_a_final_grade() {
        let service = demo_service().expect("demo service builds");
        let deadline = NaiveDate::from_ymd_opt(2026, 12, 1).expect("valid date");
        let view = walk_placement(&service, deadline, true)
            .expect("placement walks")
            .expect("evaluation opened");

        assert!(view.evaluation.supervisor_grade.is_some());
        assert_eq!(view.evaluation.report_grade, None);
        assert_eq!(view.evaluation.final_grade, view.evaluation.supervisor_grade);
    }

    #[test]
    fn parse_date_explains_bad_input() {
        let err = parse_date("01/12/2026").expect_err("rejected");
        assert!(err.contains("YYYY-MM-DD"));
    }
}
