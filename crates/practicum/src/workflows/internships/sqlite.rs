//! SQLite-backed placement store.
//!
//! Uniqueness rules live in the schema as well as in the services, so a racing
//! writer that slipped past a read check still fails at commit time.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{
    ffi, params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior,
};

use super::domain::{
    AcademicRequirement, Application, ApplicationId, ApplicationReport, CenterId, Document,
    DocumentId, EvaluationId, EvaluationItem, EvaluationItemId, EvaluationResponse,
    EvaluationType, Internship, InternshipCenter, InternshipEvaluation, InternshipId,
    InternshipStatus, Offer, OfferId, OfferType, OfferTypeId, OptionsSchema, Person, ReportId,
    ResponseId, UnknownLabel, UserId,
};
use super::repository::{
    ApplicationQuery, Page, PlacementRepository, PlacementTransaction, RepositoryError,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS people (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS offer_types (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    relative_path TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    uploaded_by TEXT NOT NULL,
    uploaded_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS internship_centers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    convention_document_id TEXT REFERENCES documents(id)
);

CREATE TABLE IF NOT EXISTS offers (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    deadline TEXT NOT NULL,
    status TEXT NOT NULL,
    center_id TEXT REFERENCES internship_centers(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS offer_offer_types (
    offer_id TEXT NOT NULL REFERENCES offers(id) ON DELETE CASCADE,
    offer_type_id TEXT NOT NULL REFERENCES offer_types(id),
    position INTEGER NOT NULL,
    PRIMARY KEY (offer_id, offer_type_id)
);

CREATE TABLE IF NOT EXISTS academic_requirements (
    student_id TEXT NOT NULL,
    practice_type_id TEXT NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (student_id, practice_type_id)
);

CREATE TABLE IF NOT EXISTS applications (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    offer_id TEXT NOT NULL REFERENCES offers(id),
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (student_id, offer_id)
);

CREATE TABLE IF NOT EXISTS internships (
    id TEXT PRIMARY KEY,
    application_id TEXT UNIQUE REFERENCES applications(id),
    supervisor_id TEXT NOT NULL,
    coordinator_id TEXT NOT NULL,
    status TEXT NOT NULL,
    final_report_id TEXT REFERENCES documents(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluation_items (
    id TEXT PRIMARY KEY,
    evaluation_type TEXT NOT NULL,
    label TEXT NOT NULL,
    section TEXT NOT NULL,
    item_order INTEGER NOT NULL,
    weight REAL NOT NULL,
    max_score REAL NOT NULL,
    options_schema TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS internship_evaluations (
    id TEXT PRIMARY KEY,
    internship_id TEXT NOT NULL UNIQUE REFERENCES internships(id),
    supervisor_grade REAL,
    report_grade REAL,
    final_grade REAL,
    supervisor_comments TEXT,
    report_comments TEXT,
    completed_at TEXT,
    signature_document_id TEXT REFERENCES documents(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluation_responses (
    id TEXT PRIMARY KEY,
    evaluation_id TEXT NOT NULL REFERENCES internship_evaluations(id),
    item_id TEXT NOT NULL REFERENCES evaluation_items(id),
    selected_value TEXT NOT NULL,
    numeric_value REAL,
    score REAL NOT NULL,
    comment TEXT,
    updated_at TEXT NOT NULL,
    UNIQUE (evaluation_id, item_id)
);

CREATE TABLE IF NOT EXISTS application_reports (
    id TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(id),
    document_id TEXT NOT NULL REFERENCES documents(id),
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_applications_student ON applications(student_id);
CREATE INDEX IF NOT EXISTS idx_applications_created ON applications(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_reports_application ON application_reports(application_id);
"#;

const OFFER_COLUMNS: &str = "id, title, description, deadline, status, center_id, created_at";
const APPLICATION_COLUMNS: &str = "id, student_id, offer_id, status, created_at, updated_at";
const INTERNSHIP_COLUMNS: &str =
    "id, application_id, supervisor_id, coordinator_id, status, final_report_id, created_at";
const EVALUATION_COLUMNS: &str = "id, internship_id, supervisor_grade, report_grade, final_grade, \
     supervisor_comments, report_comments, completed_at, signature_document_id, created_at";
const ITEM_COLUMNS: &str =
    "id, evaluation_type, label, section, item_order, weight, max_score, options_schema, is_active";
const RESPONSE_COLUMNS: &str =
    "id, evaluation_id, item_id, selected_value, numeric_value, score, comment, updated_at";
const DOCUMENT_COLUMNS: &str = "id, name, relative_path, mime_type, uploaded_by, uploaded_at";
const REPORT_COLUMNS: &str = "id, application_id, document_id, created_at";

const APPLICATION_FILTER: &str = r#"
FROM applications a
LEFT JOIN offers o ON o.id = a.offer_id
LEFT JOIN people p ON p.id = a.student_id
WHERE (?1 IS NULL OR a.status = ?1)
  AND (?2 IS NULL OR EXISTS (
        SELECT 1 FROM offer_offer_types l
        WHERE l.offer_id = a.offer_id AND l.offer_type_id = ?2))
  AND (?3 IS NULL
        OR lower(coalesce(o.title, '')) LIKE ?3
        OR lower(coalesce(p.name, '')) LIKE ?3)
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Placement store persisted in a single SQLite database.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open or create the database file and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| RepositoryError::Unavailable(err.to_string()))?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, RepositoryError> {
        // Other handles on the same file queue on `BEGIN IMMEDIATE` instead of failing.
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl PlacementRepository for SqliteRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn PlacementTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sqlite connection poisoned".to_string()))?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;
        let mut unit = SqliteTransaction { tx };

        // An early return drops the transaction, which rolls it back.
        let outcome = work(&mut unit)?;
        unit.tx.commit().map_err(RepositoryError::from)?;
        Ok(outcome)
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.code == ErrorCode::ConstraintViolation =>
            {
                if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                    RepositoryError::NotFound
                } else {
                    RepositoryError::Conflict
                }
            }
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => RepositoryError::Corrupt(err.to_string()),
            _ => RepositoryError::Unavailable(err.to_string()),
        }
    }
}

struct SqliteTransaction<'conn> {
    tx: rusqlite::Transaction<'conn>,
}

fn label<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownLabel>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn offer_row(row: &Row<'_>) -> rusqlite::Result<Offer> {
    Ok(Offer {
        id: OfferId(row.get(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        deadline: row.get(3)?,
        status: label(row, 4)?,
        center_id: row.get::<_, Option<String>>(5)?.map(CenterId),
        created_at: row.get(6)?,
    })
}

fn application_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: ApplicationId(row.get(0)?),
        student_id: UserId(row.get(1)?),
        offer_id: OfferId(row.get(2)?),
        status: label(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn internship_row(row: &Row<'_>) -> rusqlite::Result<Internship> {
    Ok(Internship {
        id: InternshipId(row.get(0)?),
        application_id: row.get::<_, Option<String>>(1)?.map(ApplicationId),
        supervisor_id: UserId(row.get(2)?),
        coordinator_id: UserId(row.get(3)?),
        status: label(row, 4)?,
        final_report: row.get::<_, Option<String>>(5)?.map(DocumentId),
        created_at: row.get(6)?,
    })
}

fn evaluation_row(row: &Row<'_>) -> rusqlite::Result<InternshipEvaluation> {
    Ok(InternshipEvaluation {
        id: EvaluationId(row.get(0)?),
        internship_id: InternshipId(row.get(1)?),
        supervisor_grade: row.get(2)?,
        report_grade: row.get(3)?,
        final_grade: row.get(4)?,
        supervisor_comments: row.get(5)?,
        report_comments: row.get(6)?,
        completed_at: row.get(7)?,
        signature_document: row.get::<_, Option<String>>(8)?.map(DocumentId),
        created_at: row.get(9)?,
    })
}

fn item_row(row: &Row<'_>) -> rusqlite::Result<EvaluationItem> {
    let options_schema: Option<String> = row.get(7)?;
    Ok(EvaluationItem {
        id: EvaluationItemId(row.get(0)?),
        evaluation_type: label(row, 1)?,
        label: row.get(2)?,
        section: row.get(3)?,
        order: row.get(4)?,
        weight: row.get(5)?,
        max_score: row.get(6)?,
        options_schema: OptionsSchema::parse(options_schema.as_deref()),
        is_active: row.get(8)?,
    })
}

fn response_row(row: &Row<'_>) -> rusqlite::Result<EvaluationResponse> {
    Ok(EvaluationResponse {
        id: ResponseId(row.get(0)?),
        evaluation_id: EvaluationId(row.get(1)?),
        item_id: EvaluationItemId(row.get(2)?),
        selected_value: row.get(3)?,
        numeric_value: row.get(4)?,
        score: row.get(5)?,
        comment: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn document_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: DocumentId(row.get(0)?),
        name: row.get(1)?,
        relative_path: row.get(2)?,
        mime_type: row.get(3)?,
        uploaded_by: UserId(row.get(4)?),
        uploaded_at: row.get(5)?,
    })
}

fn report_row(row: &Row<'_>) -> rusqlite::Result<ApplicationReport> {
    Ok(ApplicationReport {
        id: ReportId(row.get(0)?),
        application_id: ApplicationId(row.get(1)?),
        document_id: DocumentId(row.get(2)?),
        created_at: row.get(3)?,
    })
}

fn expect_changed(changed: usize) -> Result<(), RepositoryError> {
    if changed == 0 {
        Err(RepositoryError::NotFound)
    } else {
        Ok(())
    }
}

impl SqliteTransaction<'_> {
    fn find<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, RepositoryError> {
        Ok(self.tx.query_row(sql, params, map).optional()?)
    }

    fn collect<T>(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>, RepositoryError> {
        let mut stmt = self.tx.prepare(sql)?;
        let rows = stmt.query_map(params, map)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl PlacementTransaction for SqliteTransaction<'_> {
    fn person(&self, id: &UserId) -> Result<Option<Person>, RepositoryError> {
        self.find(
            "SELECT id, name, email, role FROM people WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(Person {
                    id: UserId(row.get(0)?),
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: label(row, 3)?,
                })
            },
        )
    }

    fn save_person(&mut self, person: &Person) -> Result<(), RepositoryError> {
        self.tx.execute(
            r#"
            INSERT INTO people (id, name, email, role) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, email = excluded.email, role = excluded.role
            "#,
            params![
                person.id.as_str(),
                person.name,
                person.email,
                person.role.label()
            ],
        )?;
        Ok(())
    }

    fn offer_type(&self, id: &OfferTypeId) -> Result<Option<OfferType>, RepositoryError> {
        self.find(
            "SELECT id, name FROM offer_types WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(OfferType {
                    id: OfferTypeId(row.get(0)?),
                    name: row.get(1)?,
                })
            },
        )
    }

    fn save_offer_type(&mut self, offer_type: &OfferType) -> Result<(), RepositoryError> {
        self.tx.execute(
            r#"
            INSERT INTO offer_types (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![offer_type.id.as_str(), offer_type.name],
        )?;
        Ok(())
    }

    fn center(&self, id: &CenterId) -> Result<Option<InternshipCenter>, RepositoryError> {
        self.find(
            "SELECT id, name, convention_document_id FROM internship_centers WHERE id = ?1",
            params![id.as_str()],
            |row| {
                Ok(InternshipCenter {
                    id: CenterId(row.get(0)?),
                    name: row.get(1)?,
                    convention_document: row.get::<_, Option<String>>(2)?.map(DocumentId),
                })
            },
        )
    }

    fn save_center(&mut self, center: &InternshipCenter) -> Result<(), RepositoryError> {
        self.tx.execute(
            r#"
            INSERT INTO internship_centers (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            "#,
            params![center.id.as_str(), center.name],
        )?;
        Ok(())
    }

    fn set_center_convention(
        &mut self,
        id: &CenterId,
        document: Option<&DocumentId>,
    ) -> Result<(), RepositoryError> {
        let changed = self.tx.execute(
            "UPDATE internship_centers SET convention_document_id = ?2 WHERE id = ?1",
            params![id.as_str(), document.map(DocumentId::as_str)],
        )?;
        expect_changed(changed)
    }

    fn offer(&self, id: &OfferId) -> Result<Option<Offer>, RepositoryError> {
        self.find(
            &format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?1"),
            params![id.as_str()],
            offer_row,
        )
    }

    fn offer_types_for(&self, offer: &OfferId) -> Result<Vec<OfferType>, RepositoryError> {
        self.collect(
            r#"
            SELECT t.id, t.name
            FROM offer_offer_types l
            JOIN offer_types t ON t.id = l.offer_type_id
            WHERE l.offer_id = ?1
            ORDER BY l.position
            "#,
            params![offer.as_str()],
            |row| {
                Ok(OfferType {
                    id: OfferTypeId(row.get(0)?),
                    name: row.get(1)?,
                })
            },
        )
    }

    fn insert_offer(
        &mut self,
        offer: &Offer,
        offer_types: &[OfferTypeId],
    ) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!("INSERT INTO offers ({OFFER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                offer.id.as_str(),
                offer.title,
                offer.description,
                offer.deadline,
                offer.status.label(),
                offer.center_id.as_ref().map(CenterId::as_str),
                offer.created_at
            ],
        )?;

        for (position, offer_type) in offer_types.iter().enumerate() {
            self.tx.execute(
                "INSERT INTO offer_offer_types (offer_id, offer_type_id, position) VALUES (?1, ?2, ?3)",
                params![offer.id.as_str(), offer_type.as_str(), position as i64],
            )?;
        }
        Ok(())
    }

    fn update_offer(&mut self, offer: &Offer) -> Result<(), RepositoryError> {
        let changed = self.tx.execute(
            r#"
            UPDATE offers
            SET title = ?2, description = ?3, deadline = ?4, status = ?5, center_id = ?6
            WHERE id = ?1
            "#,
            params![
                offer.id.as_str(),
                offer.title,
                offer.description,
                offer.deadline,
                offer.status.label(),
                offer.center_id.as_ref().map(CenterId::as_str)
            ],
        )?;
        expect_changed(changed)
    }

    fn delete_offer(&mut self, id: &OfferId) -> Result<bool, RepositoryError> {
        self.tx.execute(
            "DELETE FROM offer_offer_types WHERE offer_id = ?1",
            params![id.as_str()],
        )?;
        let removed = self
            .tx
            .execute("DELETE FROM offers WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    fn academic_requirement(
        &self,
        student: &UserId,
        practice_type: &OfferTypeId,
    ) -> Result<Option<AcademicRequirement>, RepositoryError> {
        self.find(
            r#"
            SELECT student_id, practice_type_id, status
            FROM academic_requirements
            WHERE student_id = ?1 AND practice_type_id = ?2
            "#,
            params![student.as_str(), practice_type.as_str()],
            |row| {
                Ok(AcademicRequirement {
                    student_id: UserId(row.get(0)?),
                    practice_type: OfferTypeId(row.get(1)?),
                    status: label(row, 2)?,
                })
            },
        )
    }

    fn save_academic_requirement(
        &mut self,
        requirement: &AcademicRequirement,
    ) -> Result<(), RepositoryError> {
        self.tx.execute(
            r#"
            INSERT INTO academic_requirements (student_id, practice_type_id, status)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(student_id, practice_type_id) DO UPDATE SET status = excluded.status
            "#,
            params![
                requirement.student_id.as_str(),
                requirement.practice_type.as_str(),
                requirement.status.label()
            ],
        )?;
        Ok(())
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.find(
            &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
            params![id.as_str()],
            application_row,
        )
    }

    fn application_for(
        &self,
        student: &UserId,
        offer: &OfferId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.find(
            &format!(
                "SELECT {APPLICATION_COLUMNS} FROM applications WHERE student_id = ?1 AND offer_id = ?2"
            ),
            params![student.as_str(), offer.as_str()],
            application_row,
        )
    }

    fn count_applications_for_offer(&self, offer: &OfferId) -> Result<usize, RepositoryError> {
        let count: i64 = self.tx.query_row(
            "SELECT COUNT(*) FROM applications WHERE offer_id = ?1",
            params![offer.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_application(&mut self, application: &Application) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!(
                "INSERT INTO applications ({APPLICATION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                application.id.as_str(),
                application.student_id.as_str(),
                application.offer_id.as_str(),
                application.status.label(),
                application.created_at,
                application.updated_at
            ],
        )?;
        Ok(())
    }

    fn update_application(&mut self, application: &Application) -> Result<(), RepositoryError> {
        let changed = self.tx.execute(
            "UPDATE applications SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                application.id.as_str(),
                application.status.label(),
                application.updated_at
            ],
        )?;
        expect_changed(changed)
    }

    fn list_applications(
        &self,
        query: &ApplicationQuery,
    ) -> Result<Page<Application>, RepositoryError> {
        let status = query.status.map(|status| status.label());
        let offer_type = query.offer_type_id.as_ref().map(OfferTypeId::as_str);
        let pattern = query.needle().map(|needle| format!("%{needle}%"));
        let limit = query.effective_limit();

        let total: i64 = self.tx.query_row(
            &format!("SELECT COUNT(*) {APPLICATION_FILTER}"),
            params![status, offer_type, pattern],
            |row| row.get(0),
        )?;

        let items = self.collect(
            &format!(
                "SELECT a.id, a.student_id, a.offer_id, a.status, a.created_at, a.updated_at \
                 {APPLICATION_FILTER} ORDER BY a.created_at DESC, a.id ASC LIMIT ?4 OFFSET ?5"
            ),
            params![
                status,
                offer_type,
                pattern,
                limit as i64,
                query.offset as i64
            ],
            application_row,
        )?;

        Ok(Page {
            items,
            total: total as usize,
            offset: query.offset,
            limit,
        })
    }

    fn internship(&self, id: &InternshipId) -> Result<Option<Internship>, RepositoryError> {
        self.find(
            &format!("SELECT {INTERNSHIP_COLUMNS} FROM internships WHERE id = ?1"),
            params![id.as_str()],
            internship_row,
        )
    }

    fn internship_for_application(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<Internship>, RepositoryError> {
        self.find(
            &format!("SELECT {INTERNSHIP_COLUMNS} FROM internships WHERE application_id = ?1"),
            params![application.as_str()],
            internship_row,
        )
    }

    fn has_active_internship(&self, student: &UserId) -> Result<bool, RepositoryError> {
        let active: bool = self.tx.query_row(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM internships i
                JOIN applications a ON a.id = i.application_id
                WHERE a.student_id = ?1 AND i.status = ?2
            )
            "#,
            params![student.as_str(), InternshipStatus::InProgress.label()],
            |row| row.get(0),
        )?;
        Ok(active)
    }

    fn insert_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!(
                "INSERT INTO internships ({INTERNSHIP_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            ),
            params![
                internship.id.as_str(),
                internship.application_id.as_ref().map(ApplicationId::as_str),
                internship.supervisor_id.as_str(),
                internship.coordinator_id.as_str(),
                internship.status.label(),
                internship.final_report.as_ref().map(DocumentId::as_str),
                internship.created_at
            ],
        )?;
        Ok(())
    }

    fn update_internship(&mut self, internship: &Internship) -> Result<(), RepositoryError> {
        let changed = self.tx.execute(
            r#"
            UPDATE internships
            SET supervisor_id = ?2, coordinator_id = ?3, status = ?4, final_report_id = ?5
            WHERE id = ?1
            "#,
            params![
                internship.id.as_str(),
                internship.supervisor_id.as_str(),
                internship.coordinator_id.as_str(),
                internship.status.label(),
                internship.final_report.as_ref().map(DocumentId::as_str)
            ],
        )?;
        expect_changed(changed)
    }

    fn evaluation(
        &self,
        id: &EvaluationId,
    ) -> Result<Option<InternshipEvaluation>, RepositoryError> {
        self.find(
            &format!("SELECT {EVALUATION_COLUMNS} FROM internship_evaluations WHERE id = ?1"),
            params![id.as_str()],
            evaluation_row,
        )
    }

    fn evaluation_for_internship(
        &self,
        internship: &InternshipId,
    ) -> Result<Option<InternshipEvaluation>, RepositoryError> {
        self.find(
            &format!(
                "SELECT {EVALUATION_COLUMNS} FROM internship_evaluations WHERE internship_id = ?1"
            ),
            params![internship.as_str()],
            evaluation_row,
        )
    }

    fn insert_evaluation(
        &mut self,
        evaluation: &InternshipEvaluation,
    ) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!(
                "INSERT INTO internship_evaluations ({EVALUATION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                evaluation.id.as_str(),
                evaluation.internship_id.as_str(),
                evaluation.supervisor_grade,
                evaluation.report_grade,
                evaluation.final_grade,
                evaluation.supervisor_comments,
                evaluation.report_comments,
                evaluation.completed_at,
                evaluation.signature_document.as_ref().map(DocumentId::as_str),
                evaluation.created_at
            ],
        )?;
        Ok(())
    }

    fn update_evaluation(
        &mut self,
        evaluation: &InternshipEvaluation,
    ) -> Result<(), RepositoryError> {
        let changed = self.tx.execute(
            r#"
            UPDATE internship_evaluations
            SET supervisor_grade = ?2, report_grade = ?3, final_grade = ?4,
                supervisor_comments = ?5, report_comments = ?6, completed_at = ?7,
                signature_document_id = ?8
            WHERE id = ?1
            "#,
            params![
                evaluation.id.as_str(),
                evaluation.supervisor_grade,
                evaluation.report_grade,
                evaluation.final_grade,
                evaluation.supervisor_comments,
                evaluation.report_comments,
                evaluation.completed_at,
                evaluation.signature_document.as_ref().map(DocumentId::as_str)
            ],
        )?;
        expect_changed(changed)
    }

    fn delete_evaluation(&mut self, id: &EvaluationId) -> Result<bool, RepositoryError> {
        let removed = self.tx.execute(
            "DELETE FROM internship_evaluations WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(removed > 0)
    }

    fn evaluation_items(&self) -> Result<Vec<EvaluationItem>, RepositoryError> {
        self.collect(
            &format!(
                "SELECT {ITEM_COLUMNS} FROM evaluation_items ORDER BY evaluation_type, item_order, id"
            ),
            [],
            item_row,
        )
    }

    fn save_evaluation_item(&mut self, item: &EvaluationItem) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!(
                "INSERT INTO evaluation_items ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(id) DO UPDATE SET \
                     evaluation_type = excluded.evaluation_type, label = excluded.label, \
                     section = excluded.section, item_order = excluded.item_order, \
                     weight = excluded.weight, max_score = excluded.max_score, \
                     options_schema = excluded.options_schema, is_active = excluded.is_active"
            ),
            params![
                item.id.as_str(),
                item.evaluation_type.label(),
                item.label,
                item.section,
                item.order,
                item.weight,
                item.max_score,
                item.options_schema.to_json(),
                item.is_active
            ],
        )?;
        Ok(())
    }

    fn response(
        &self,
        evaluation: &EvaluationId,
        item: &EvaluationItemId,
    ) -> Result<Option<EvaluationResponse>, RepositoryError> {
        self.find(
            &format!(
                "SELECT {RESPONSE_COLUMNS} FROM evaluation_responses \
                 WHERE evaluation_id = ?1 AND item_id = ?2"
            ),
            params![evaluation.as_str(), item.as_str()],
            response_row,
        )
    }

    fn responses_for(
        &self,
        evaluation: &EvaluationId,
        evaluation_type: Option<EvaluationType>,
    ) -> Result<Vec<EvaluationResponse>, RepositoryError> {
        self.collect(
            r#"
            SELECT r.id, r.evaluation_id, r.item_id, r.selected_value, r.numeric_value,
                   r.score, r.comment, r.updated_at
            FROM evaluation_responses r
            JOIN evaluation_items i ON i.id = r.item_id
            WHERE r.evaluation_id = ?1 AND (?2 IS NULL OR i.evaluation_type = ?2)
            ORDER BY i.item_order, r.item_id
            "#,
            params![
                evaluation.as_str(),
                evaluation_type.map(|evaluation_type| evaluation_type.label())
            ],
            response_row,
        )
    }

    fn upsert_response(&mut self, response: &EvaluationResponse) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!(
                "INSERT INTO evaluation_responses ({RESPONSE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                 ON CONFLICT(evaluation_id, item_id) DO UPDATE SET \
                     selected_value = excluded.selected_value, \
                     numeric_value = excluded.numeric_value, \
                     score = excluded.score, comment = excluded.comment, \
                     updated_at = excluded.updated_at"
            ),
            params![
                response.id.as_str(),
                response.evaluation_id.as_str(),
                response.item_id.as_str(),
                response.selected_value,
                response.numeric_value,
                response.score,
                response.comment,
                response.updated_at
            ],
        )?;
        Ok(())
    }

    fn delete_responses(&mut self, evaluation: &EvaluationId) -> Result<usize, RepositoryError> {
        Ok(self.tx.execute(
            "DELETE FROM evaluation_responses WHERE evaluation_id = ?1",
            params![evaluation.as_str()],
        )?)
    }

    fn document(&self, id: &DocumentId) -> Result<Option<Document>, RepositoryError> {
        self.find(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
            params![id.as_str()],
            document_row,
        )
    }

    fn insert_document(&mut self, document: &Document) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!("INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                document.id.as_str(),
                document.name,
                document.relative_path,
                document.mime_type,
                document.uploaded_by.as_str(),
                document.uploaded_at
            ],
        )?;
        Ok(())
    }

    fn delete_document(&mut self, id: &DocumentId) -> Result<bool, RepositoryError> {
        let removed = self
            .tx
            .execute("DELETE FROM documents WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    fn report(&self, id: &ReportId) -> Result<Option<ApplicationReport>, RepositoryError> {
        self.find(
            &format!("SELECT {REPORT_COLUMNS} FROM application_reports WHERE id = ?1"),
            params![id.as_str()],
            report_row,
        )
    }

    fn reports_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Vec<ApplicationReport>, RepositoryError> {
        self.collect(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM application_reports \
                 WHERE application_id = ?1 ORDER BY created_at"
            ),
            params![application.as_str()],
            report_row,
        )
    }

    fn insert_report(&mut self, report: &ApplicationReport) -> Result<(), RepositoryError> {
        self.tx.execute(
            &format!("INSERT INTO application_reports ({REPORT_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
            params![
                report.id.as_str(),
                report.application_id.as_str(),
                report.document_id.as_str(),
                report.created_at
            ],
        )?;
        Ok(())
    }

    fn delete_report(&mut self, id: &ReportId) -> Result<bool, RepositoryError> {
        let removed = self.tx.execute(
            "DELETE FROM application_reports WHERE id = ?1",
            params![id.as_str()],
        )?;
        Ok(removed > 0)
    }
}
