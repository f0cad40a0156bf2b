//! Rubric reference data: CSV import and the built-in default rubric.

use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use super::domain::{EvaluationItem, EvaluationItemId, EvaluationType, OptionsSchema};
use super::repository::{PlacementRepository, RepositoryError};

#[derive(Debug)]
pub enum RubricImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
    Repository(RepositoryError),
}

impl std::fmt::Display for RubricImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RubricImportError::Io(err) => write!(f, "failed to read rubric export: {}", err),
            RubricImportError::Csv(err) => write!(f, "invalid rubric CSV data: {}", err),
            RubricImportError::InvalidRow { line, message } => {
                write!(f, "rubric row on line {}: {}", line, message)
            }
            RubricImportError::Repository(err) => {
                write!(f, "could not store rubric items: {}", err)
            }
        }
    }
}

impl std::error::Error for RubricImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RubricImportError::Io(err) => Some(err),
            RubricImportError::Csv(err) => Some(err),
            RubricImportError::InvalidRow { .. } => None,
            RubricImportError::Repository(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RubricImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RubricImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<RepositoryError> for RubricImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Repository(err)
    }
}

#[derive(Debug, Deserialize)]
struct RubricRow {
    id: String,
    evaluation_type: String,
    label: String,
    #[serde(default)]
    section: String,
    order: i32,
    weight: f64,
    max_score: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    options_schema: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    is_active: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Some(true),
        Some(raw) => match raw.as_str() {
            "true" | "1" | "yes" | "y" => Some(true),
            "false" | "0" | "no" | "n" => Some(false),
            _ => None,
        },
    }
}

impl RubricRow {
    fn into_item(self, line: u64) -> Result<EvaluationItem, RubricImportError> {
        let invalid = |message: String| RubricImportError::InvalidRow { line, message };

        let id = self.id.trim();
        if id.is_empty() {
            return Err(invalid("id is required".to_string()));
        }
        let evaluation_type = self
            .evaluation_type
            .parse::<EvaluationType>()
            .map_err(|err| invalid(err.to_string()))?;
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(invalid(format!("weight {} must be non-negative", self.weight)));
        }
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(invalid(format!("max_score {} must be positive", self.max_score)));
        }
        let is_active = parse_flag(self.is_active.as_deref()).ok_or_else(|| {
            invalid(format!(
                "is_active '{}' is not a flag",
                self.is_active.as_deref().unwrap_or_default()
            ))
        })?;

        Ok(EvaluationItem {
            id: EvaluationItemId::from(id),
            evaluation_type,
            label: self.label.trim().to_string(),
            section: self.section.trim().to_string(),
            order: self.order,
            weight: self.weight,
            max_score: self.max_score,
            options_schema: OptionsSchema::parse(self.options_schema.as_deref()),
            is_active,
        })
    }
}

/// Parse rubric rows; malformed option schemas degrade to no schema.
pub fn import_items<R: Read>(reader: R) -> Result<Vec<EvaluationItem>, RubricImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut record = csv::StringRecord::new();
    let mut items = Vec::new();
    while csv_reader.read_record(&mut record)? {
        let line = record.position().map(csv::Position::line).unwrap_or_default();
        let row: RubricRow = record.deserialize(Some(&headers))?;
        items.push(row.into_item(line)?);
    }
    Ok(items)
}

pub fn import_items_from_path(
    path: impl AsRef<Path>,
) -> Result<Vec<EvaluationItem>, RubricImportError> {
    let file = std::fs::File::open(path)?;
    import_items(file)
}

/// Upsert rubric items by id, returning how many were stored.
pub fn seed_rubric<R: PlacementRepository>(
    repository: &R,
    items: &[EvaluationItem],
) -> Result<usize, RubricImportError> {
    repository.transaction(|tx| {
        for item in items {
            tx.save_evaluation_item(item)?;
        }
        Ok(items.len())
    })
}

const DEFAULT_RUBRIC: &str = r#"id,evaluation_type,label,section,order,weight,max_score,options_schema,is_active
sup-punctuality,SUPERVISOR,Punctuality and attendance,Professional conduct,1,1,7,,true
sup-teamwork,SUPERVISOR,Teamwork,Professional conduct,2,1,7,,true
sup-initiative,SUPERVISOR,Initiative,Technical performance,3,1.5,7,,true
sup-quality,SUPERVISOR,Quality of work,Technical performance,4,2,7,,true
rep-structure,REPORT,Structure and clarity,Form,1,1,7,"{""options"":[{""key"":""excellent"",""score"":7},{""key"":""adequate"",""score"":5},{""key"":""insufficient"",""score"":2}]}",true
rep-analysis,REPORT,Depth of analysis,Content,2,2,7,,true
rep-conclusions,REPORT,Conclusions,Content,3,1,7,,true
"#;

/// Rubric shipped with the service for in-memory deployments and demos.
pub fn default_rubric() -> Result<Vec<EvaluationItem>, RubricImportError> {
    import_items(DEFAULT_RUBRIC.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rubric_covers_both_evaluation_types() {
        let items = default_rubric().expect("default rubric parses");
        assert_eq!(items.len(), 7);
        assert!(items
            .iter()
            .any(|item| item.evaluation_type == EvaluationType::Supervisor));
        let structure = items
            .iter()
            .find(|item| item.id.as_str() == "rep-structure")
            .expect("structure item");
        assert_eq!(structure.options_schema.lookup("adequate"), Some(5.0));
    }

    #[test]
    fn broken_schema_and_blank_flag_are_tolerated() {
        let csv = "id,evaluation_type,label,section,order,weight,max_score,options_schema,is_active\n\
                   itm-1,report,Clarity,Form,1,1,7,{not json,\n";
        let items = import_items(csv.as_bytes()).expect("row imports");
        assert_eq!(items[0].options_schema, OptionsSchema::NoSchema);
        assert!(items[0].is_active);
        assert_eq!(items[0].evaluation_type, EvaluationType::Report);
    }

    #[test]
    fn unknown_evaluation_type_names_the_line() {
        let csv = "id,evaluation_type,label,section,order,weight,max_score,options_schema,is_active\n\
                   itm-1,SUPERVISOR,Clarity,Form,1,1,7,,true\n\
                   itm-2,PEER,Clarity,Form,2,1,7,,true\n";
        match import_items(csv.as_bytes()) {
            Err(RubricImportError::InvalidRow { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("PEER"));
            }
            other => panic!("expected invalid row, got {other:?}"),
        }
    }
}
