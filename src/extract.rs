use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::{Column, Record};
use crate::status;

/// Whatever produces this run's records. The portal scraper sits behind this.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch_records(&self) -> anyhow::Result<Vec<Record>>;
}

/// Scraper output in positional form, without `ImportedAt`.
const POSITIONAL_COLUMNS: [Column; 13] = [
    Column::Student,
    Column::Period,
    Column::Course,
    Column::Teacher,
    Column::DueDate,
    Column::AssignedDate,
    Column::Assignment,
    Column::PtsPossible,
    Column::Score,
    Column::Pct,
    Column::Status,
    Column::Comments,
    Column::SourceUrl,
];

/// Reads records dumped by the scraper: a JSON array of named records, or CSV
/// with either a named header row or positional rows.
#[derive(Debug, Clone)]
pub struct FileExtractor {
    path: PathBuf,
}

impl FileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn is_json(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
    }
}

#[async_trait]
impl Extractor for FileExtractor {
    async fn fetch_records(&self) -> anyhow::Result<Vec<Record>> {
        let mut records = if self.is_json() {
            read_json(&self.path)?
        } else {
            read_csv(&self.path)?
        };
        records.iter_mut().for_each(status::fill_status);
        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            "loaded extractor output"
        );
        Ok(records)
    }
}

fn read_json(path: &Path) -> anyhow::Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let objects: Vec<Map<String, Value>> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    objects
        .into_iter()
        .enumerate()
        .map(|(i, object)| {
            let object = object
                .into_iter()
                .map(|(name, value)| (name, cell_text(value)))
                .collect();
            serde_json::from_value(Value::Object(object))
                .with_context(|| format!("malformed record {i} in {}", path.display()))
        })
        .collect()
}

/// Scraper dumps carry numbers (and nulls) for the score columns.
fn cell_text(value: Value) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => other,
    }
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut rows = reader.records();
    let Some(first) = rows.next() else {
        return Ok(Vec::new());
    };
    let first = first?;

    let named = first.iter().any(|cell| {
        let cell = cell.trim();
        cell == Column::Student.name() || cell == Column::Assignment.name()
    });

    let mut records = Vec::new();
    if named {
        let header: Vec<String> = first.iter().map(|c| c.trim().to_string()).collect();
        let header = csv::StringRecord::from(header);
        for result in rows {
            let row = result?;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let record: Record = row
                .deserialize(Some(&header))
                .with_context(|| format!("malformed row in {}", path.display()))?;
            records.push(record);
        }
    } else {
        for row in std::iter::once(Ok(first)).chain(rows) {
            let row = row?;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            records.push(positional_record(&row));
        }
    }
    Ok(records)
}

fn positional_record(row: &csv::StringRecord) -> Record {
    let mut record = Record::default();
    for (column, value) in POSITIONAL_COLUMNS.iter().zip(row.iter()) {
        let value = value.to_string();
        match column {
            Column::Student => record.student = value,
            Column::Period => record.period = value,
            Column::Course => record.course = value,
            Column::Teacher => record.teacher = value,
            Column::DueDate => record.due_date = value,
            Column::AssignedDate => record.assigned_date = value,
            Column::Assignment => record.assignment = value,
            Column::PtsPossible => record.pts_possible = value,
            Column::Score => record.score = value,
            Column::Pct => record.pct = value,
            Column::Status => record.status = value,
            Column::Comments => record.comments = value,
            Column::SourceUrl => record.source_url = value,
            Column::ImportedAt => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_named_csv_and_derives_status() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rows.csv");
        std::fs::write(
            &path,
            "Student,Course,Assignment,DueDate,Pct,Comments,Unused\n\
             Adrian,Math,HW1,9/5/2024,100,,x\n\
             ,,,,,,\n\
             Jacob,Science,Lab 2,9/6/2024,,missing,y\n",
        )
        .expect("write");

        let records = FileExtractor::new(&path).fetch_records().await.expect("fetch");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].student, "Adrian");
        assert_eq!(records[0].due_date, "9/5/2024");
        assert_eq!(records[0].status, "Win");
        assert_eq!(records[1].assignment, "Lab 2");
        assert_eq!(records[1].status, "Missing");
        assert_eq!(records[1].teacher, "");
    }

    #[tokio::test]
    async fn reads_positional_csv_in_scraper_order() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rows.csv");
        std::fs::write(
            &path,
            "Adrian,3,Math,Ms. Lee,9/5/2024,9/1/2024,HW1,10,6,60,,,https://portal\n\
             Jacob,1,Art\n",
        )
        .expect("write");

        let records = FileExtractor::new(&path).fetch_records().await.expect("fetch");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].period, "3");
        assert_eq!(records[0].teacher, "Ms. Lee");
        assert_eq!(records[0].assignment, "HW1");
        assert_eq!(records[0].status, "Low");
        assert_eq!(records[0].source_url, "https://portal");
        assert_eq!(records[0].imported_at, "");
        assert_eq!(records[1].course, "Art");
        assert_eq!(records[1].assignment, "");
    }

    #[tokio::test]
    async fn reads_json_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rows.json");
        std::fs::write(
            &path,
            r#"[{"Student": "Adrian", "Course": "Math", "Assignment": "HW1", "Status": "Win"}]"#,
        )
        .expect("write");

        let records = FileExtractor::new(&path).fetch_records().await.expect("fetch");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, "Win");
    }

    #[tokio::test]
    async fn reads_numeric_and_null_json_cells() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rows.json");
        std::fs::write(
            &path,
            r#"[{"Student": "Adrian", "Course": "Math", "Assignment": "HW1",
                 "PtsPossible": 10.0, "Score": 9, "Pct": 90.5, "Comments": null}]"#,
        )
        .expect("write");

        let records = FileExtractor::new(&path).fetch_records().await.expect("fetch");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pts_possible, "10.0");
        assert_eq!(records[0].score, "9");
        assert_eq!(records[0].pct, "90.5");
        assert_eq!(records[0].comments, "");
        assert_eq!(records[0].status, "");
    }

    #[tokio::test]
    async fn low_numeric_json_score_derives_status() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"Student": "Jacob", "Score": 0, "Pct": 0.0}]"#)
            .expect("write");

        let records = FileExtractor::new(&path).fetch_records().await.expect("fetch");
        assert_eq!(records[0].status, "Missing,Low");
    }

    #[tokio::test]
    async fn empty_csv_yields_no_records() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "").expect("write");
        let records = FileExtractor::new(&path).fetch_records().await.expect("fetch");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn missing_input_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let result = FileExtractor::new(dir.path().join("nope.csv"))
            .fetch_records()
            .await;
        assert!(result.is_err());
    }
}
