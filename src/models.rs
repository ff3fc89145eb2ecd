use std::fmt;

use serde::{Deserialize, Serialize};

/// The fixed column layout of the target worksheet, in header order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ImportedAt,
    Student,
    Period,
    Course,
    Teacher,
    DueDate,
    AssignedDate,
    Assignment,
    PtsPossible,
    Score,
    Pct,
    Status,
    Comments,
    SourceUrl,
}

impl Column {
    pub const ALL: [Column; 14] = [
        Column::ImportedAt,
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

    pub fn name(self) -> &'static str {
        match self {
            Column::ImportedAt => "ImportedAt",
            Column::Student => "Student",
            Column::Period => "Period",
            Column::Course => "Course",
            Column::Teacher => "Teacher",
            Column::DueDate => "DueDate",
            Column::AssignedDate => "AssignedDate",
            Column::Assignment => "Assignment",
            Column::PtsPossible => "PtsPossible",
            Column::Score => "Score",
            Column::Pct => "Pct",
            Column::Status => "Status",
            Column::Comments => "Comments",
            Column::SourceUrl => "SourceURL",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub fn canonical_header() -> Vec<String> {
    Column::ALL.iter().map(|c| c.name().to_string()).collect()
}

/// One scraped assignment observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    #[serde(rename = "ImportedAt")]
    pub imported_at: String,
    #[serde(rename = "Student")]
    pub student: String,
    #[serde(rename = "Period")]
    pub period: String,
    #[serde(rename = "Course")]
    pub course: String,
    #[serde(rename = "Teacher")]
    pub teacher: String,
    #[serde(rename = "DueDate")]
    pub due_date: String,
    #[serde(rename = "AssignedDate")]
    pub assigned_date: String,
    #[serde(rename = "Assignment")]
    pub assignment: String,
    #[serde(rename = "PtsPossible")]
    pub pts_possible: String,
    #[serde(rename = "Score")]
    pub score: String,
    #[serde(rename = "Pct")]
    pub pct: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Comments")]
    pub comments: String,
    #[serde(rename = "SourceURL")]
    pub source_url: String,
}

impl Record {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::ImportedAt => &self.imported_at,
            Column::Student => &self.student,
            Column::Period => &self.period,
            Column::Course => &self.course,
            Column::Teacher => &self.teacher,
            Column::DueDate => &self.due_date,
            Column::AssignedDate => &self.assigned_date,
            Column::Assignment => &self.assignment,
            Column::PtsPossible => &self.pts_possible,
            Column::Score => &self.score,
            Column::Pct => &self.pct,
            Column::Status => &self.status,
            Column::Comments => &self.comments,
            Column::SourceUrl => &self.source_url,
        }
    }

    /// Projects the record into canonical column order.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = vec![String::new(); Column::ALL.len()];
        for column in Column::ALL {
            row[column.index()] = self.get(column).to_string();
        }
        row
    }
}

/// Counters reported at the end of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped_as_duplicate: usize,
    pub removed_legacy_duplicates: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} new rows. Skipped as duplicates (before append): {}. \
             Removed legacy dups during cleanup: {}.",
            self.imported, self.skipped_as_duplicate, self.removed_legacy_duplicates
        )
    }
}
