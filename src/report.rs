use std::collections::BTreeMap;
use std::fmt::Write;

use crate::dedup::{is_blank_row, HeaderIndex};
use crate::models::Column;
use crate::status::{self, Flag};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentSummary {
    pub student: String,
    pub rows: usize,
    pub missing: usize,
    pub low: usize,
    pub win: usize,
    pub missing_work: Vec<MissingWork>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingWork {
    pub course: String,
    pub assignment: String,
    pub due_date: String,
}

pub fn summarize_by_student(values: &[Vec<String>]) -> Vec<StudentSummary> {
    let Some(header) = values.first() else {
        return Vec::new();
    };
    let index = HeaderIndex::from_header(header);
    let mut map: BTreeMap<String, StudentSummary> = BTreeMap::new();

    for row in values.iter().skip(1) {
        if is_blank_row(row) {
            continue;
        }
        let student = index.cell(row, Column::Student).trim();
        let entry = map
            .entry(student.to_lowercase())
            .or_insert_with(|| StudentSummary {
                student: student.to_string(),
                ..StudentSummary::default()
            });
        entry.rows += 1;

        for flag in status::parse_flags(index.cell(row, Column::Status)) {
            match flag {
                Flag::Missing => {
                    entry.missing += 1;
                    entry.missing_work.push(MissingWork {
                        course: index.cell(row, Column::Course).trim().to_string(),
                        assignment: index.cell(row, Column::Assignment).trim().to_string(),
                        due_date: index.cell(row, Column::DueDate).trim().to_string(),
                    });
                }
                Flag::Low => entry.low += 1,
                Flag::Win => entry.win += 1,
            }
        }
    }

    map.into_values().collect()
}

pub fn build_report(generated_at: &str, values: &[Vec<String>]) -> String {
    let summaries = summarize_by_student(values);

    let mut output = String::new();
    let _ = writeln!(output, "# Assignment Status Report");
    let _ = writeln!(output, "Generated {generated_at} (UTC)");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No assignments recorded yet.");
        return output;
    }

    for summary in &summaries {
        let label = if summary.student.is_empty() {
            "(unnamed)"
        } else {
            summary.student.as_str()
        };
        let _ = writeln!(
            output,
            "- {}: {} assignments, {} missing, {} low, {} wins",
            label, summary.rows, summary.missing, summary.low, summary.win
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Missing Work");

    let mut any_missing = false;
    for summary in &summaries {
        if summary.missing_work.is_empty() {
            continue;
        }
        any_missing = true;
        let _ = writeln!(output, "### {}", summary.student);
        for work in &summary.missing_work {
            let due = if work.due_date.is_empty() {
                "no due date"
            } else {
                work.due_date.as_str()
            };
            let _ = writeln!(output, "- {} ({}), due {}", work.assignment, work.course, due);
        }
    }
    if !any_missing {
        let _ = writeln!(output, "Nothing missing.");
    }

    output
}
