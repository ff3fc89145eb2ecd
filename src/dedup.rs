use std::collections::{HashMap, HashSet};
use std::fmt;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{Column, Record};
use crate::sheet::Worksheet;

/// Columns that identify one real-world assignment observation.
pub const KEY_COLUMNS: [Column; 5] = [
    Column::Student,
    Column::Course,
    Column::Assignment,
    Column::DueDate,
    Column::AssignedDate,
];

const KEY_DELIMITER: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn for_record(record: &Record) -> Self {
        Self::from_cells(KEY_COLUMNS.iter().map(|c| (*c, record.get(*c))))
    }

    pub fn for_row(row: &[String], index: &HeaderIndex) -> Self {
        Self::from_cells(KEY_COLUMNS.iter().map(|c| (*c, index.cell(row, *c))))
    }

    fn from_cells<'a>(cells: impl Iterator<Item = (Column, &'a str)>) -> Self {
        let parts: Vec<String> = cells
            .map(|(column, value)| normalize_field(column, value))
            .collect();
        Self(parts.join(&KEY_DELIMITER.to_string()))
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_field(column: Column, value: &str) -> String {
    let value = value.trim();
    match column {
        Column::DueDate | Column::AssignedDate => normalize_date(value)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| value.to_lowercase()),
        _ => value.to_lowercase(),
    }
}

/// Parses the date spellings the portal has been seen to emit: `YYYY-MM-DD`,
/// `YYYY/MM/DD`, `M/D/YYYY`, `M-D-YYYY`, `M/D/YY`, optionally followed by a time.
pub fn normalize_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.trim().split(['T', ' ']).next()?;
    let parts: Vec<&str> = date_part.split(['/', '-']).collect();
    let [a, b, c] = parts.as_slice() else {
        return None;
    };
    if !parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|byte| byte.is_ascii_digit()))
    {
        return None;
    }
    let num = |s: &str| s.parse::<u32>().ok();
    let year = |s: &str| s.parse::<i32>().ok();
    match (a.len(), c.len()) {
        (4, 1..=2) => NaiveDate::from_ymd_opt(year(a)?, num(b)?, num(c)?),
        (1..=2, 4) => NaiveDate::from_ymd_opt(year(c)?, num(a)?, num(b)?),
        (1..=2, 2) => NaiveDate::from_ymd_opt(2000 + year(c)?, num(a)?, num(b)?),
        _ => None,
    }
}

/// Column name to position, built from whatever header row the sheet carries.
/// Names match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn from_header(header: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            positions.entry(name.trim().to_ascii_lowercase()).or_insert(i);
        }
        Self { positions }
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions
            .get(&column.name().to_ascii_lowercase())
            .copied()
    }

    /// Missing columns and short rows read as empty.
    pub fn cell<'a>(&self, row: &'a [String], column: Column) -> &'a str {
        self.position(column)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

pub fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|cell| cell.trim().is_empty())
}

/// Keys of every data row in `values` (row 0 is the header).
pub fn existing_keys(values: &[Vec<String>]) -> HashSet<DedupKey> {
    let mut keys = HashSet::new();
    if values.len() < 2 {
        return keys;
    }
    let index = HeaderIndex::from_header(&values[0]);
    for row in values.iter().skip(1) {
        if is_blank_row(row) {
            continue;
        }
        keys.insert(DedupKey::for_row(row, &index));
    }
    keys
}

pub async fn load_existing_keys<S: Worksheet + ?Sized>(
    sheet: &S,
) -> anyhow::Result<HashSet<DedupKey>> {
    let values = sheet
        .read_all()
        .await
        .context("failed to read existing sheet rows")?;
    Ok(existing_keys(&values))
}

/// Keeps records whose key is unseen, first occurrence wins. Kept keys are
/// added to `existing` so repeats within one batch collapse as well.
pub fn filter_new(records: Vec<Record>, existing: &mut HashSet<DedupKey>) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| {
            let key = DedupKey::for_record(record);
            if existing.contains(&key) {
                tracing::debug!(%key, "skipping duplicate record");
                false
            } else {
                existing.insert(key);
                true
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum KeepPolicy {
    /// Keep the row with the newest ImportedAt.
    #[default]
    Latest,
    /// Keep the first row in sheet order.
    First,
}

/// Replacement sheet contents produced by a compaction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    pub rows: Vec<Vec<String>>,
    pub removed: usize,
}

/// Builds the full replacement payload. `None` means nothing needs rewriting.
pub fn plan_compaction(values: &[Vec<String>], policy: KeepPolicy) -> Option<Compaction> {
    if values.len() <= 2 {
        return None;
    }
    let header = &values[0];
    let index = HeaderIndex::from_header(header);
    let data = &values[1..];

    let mut winners: HashMap<DedupKey, usize> = HashMap::new();
    for (i, row) in data.iter().enumerate() {
        if is_blank_row(row) {
            continue;
        }
        let key = DedupKey::for_row(row, &index);
        match winners.get_mut(&key) {
            None => {
                winners.insert(key, i);
            }
            Some(current) => {
                if policy == KeepPolicy::Latest && newer(row, &data[*current], &index) {
                    *current = i;
                }
            }
        }
    }

    let removed = data.len() - winners.len();
    if removed == 0 {
        return None;
    }

    let mut kept: Vec<usize> = winners.into_values().collect();
    kept.sort_unstable();

    let mut rows = Vec::with_capacity(kept.len() + 1);
    rows.push(header.clone());
    rows.extend(kept.into_iter().map(|i| data[i].clone()));
    Some(Compaction { rows, removed })
}

fn newer(candidate: &[String], current: &[String], index: &HeaderIndex) -> bool {
    imported_at_order(index.cell(candidate, Column::ImportedAt))
        > imported_at_order(index.cell(current, Column::ImportedAt))
}

fn imported_at_order(value: &str) -> (Option<NaiveDateTime>, &str) {
    let value = value.trim();
    let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok();
    (parsed, value)
}
