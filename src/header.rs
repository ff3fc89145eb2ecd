use anyhow::Context;

use crate::dedup::HeaderIndex;
use crate::models::{canonical_header, Column};
use crate::sheet::{Extent, Worksheet};

/// What it takes to bring row 1 back to the canonical column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRepair {
    Intact,
    /// Only row 1 changes.
    WriteHeader,
    /// Data rows have to move too; holds the full staged contents.
    Rewrite(Vec<Vec<String>>),
}

/// Unknown columns are kept to the right of the canonical ones; a header that
/// starts with the canonical list is left alone.
pub fn plan_header_repair(values: &[Vec<String>]) -> HeaderRepair {
    let canonical = canonical_header();
    let Some(current) = values.first() else {
        return HeaderRepair::WriteHeader;
    };
    let trimmed: Vec<&str> = current.iter().map(|c| c.trim()).collect();
    if trimmed.len() >= canonical.len()
        && trimmed[..canonical.len()]
            .iter()
            .zip(&canonical)
            .all(|(have, want)| *have == want.as_str())
    {
        return HeaderRepair::Intact;
    }

    let index = HeaderIndex::from_header(current);
    let known = Column::ALL
        .iter()
        .filter(|c| index.position(**c).is_some())
        .count();

    if known == 0 {
        if crate::dedup::is_blank_row(current) {
            return HeaderRepair::WriteHeader;
        }
        // Row 1 is data, not a header: keep it.
        let mut rows = Vec::with_capacity(values.len() + 1);
        rows.push(canonical);
        rows.extend(values.iter().cloned());
        return HeaderRepair::Rewrite(rows);
    }

    let extras: Vec<usize> = trimmed
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            !name.is_empty() && !canonical.iter().any(|c| c.eq_ignore_ascii_case(name))
        })
        .map(|(i, _)| i)
        .collect();

    if values.len() == 1 && extras.is_empty() {
        return HeaderRepair::WriteHeader;
    }

    let mut header = canonical;
    header.extend(extras.iter().map(|i| trimmed[*i].to_string()));

    let mut rows = Vec::with_capacity(values.len());
    rows.push(header);
    rows.extend(values.iter().skip(1).map(|row| {
        Column::ALL
            .iter()
            .map(|c| index.cell(row, *c).to_string())
            .chain(extras.iter().map(|i| row.get(*i).cloned().unwrap_or_default()))
            .collect()
    }));
    HeaderRepair::Rewrite(rows)
}

/// Enforces the header invariant and returns the sheet contents as they stand
/// afterwards.
pub async fn ensure_header<S: Worksheet + ?Sized>(
    sheet: &S,
    values: Vec<Vec<String>>,
) -> anyhow::Result<Vec<Vec<String>>> {
    match plan_header_repair(&values) {
        HeaderRepair::Intact => Ok(values),
        HeaderRepair::WriteHeader => {
            tracing::info!("writing canonical header row");
            let header = canonical_header();
            sheet
                .write_header(&header)
                .await
                .context("failed to write header row")?;
            let mut values = values;
            match values.first_mut() {
                Some(first) => *first = header,
                None => values.push(header),
            }
            Ok(values)
        }
        HeaderRepair::Rewrite(rows) => {
            tracing::warn!(
                rows = rows.len() - 1,
                "header did not match canonical columns; realigning sheet"
            );
            sheet
                .replace_all(&rows, Extent::of(&values))
                .await
                .context("failed to realign sheet to canonical header")?;
            Ok(rows)
        }
    }
}
