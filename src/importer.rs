use anyhow::Context;
use chrono::{DateTime, Utc};

use crate::dedup::{self, KeepPolicy};
use crate::header;
use crate::models::{ImportSummary, Record};
use crate::sheet::{Extent, Worksheet};

pub const IMPORTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_imported_at(at: DateTime<Utc>) -> String {
    at.format(IMPORTED_AT_FORMAT).to_string()
}

/// Stamps and appends `records` in one call. No storage call for an empty batch.
pub async fn append<S: Worksheet + ?Sized>(
    sheet: &S,
    records: Vec<Record>,
    imported_at: DateTime<Utc>,
) -> anyhow::Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }
    let stamp = format_imported_at(imported_at);
    let rows: Vec<Vec<String>> = records
        .into_iter()
        .map(|mut record| {
            record.imported_at = stamp.clone();
            record.to_row()
        })
        .collect();

    sheet
        .append_rows(&rows)
        .await
        .with_context(|| format!("failed to append {} rows", rows.len()))?;
    Ok(rows.len())
}

/// Collapses rows sharing a key. The payload is staged before any write.
pub async fn compact<S: Worksheet + ?Sized>(
    sheet: &S,
    policy: KeepPolicy,
) -> anyhow::Result<usize> {
    let values = sheet
        .read_all()
        .await
        .context("failed to read sheet for compaction")?;
    let Some(plan) = dedup::plan_compaction(&values, policy) else {
        return Ok(0);
    };

    sheet
        .replace_all(&plan.rows, Extent::of(&values))
        .await
        .context("failed to rewrite compacted sheet")?;
    tracing::info!(
        removed = plan.removed,
        remaining = plan.rows.len() - 1,
        ?policy,
        "compacted legacy duplicates"
    );
    Ok(plan.removed)
}

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub compact: bool,
    pub keep: KeepPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            compact: true,
            keep: KeepPolicy::default(),
        }
    }
}

pub struct Importer<'a, S: Worksheet + ?Sized> {
    sheet: &'a S,
    options: ImportOptions,
}

impl<'a, S: Worksheet + ?Sized> Importer<'a, S> {
    pub fn new(sheet: &'a S, options: ImportOptions) -> Self {
        Self { sheet, options }
    }

    /// Loads sheet state, filters, appends and optionally compacts. Counters
    /// land in `summary` as each step completes, so a failed run still
    /// reports what it got done.
    pub async fn run(
        &self,
        records: Vec<Record>,
        imported_at: DateTime<Utc>,
        summary: &mut ImportSummary,
    ) -> anyhow::Result<()> {
        let values = self
            .sheet
            .read_all()
            .await
            .context("failed to read existing sheet rows")?;
        let values = header::ensure_header(self.sheet, values).await?;

        let mut existing = dedup::existing_keys(&values);
        tracing::info!(
            rows = values.len().saturating_sub(1),
            keys = existing.len(),
            "indexed existing rows"
        );

        let incoming = records.len();
        let fresh = dedup::filter_new(records, &mut existing);
        summary.skipped_as_duplicate = incoming - fresh.len();

        summary.imported = append(self.sheet, fresh, imported_at).await?;
        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped_as_duplicate,
            "appended new rows"
        );

        if self.options.compact {
            summary.removed_legacy_duplicates = compact(self.sheet, self.options.keep).await?;
        }
        Ok(())
    }
}
