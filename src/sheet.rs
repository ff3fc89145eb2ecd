use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::SheetError;

/// Grid size covered by a full rewrite, so stale cells past the new end get blanked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    pub rows: usize,
    pub cols: usize,
}

impl Extent {
    pub fn of(values: &[Vec<String>]) -> Self {
        Self {
            rows: values.len(),
            cols: values.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

/// The storage side of an import: one tab of a spreadsheet.
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Every populated row, header included. Empty only when the tab is empty.
    async fn read_all(&self) -> Result<Vec<Vec<String>>, SheetError>;

    /// Overwrites row 1 only.
    async fn write_header(&self, header: &[String]) -> Result<(), SheetError>;

    /// Adds rows after the last populated row in one call.
    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetError>;

    /// Replaces the tab contents with `rows`; cells inside `previous` that the
    /// new payload does not cover end up blank.
    async fn replace_all(&self, rows: &[Vec<String>], previous: Extent) -> Result<(), SheetError>;
}

/// A worksheet kept in a local CSV file.
#[derive(Debug, Clone)]
pub struct CsvSheet {
    path: PathBuf,
}

impl CsvSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn write_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetError> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sheet.csv".to_string());
        let temp_path = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let result = (|| -> Result<(), SheetError> {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(&temp_path)?;
            for row in rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
            Ok(())
        })();

        match result.and_then(|()| fs::rename(&temp_path, &self.path).map_err(SheetError::from)) {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = fs::remove_file(&temp_path);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Worksheet for CsvSheet {
    async fn read_all(&self) -> Result<Vec<Vec<String>>, SheetError> {
        self.read_rows()
    }

    async fn write_header(&self, header: &[String]) -> Result<(), SheetError> {
        let mut rows = self.read_rows()?;
        match rows.first_mut() {
            Some(first) => *first = header.to_vec(),
            None => rows.push(header.to_vec()),
        }
        self.write_rows(&rows)
    }

    /// Goes through the full rewrite path so a last line without a
    /// terminator never gets merged with the first appended row.
    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetError> {
        let mut existing = self.read_rows()?;
        existing.extend(rows.iter().cloned());
        self.write_rows(&existing)
    }

    async fn replace_all(&self, rows: &[Vec<String>], _previous: Extent) -> Result<(), SheetError> {
        self.write_rows(rows)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty_sheet() {
        let dir = tempdir().expect("tempdir");
        let sheet = CsvSheet::new(dir.path().join("grades.csv"));
        assert!(sheet.read_all().await.expect("read").is_empty());
    }

    #[tokio::test]
    async fn unreadable_path_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let sheet = CsvSheet::new(dir.path());
        assert!(sheet.read_all().await.is_err());
    }

    #[tokio::test]
    async fn header_append_and_replace_round_through_the_file() {
        let dir = tempdir().expect("tempdir");
        let sheet = CsvSheet::new(dir.path().join("grades.csv"));

        sheet.write_header(&strings(&["A", "B"])).await.expect("header");
        sheet
            .append_rows(&[strings(&["1", "two, with comma"]), strings(&["3"])])
            .await
            .expect("append");

        let rows = sheet.read_all().await.expect("read");
        assert_eq!(
            rows,
            vec![
                strings(&["A", "B"]),
                strings(&["1", "two, with comma"]),
                strings(&["3"])
            ]
        );

        sheet
            .replace_all(&[strings(&["A", "B"])], Extent::of(&rows))
            .await
            .expect("replace");
        assert_eq!(sheet.read_all().await.expect("read"), vec![strings(&["A", "B"])]);

        sheet.write_header(&strings(&["X", "Y"])).await.expect("header");
        assert_eq!(sheet.read_all().await.expect("read"), vec![strings(&["X", "Y"])]);
    }

    #[tokio::test]
    async fn append_after_unterminated_last_line_starts_a_new_row() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("grades.csv");
        std::fs::write(&path, "A,B").expect("seed");
        let sheet = CsvSheet::new(&path);

        sheet
            .append_rows(&[strings(&["1", "2"])])
            .await
            .expect("append");

        assert_eq!(
            sheet.read_all().await.expect("read"),
            vec![strings(&["A", "B"]), strings(&["1", "2"])]
        );
    }

    #[test]
    fn extent_covers_widest_row() {
        let values = vec![strings(&["a"]), strings(&["a", "b", "c"]), vec![]];
        assert_eq!(Extent::of(&values), Extent { rows: 3, cols: 3 });
        assert_eq!(Extent::of(&[]), Extent::default());
    }
}
