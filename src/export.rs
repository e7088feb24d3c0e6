//! Boundary with the export collaborator.
//!
//! The pipeline never talks to the platform itself. An [`ExportSource`]
//! hands it the raw CSV of one activity export and the file name the
//! platform gave it.

use anyhow::Result as AnyResult;
use csv::ReaderBuilder;

use crate::due::DueDate;
use crate::error::{ReportError, Result};
use crate::section::SectionId;

/// Parameters of a single activity export.
#[derive(Debug, Clone, Copy)]
pub struct ExportRequest<'a> {
    pub date: &'a DueDate,
    pub section_ids: &'a [SectionId],
    pub include_time_spent: bool,
}

/// Supplier of raw activity exports.
pub trait ExportSource {
    fn export(&self, request: &ExportRequest<'_>) -> AnyResult<RawExport>;
}

/// Header row and cells of an export, untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Reads CSV text whose first record is the header row.
    pub fn from_csv(text: &str) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Cell at `row`/`column`, empty when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One downloaded export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExport {
    pub filename: String,
    pub table: RawTable,
}

impl RawExport {
    pub fn from_csv(filename: impl Into<String>, text: &str) -> Result<Self> {
        Ok(Self {
            filename: filename.into(),
            table: RawTable::from_csv(text)?,
        })
    }

    /// Rejects exports whose file name does not carry the due date's
    /// `YYYY-MM-DD_HHMM_<TZ>` suffix; such a file belongs to another cut-off.
    pub fn check_time_suffix(&self, date: &DueDate) -> Result<()> {
        let suffix = date.report_name_suffix();
        if !self.filename.contains(&suffix) {
            return Err(ReportError::MissingTimeSuffix {
                filename: self.filename.clone(),
                suffix,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_csv_keeps_empty_cells() {
        let text = "Last name,First name,Primary email\nLee,Avery,avery@gmail.com\nPatel,,kiara@gmail.com\n";
        let table = RawTable::from_csv(text).unwrap();

        assert_eq!(table.headers(), ["Last name", "First name", "Primary email"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, 1), "");
        assert_eq!(table.cell(1, 2), "kiara@gmail.com");
        assert_eq!(table.cell(5, 0), "");
    }

    #[test]
    fn test_from_csv_rejects_ragged_rows() {
        let text = "a,b,c\n1,2\n";
        assert!(matches!(RawTable::from_csv(text), Err(ReportError::Csv(_))));
    }

    #[test]
    fn test_check_time_suffix() {
        let date = DueDate::from_components(2024, 1, 20, 7, 59, 59, -8 * 60, "PST").unwrap();

        let export = RawExport::from_csv("report_2024-01-20_0759_PST.csv", "a\n").unwrap();
        assert!(export.check_time_suffix(&date).is_ok());

        let stale = RawExport::from_csv("report_2024-01-19_0759_PST.csv", "a\n").unwrap();
        match stale.check_time_suffix(&date) {
            Err(ReportError::MissingTimeSuffix { suffix, .. }) => {
                assert_eq!(suffix, "2024-01-20_0759_PST")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
