//! Output formatting and persistence for assembled reports.
//!
//! Supports pretty-printing, JSON serialization, and CSV export.

use anyhow::Result;
use tracing::{debug, info};

use crate::email::IdentityTable;
use crate::report::score_columns;
use csv::WriterBuilder;
use std::fs::File;

/// Logs the report using Rust's debug pretty-print format.
pub fn print_pretty(table: &IdentityTable) {
    debug!("{:#?}", table);
}

/// Logs the report as pretty-printed JSON.
pub fn print_json(table: &IdentityTable) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(table)?);
    Ok(())
}

/// Column names of the CSV written by [`write_report`].
pub fn report_headers(table: &IdentityTable) -> Vec<String> {
    let with_due = table.rows.iter().any(|r| r.scores.total_due.is_some());
    let mut headers = vec![
        "email".to_string(),
        "last_name".to_string(),
        "first_name".to_string(),
    ];
    headers.extend(score_columns(&table.layout, with_due));
    headers
}

/// Writes the report as CSV, replacing any existing file.
pub fn write_report(path: &str, table: &IdentityTable) -> Result<()> {
    debug!(path, rows = table.len(), "Writing CSV report");

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    writer.write_record(report_headers(table))?;
    for row in &table.rows {
        let mut record = vec![
            row.email.clone(),
            row.student.last_name.clone(),
            row.student.first_name.clone(),
        ];
        record.extend(row.scores.values(&table.layout).iter().map(f64::to_string));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}
