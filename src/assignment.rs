//! End-to-end report assembly for one assignment.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::combine::combine_reports;
use crate::due::{Due, DueDate};
use crate::error::{ReportError, Result};
use crate::export::{ExportRequest, ExportSource};
use crate::header::HeaderSchema;
use crate::merge::merge_sections;
use crate::report::AssignmentReport;
use crate::score::score_section;
use crate::section::{Sections, flag};

/// An assignment and the sections it grades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "assignment_id")]
    pub id: u64,
    #[serde(rename = "creator_user_id", default)]
    pub creator_id: Option<u64>,
    pub title: String,
    #[serde(deserialize_with = "flag", default)]
    pub visible: bool,
    pub sections: Sections,
}

/// An assembled report with the name of the export it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentExport {
    /// File name of the first section's export for the first due date.
    ///
    /// Every participating export was checked for the due date suffix, so
    /// this one stands for the whole run.
    pub filename: String,
    pub report: AssignmentReport,
}

impl Assignment {
    /// Exports every section as of `date`, scores each one and merges them.
    ///
    /// One export is requested per section, in section order.
    #[instrument(skip_all, fields(assignment_id = self.id, due = %date))]
    pub fn export_report_by_date(
        &self,
        source: &dyn ExportSource,
        date: &DueDate,
        include_time_spent: bool,
    ) -> Result<AssignmentExport> {
        if self.sections.is_empty() {
            return Err(ReportError::NoSections);
        }

        let mut filename = None;
        let mut scored = Vec::with_capacity(self.sections.len());

        for section in self.sections.iter() {
            let section_ids = [section.id];
            let request = ExportRequest {
                date,
                section_ids: &section_ids,
                include_time_spent,
            };
            let export = source
                .export(&request)
                .map_err(|err| ReportError::Export {
                    sections: section_ids.to_vec(),
                    source: err,
                })?;
            export.check_time_suffix(date)?;
            info!(section_id = section.id, filename = %export.filename, "Exported report");

            let schema = HeaderSchema::parse(export.table.headers())?;
            scored.push(score_section(section, &export.table, &schema)?);
            filename.get_or_insert(export.filename);
        }

        let report = merge_sections(&self.sections, scored)?;
        Ok(AssignmentExport {
            filename: filename.unwrap_or_default(),
            report,
        })
    }

    /// Like [`Assignment::export_report_by_date`], then fills the
    /// due-adjusted totals with the due's policy.
    pub fn export_report_with_due(
        &self,
        source: &dyn ExportSource,
        due: &Due,
        include_time_spent: bool,
    ) -> Result<AssignmentExport> {
        let mut export = self.export_report_by_date(source, due.date(), include_time_spent)?;
        due.apply(&mut export.report);
        Ok(export)
    }

    /// Builds one report per due date and folds them with `op`
    /// ([`crate::combine::take_best`] keeps each student's best snapshot).
    ///
    /// # Errors
    ///
    /// [`ReportError::NoDues`] before any export is requested when `dues` is
    /// empty; otherwise any error of the per-due pipeline or of
    /// [`combine_reports`].
    #[instrument(skip_all, fields(assignment_id = self.id, dues = dues.len()))]
    pub fn export_report_with_dues<F>(
        &self,
        source: &dyn ExportSource,
        dues: &[Due],
        include_time_spent: bool,
        op: F,
    ) -> Result<AssignmentExport>
    where
        F: Fn(f64, f64) -> f64,
    {
        if dues.is_empty() {
            return Err(ReportError::NoDues);
        }

        let mut filename = None;
        let mut reports = Vec::with_capacity(dues.len());
        for due in dues {
            let export = self.export_report_with_due(source, due, include_time_spent)?;
            filename.get_or_insert(export.filename);
            reports.push(export.report);
        }

        let report = combine_reports(reports, op)?;
        info!(rows = report.len(), "Due snapshots combined");
        Ok(AssignmentExport {
            filename: filename.unwrap_or_default(),
            report,
        })
    }
}
