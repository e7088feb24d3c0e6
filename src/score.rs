//! Per-section scoring: raw export percentages to weighted points.

use tracing::{debug, instrument};

use crate::error::{ReportError, Result};
use crate::export::RawTable;
use crate::header::HeaderSchema;
use crate::report::{SectionLayout, SectionPoints, Student};
use crate::section::{Section, SectionId};

/// One student's row of a scored section.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub student: Student,
    pub points: SectionPoints,
}

/// A section's export converted to weighted points, keyed by primary email.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSection {
    pub layout: SectionLayout,
    pub rows: Vec<ScoredRow>,
}

impl ScoredSection {
    pub fn section_id(&self) -> SectionId {
        self.layout.id
    }
}

/// Scores one section's export.
///
/// Only the name, email and included category-total columns are read; every
/// other column is discarded. Empty cells count as zero. Each included
/// category holds a percentage in the export and is converted to
/// `value * declared category total / 100`; the section total is the sum of
/// those converted values, the export's own total column is ignored.
///
/// # Errors
///
/// Fails when the section's declared total differs from the sum of its
/// included category totals in the header, when a row has no primary email,
/// or when a score cell is not a number.
#[instrument(skip_all, fields(section_id = section.id, rows = table.len()))]
pub fn score_section(
    section: &Section,
    table: &RawTable,
    schema: &HeaderSchema,
) -> Result<ScoredSection> {
    let categories = section.included_categories();
    let mut rows = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let primary_email = table.cell(row, schema.primary_email).trim();
        if primary_email.is_empty() {
            return Err(ReportError::MissingPrimaryEmail {
                section_id: section.id,
                row,
            });
        }

        let school_email = table.cell(row, schema.school_email).trim();
        let student = Student {
            last_name: table.cell(row, schema.last_name).trim().to_string(),
            first_name: table.cell(row, schema.first_name).trim().to_string(),
            primary_email: primary_email.to_string(),
            school_email: (!school_email.is_empty()).then(|| school_email.to_string()),
        };

        let mut points = SectionPoints::default();
        for &category in &categories {
            let column = schema.category_total(category).index;
            let percent = parse_score(table.cell(row, column)).ok_or_else(|| {
                ReportError::InvalidScore {
                    section_id: section.id,
                    row,
                    column: table
                        .headers()
                        .get(column)
                        .cloned()
                        .unwrap_or_else(|| column.to_string()),
                    value: table.cell(row, column).to_string(),
                }
            })?;
            *points.category_mut(category) = Some(percent);
        }

        rows.push(ScoredRow { student, points });
    }

    section.check_total(schema)?;

    for row in &mut rows {
        row.points.total = 0.0;
        for &category in &categories {
            let declared = schema.category_total(category).points;
            let slot = row.points.category_mut(category);
            let weighted = slot.unwrap_or(0.0) * declared / 100.0;
            *slot = Some(weighted);
            row.points.total += weighted;
        }
    }

    debug!(
        categories = ?categories,
        declared = section.total_points,
        "Section scored"
    );

    Ok(ScoredSection {
        layout: SectionLayout {
            id: section.id,
            categories,
        },
        rows,
    })
}

/// Parses a percentage cell; blank and `NaN` cells are zero.
fn parse_score(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(0.0);
    }
    let value = cell.trim_end_matches('%').trim().parse::<f64>().ok()?;
    Some(if value.is_nan() { 0.0 } else { value })
}
