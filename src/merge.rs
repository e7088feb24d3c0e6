//! Merging of per-section scores into one assignment report.

use std::collections::HashMap;

use tracing::{debug, info, instrument};

use crate::error::{ReportError, Result};
use crate::report::{AssignmentReport, ReportRow, Scores, SectionPoints};
use crate::score::{ScoredRow, ScoredSection};
use crate::section::{SectionId, Sections};

/// Inner-joins scored sections on primary email and derives the totals.
///
/// Sections are joined in the given order. Name and email fields come from
/// the first section; later copies are discarded without comparison.
/// `total` is the sum of the section totals and `total_percent` relates it
/// to the sum of the sections' declared totals (zero when that sum is zero).
///
/// # Errors
///
/// Fails with [`ReportError::LostRows`] when a join leaves fewer rows than
/// the largest section seen so far, i.e. the sections disagree on who is on
/// the roster, and with [`ReportError::DuplicateKey`] when a section lists a
/// primary email twice.
#[instrument(skip_all, fields(sections = scored.len()))]
pub fn merge_sections(sections: &Sections, scored: Vec<ScoredSection>) -> Result<AssignmentReport> {
    let mut scored = scored.into_iter();
    let first = scored.next().ok_or(ReportError::NoSections)?;
    index_rows(first.section_id(), &first.rows)?;

    let mut total_points = sections.total_points(first.section_id())?;
    let mut layout = vec![first.layout];
    let mut expected = first.rows.len();
    let mut rows: Vec<ReportRow> = first
        .rows
        .into_iter()
        .map(|ScoredRow { student, points }| ReportRow {
            student,
            scores: Scores {
                sections: vec![points],
                total: 0.0,
                total_percent: 0.0,
                total_due: None,
                total_percent_due: None,
            },
        })
        .collect();

    for next in scored {
        let section_id = next.section_id();
        total_points += sections.total_points(section_id)?;

        let lookup = index_rows(section_id, &next.rows)?;
        expected = expected.max(next.rows.len());

        rows.retain_mut(|row| match lookup.get(row.key()) {
            Some(points) => {
                row.scores.sections.push(*points);
                true
            }
            None => false,
        });

        debug!(section_id, merged = rows.len(), expected, "Merged section");
        if rows.len() < expected {
            return Err(ReportError::LostRows {
                section_id,
                merged: rows.len(),
                expected,
            });
        }

        layout.push(next.layout);
    }

    for row in &mut rows {
        row.scores.total = row.scores.sections.iter().map(|p| p.total).sum();
        row.scores.total_percent = percent(row.scores.total, total_points);
    }

    info!(
        rows = rows.len(),
        sections = layout.len(),
        total_points,
        "Assignment report merged"
    );

    Ok(AssignmentReport {
        layout,
        total_points,
        rows,
    })
}

fn index_rows(section_id: SectionId, rows: &[ScoredRow]) -> Result<HashMap<&str, SectionPoints>> {
    let mut lookup = HashMap::with_capacity(rows.len());
    for row in rows {
        if lookup
            .insert(row.student.primary_email.as_str(), row.points)
            .is_some()
        {
            return Err(ReportError::DuplicateKey {
                section_id,
                email: row.student.primary_email.clone(),
            });
        }
    }
    Ok(lookup)
}

fn percent(points: f64, total_points: f64) -> f64 {
    if total_points == 0.0 {
        0.0
    } else {
        points * 100.0 / total_points
    }
}
