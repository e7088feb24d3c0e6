//! Folding due-date snapshots of one assignment into a single report.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::error::{ReportError, Result};
use crate::report::{AssignmentReport, Scores};

/// Keeps the better score of two snapshots.
pub fn take_best(running: f64, next: f64) -> f64 {
    running.max(next)
}

/// Folds snapshot reports left to right with `op`.
///
/// Every section column and every total column of the running report is
/// replaced with `op(running, next)`; names and emails stay those of the
/// first report. Each column is combined exactly once per snapshot.
///
/// # Errors
///
/// [`ReportError::NoDues`] for an empty list; [`ReportError::LayoutMismatch`]
/// when snapshots carry different section columns and
/// [`ReportError::MissingSnapshotRow`] when a later snapshot lacks a student;
/// [`ReportError::ExtraSnapshotRow`] when it has one the first snapshot lacks.
#[instrument(skip_all, fields(snapshots = reports.len()))]
pub fn combine_reports<F>(reports: Vec<AssignmentReport>, op: F) -> Result<AssignmentReport>
where
    F: Fn(f64, f64) -> f64,
{
    let mut reports = reports.into_iter();
    let mut running = reports.next().ok_or(ReportError::NoDues)?;

    for (offset, next) in reports.enumerate() {
        let due_index = offset + 1;
        if next.layout != running.layout {
            return Err(ReportError::LayoutMismatch { due_index });
        }

        let lookup: HashMap<&str, &Scores> =
            next.rows.iter().map(|r| (r.key(), &r.scores)).collect();

        for row in &mut running.rows {
            let Some(other) = lookup.get(row.key()) else {
                return Err(ReportError::MissingSnapshotRow {
                    due_index,
                    email: row.key().to_string(),
                });
            };
            row.scores = combine_scores(&row.scores, other, &op);
        }

        if next.rows.len() != running.rows.len() {
            let known: HashSet<&str> = running.rows.iter().map(|r| r.key()).collect();
            if let Some(extra) = next.rows.iter().find(|r| !known.contains(r.key())) {
                return Err(ReportError::ExtraSnapshotRow {
                    due_index,
                    email: extra.key().to_string(),
                });
            }
        }

        debug!(due_index, rows = running.rows.len(), "Combined due snapshot");
    }

    Ok(running)
}

fn combine_scores<F>(running: &Scores, next: &Scores, op: &F) -> Scores
where
    F: Fn(f64, f64) -> f64,
{
    let optional = |a: Option<f64>, b: Option<f64>| match (a, b) {
        (Some(a), Some(b)) => Some(op(a, b)),
        (a, b) => a.or(b),
    };

    Scores {
        sections: running
            .sections
            .iter()
            .zip(&next.sections)
            .map(|(a, b)| a.combine(b, op))
            .collect(),
        total: op(running.total, next.total),
        total_percent: op(running.total_percent, next.total_percent),
        total_due: optional(running.total_due, next.total_due),
        total_percent_due: optional(running.total_percent_due, next.total_percent_due),
    }
}
