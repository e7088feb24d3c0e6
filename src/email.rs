//! Canonical student emails.
//!
//! Exports carry two addresses per student: the primary one the student
//! signed up with and an optional school address. Grade books want one
//! address per student, preferably in the institution's format.

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{DuplicateEmail, InvalidEmail, ReconcileStage, ReportError, Result};
use crate::report::{AssignmentReport, Scores, SectionLayout, Student};

/// How a row's canonical email was chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EmailResolution {
    /// The primary email already has the preferred format.
    PrimaryPreferred,
    /// No school email to fall back to.
    PrimaryWithoutSchoolEmail,
    /// The school email has the preferred format and replaces the primary.
    SchoolEmailPromoted,
    /// Neither email has the preferred format; the primary is kept.
    PrimaryFallback,
    /// Replaced through an explicit alias map.
    Remapped { from: String },
}

/// A report row keyed by canonical email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRow {
    pub email: String,
    pub resolution: EmailResolution,
    pub student: Student,
    pub scores: Scores,
}

/// Final report keyed by one unique email per student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityTable {
    pub layout: Vec<SectionLayout>,
    pub total_points: f64,
    pub rows: Vec<IdentityRow>,
}

impl IdentityTable {
    pub fn row(&self, email: &str) -> Option<&IdentityRow> {
        self.rows.iter().find(|r| r.email == email)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Chooses the canonical email of one student.
pub fn resolve_email(student: &Student, preferred: &Regex) -> (String, EmailResolution) {
    if preferred.is_match(&student.primary_email) {
        return (student.primary_email.clone(), EmailResolution::PrimaryPreferred);
    }
    match &student.school_email {
        None => (
            student.primary_email.clone(),
            EmailResolution::PrimaryWithoutSchoolEmail,
        ),
        Some(school) if preferred.is_match(school) => {
            (school.clone(), EmailResolution::SchoolEmailPromoted)
        }
        Some(_) => (student.primary_email.clone(), EmailResolution::PrimaryFallback),
    }
}

/// Merges the primary and school email columns into one canonical email.
///
/// # Errors
///
/// [`ReportError::DuplicateEmails`] listing every canonical email claimed by
/// more than one row, with each row's primary email.
#[instrument(skip_all, fields(rows = report.len(), preferred = %preferred))]
pub fn merge_email_columns(report: AssignmentReport, preferred: &Regex) -> Result<IdentityTable> {
    let mut sources = Vec::with_capacity(report.rows.len());
    let rows: Vec<IdentityRow> = report
        .rows
        .into_iter()
        .map(|row| {
            let (email, resolution) = resolve_email(&row.student, preferred);
            if resolution == EmailResolution::PrimaryFallback {
                warn!(
                    primary = %row.student.primary_email,
                    school = row.student.school_email.as_deref().unwrap_or_default(),
                    "Neither email has the preferred format, keeping primary"
                );
            }
            sources.push(row.student.primary_email.clone());
            IdentityRow {
                email,
                resolution,
                student: row.student,
                scores: row.scores,
            }
        })
        .collect();

    ensure_unique(&rows, &sources, ReconcileStage::MergeColumns)?;

    let promoted = rows
        .iter()
        .filter(|r| r.resolution == EmailResolution::SchoolEmailPromoted)
        .count();
    info!(rows = rows.len(), promoted, "Email columns merged");

    Ok(IdentityTable {
        layout: report.layout,
        total_points: report.total_points,
        rows,
    })
}

/// Replaces canonical emails found in `email_map` (alias to canonical).
///
/// # Errors
///
/// [`ReportError::DuplicateEmails`] when the replacement makes two rows share
/// an email; the sources are the emails before replacement.
#[instrument(skip_all, fields(rows = table.len(), aliases = email_map.len()))]
pub fn apply_email_map(
    table: IdentityTable,
    email_map: &HashMap<String, String>,
) -> Result<IdentityTable> {
    let mut sources = Vec::with_capacity(table.rows.len());
    let rows: Vec<IdentityRow> = table
        .rows
        .into_iter()
        .map(|mut row| {
            sources.push(row.email.clone());
            if let Some(canonical) = email_map.get(&row.email) {
                debug!(from = %row.email, to = %canonical, "Replacing email");
                let from = std::mem::replace(&mut row.email, canonical.clone());
                row.resolution = EmailResolution::Remapped { from };
            }
            row
        })
        .collect();

    ensure_unique(&rows, &sources, ReconcileStage::EmailMap)?;

    Ok(IdentityTable {
        layout: table.layout,
        total_points: table.total_points,
        rows,
    })
}

/// Checks every canonical email against `required`.
///
/// # Errors
///
/// A single [`ReportError::InvalidEmails`] listing every failing email with
/// the student's name.
pub fn check_email_format(table: &IdentityTable, required: &Regex) -> Result<()> {
    let invalid: Vec<InvalidEmail> = table
        .rows
        .iter()
        .filter(|r| !required.is_match(&r.email))
        .map(|r| InvalidEmail {
            email: r.email.clone(),
            name: r.student.full_name(),
        })
        .collect();

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ReportError::InvalidEmails(invalid))
    }
}

fn ensure_unique(rows: &[IdentityRow], sources: &[String], stage: ReconcileStage) -> Result<()> {
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let group = groups.entry(row.email.as_str()).or_default();
        if group.is_empty() {
            order.push(row.email.as_str());
        }
        group.push(i);
    }

    let duplicates: Vec<DuplicateEmail> = order
        .into_iter()
        .filter_map(|email| {
            let members = &groups[email];
            (members.len() > 1).then(|| DuplicateEmail {
                email: email.to_string(),
                sources: members.iter().map(|&i| sources[i].clone()).collect(),
            })
        })
        .collect();

    if duplicates.is_empty() {
        Ok(())
    } else {
        Err(ReportError::DuplicateEmails { stage, duplicates })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportRow;

    #[test]
    fn test_resolution_branches() {
        let preferred = school_format();

        let cases = [
            (("a@gmail.com", Some("a@school.edu")), ("a@school.edu", EmailResolution::SchoolEmailPromoted)),
            (("b@school.edu", None), ("b@school.edu", EmailResolution::PrimaryPreferred)),
            (("c@gmail.com", None), ("c@gmail.com", EmailResolution::PrimaryWithoutSchoolEmail)),
            (("d@gmail.com", Some("d@yahoo.com")), ("d@gmail.com", EmailResolution::PrimaryFallback)),
            (("e@school.edu", Some("other@school.edu")), ("e@school.edu", EmailResolution::PrimaryPreferred)),
        ];

        for ((primary, school), (expected, resolution)) in cases {
            let got = resolve_email(&student(primary, school), &preferred);
            assert_eq!(got, (expected.to_string(), resolution), "primary {primary}");
        }
    }

    #[test]
    fn test_merge_email_columns_rekeys_rows() {
        let table = merge_email_columns(
            report(&[("a@gmail.com", Some("a@school.edu")), ("b@school.edu", None)]),
            &school_format(),
        )
        .unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.row("a@school.edu").is_some());
        assert_eq!(table.row("a@school.edu").unwrap().student.primary_email, "a@gmail.com");
        assert!(table.row("b@school.edu").is_some());
        assert_eq!(table.total_points, 100.0);
    }

    #[test]
    fn test_merge_email_columns_reports_both_colliding_rows() {
        let result = merge_email_columns(
            report(&[
                ("a@gmail.com", Some("a@school.edu")),
                ("x@gmail.com", None),
                ("a@school.edu", None),
            ]),
            &school_format(),
        );

        match result {
            Err(ReportError::DuplicateEmails { stage, duplicates }) => {
                assert_eq!(stage, ReconcileStage::MergeColumns);
                assert_eq!(
                    duplicates,
                    vec![DuplicateEmail {
                        email: "a@school.edu".to_string(),
                        sources: vec!["a@gmail.com".to_string(), "a@school.edu".to_string()],
                    }]
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_apply_email_map() {
        let table = merge_email_columns(
            report(&[("old@gmail.com", None), ("b@school.edu", None)]),
            &school_format(),
        )
        .unwrap();
        let map = HashMap::from([("old@gmail.com".to_string(), "new@school.edu".to_string())]);

        let table = apply_email_map(table, &map).unwrap();
        let row = table.row("new@school.edu").unwrap();
        assert_eq!(
            row.resolution,
            EmailResolution::Remapped {
                from: "old@gmail.com".to_string()
            }
        );
        assert!(table.row("old@gmail.com").is_none());
    }

    #[test]
    fn test_apply_email_map_rechecks_uniqueness() {
        let table = merge_email_columns(
            report(&[("old@gmail.com", None), ("b@school.edu", None)]),
            &school_format(),
        )
        .unwrap();
        let map = HashMap::from([("old@gmail.com".to_string(), "b@school.edu".to_string())]);

        match apply_email_map(table, &map) {
            Err(ReportError::DuplicateEmails { stage, duplicates }) => {
                assert_eq!(stage, ReconcileStage::EmailMap);
                assert_eq!(duplicates[0].sources, ["old@gmail.com", "b@school.edu"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_check_email_format_lists_every_offender() {
        let table = merge_email_columns(
            report(&[("a@gmail.com", None), ("b@school.edu", None), ("c@yahoo.com", None)]),
            &school_format(),
        )
        .unwrap();

        assert!(check_email_format(&table, &Regex::new(r"@").unwrap()).is_ok());
        match check_email_format(&table, &school_format()) {
            Err(ReportError::InvalidEmails(invalid)) => {
                assert_eq!(invalid.len(), 2);
                assert_eq!(invalid[0].email, "a@gmail.com");
                assert_eq!(invalid[0].name, "Avery Lee");
                assert_eq!(invalid[1].email, "c@yahoo.com");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    fn school_format() -> Regex {
        Regex::new(r".*@school\.edu$").unwrap()
    }

    fn student(primary: &str, school: Option<&str>) -> Student {
        Student {
            last_name: "Lee".to_string(),
            first_name: "Avery".to_string(),
            primary_email: primary.to_string(),
            school_email: school.map(String::from),
        }
    }

    fn report(rows: &[(&str, Option<&str>)]) -> AssignmentReport {
        AssignmentReport {
            layout: vec![],
            total_points: 100.0,
            rows: rows
                .iter()
                .map(|&(primary, school)| ReportRow {
                    student: student(primary, school),
                    scores: Scores {
                        sections: vec![],
                        total: 0.0,
                        total_percent: 0.0,
                        total_due: None,
                        total_percent_due: None,
                    },
                })
                .collect(),
        }
    }
}
