use std::cell::Cell;
use std::collections::HashMap;
use std::error::Error;

use anyhow::anyhow;
use gradebook_rollup::assignment::Assignment;
use gradebook_rollup::combine::take_best;
use gradebook_rollup::due::{Due, DueDate};
use gradebook_rollup::email::{EmailResolution, merge_email_columns};
use gradebook_rollup::error::ReportError;
use gradebook_rollup::export::{ExportRequest, ExportSource, RawExport};
use gradebook_rollup::section::{Section, SectionId, Sections};
use regex::Regex;

/// Exports keyed by (section id, report name suffix).
#[derive(Default)]
struct MemoryExports {
    files: HashMap<(SectionId, String), (String, String)>,
    requests: Cell<usize>,
}

impl MemoryExports {
    fn add(&mut self, section_id: SectionId, date: &DueDate, csv: String) {
        let suffix = date.report_name_suffix();
        let filename = format!("course_report_{suffix}.csv");
        self.files.insert((section_id, suffix), (filename, csv));
    }

    fn add_named(&mut self, section_id: SectionId, date: &DueDate, filename: &str, csv: String) {
        self.files.insert(
            (section_id, date.report_name_suffix()),
            (filename.to_string(), csv),
        );
    }
}

impl ExportSource for MemoryExports {
    fn export(&self, request: &ExportRequest<'_>) -> anyhow::Result<RawExport> {
        self.requests.set(self.requests.get() + 1);
        let key = (request.section_ids[0], request.date.report_name_suffix());
        let (filename, csv) = self
            .files
            .get(&key)
            .ok_or_else(|| anyhow!("no export for {key:?}"))?;
        Ok(RawExport::from_csv(filename.clone(), csv)?)
    }
}

fn challenge_export(points: u32, students: &[(&str, &str, &str, &str)]) -> String {
    let mut csv = format!(
        "Last name,First name,Primary email,School email,Total ({points}),\
         Participation total (0),Challenge total ({points}),Lab total (0),\
         1.1 - Challenge ({points}),Time spent\n"
    );
    for (name, primary, school, percent) in students {
        csv.push_str(&format!(
            "{name},Student,{primary},{school},{percent},,{percent},,{percent},12\n"
        ));
    }
    csv
}

fn challenge_section(id: SectionId, total_points: f64) -> Section {
    Section {
        id,
        title: format!("Section {id}"),
        total_points,
        include_participation: false,
        include_challenges: true,
        include_labs: false,
    }
}

fn assignment() -> Assignment {
    Assignment {
        id: 55,
        creator_id: None,
        title: "Week 3".to_string(),
        visible: true,
        sections: Sections::new(vec![challenge_section(1, 60.0), challenge_section(2, 40.0)]),
    }
}

fn due_date(day: u32) -> DueDate {
    DueDate::from_components(2024, 1, day, 7, 59, 59, -8 * 60, "PST").unwrap()
}

#[test]
fn test_two_sections_end_to_end() {
    let date = due_date(20);
    let mut exports = MemoryExports::default();
    exports.add(1, &date, challenge_export(60, &[("Lee", "a@gmail.com", "a@school.edu", "50")]));
    exports.add(2, &date, challenge_export(40, &[("Lee", "a@gmail.com", "a@school.edu", "50")]));

    let export = assignment()
        .export_report_by_date(&exports, &date, false)
        .expect("pipeline should succeed");

    assert_eq!(export.filename, "course_report_2024-01-20_0759_PST.csv");
    let report = export.report;
    assert_eq!(report.len(), 1);
    assert_eq!(report.total_points, 100.0);

    let row = report.row("a@gmail.com").unwrap();
    assert_eq!(row.scores.sections[0].total, 30.0);
    assert_eq!(row.scores.sections[1].total, 20.0);
    assert_eq!(row.scores.total, 50.0);
    assert_eq!(row.scores.total_percent, 50.0);
    assert_eq!(row.scores.total_due, None);
    assert_eq!(
        report.score_columns(),
        ["1", "1.chal", "2", "2.chal", "total", "total_percent"]
    );
}

#[test]
fn test_dues_take_best_snapshot() {
    let first = due_date(20);
    let second = due_date(27);
    let mut exports = MemoryExports::default();
    let roster = |a: &'static str| {
        vec![
            ("Lee", "a@gmail.com", "a@school.edu", a),
            ("Patel", "k@school.edu", "", "100"),
        ]
    };
    exports.add(1, &first, challenge_export(60, &roster("50")));
    exports.add(2, &first, challenge_export(40, &roster("50")));
    exports.add(1, &second, challenge_export(60, &roster("75")));
    exports.add(2, &second, challenge_export(40, &roster("25")));

    let dues = vec![
        Due::new(first.clone()),
        Due::with_policy(second.clone(), |p| p * 0.5),
    ];
    let export = assignment()
        .export_report_with_dues(&exports, &dues, false, take_best)
        .unwrap();

    assert_eq!(export.filename, "course_report_2024-01-20_0759_PST.csv");
    let report = export.report;

    let a = report.row("a@gmail.com").unwrap();
    assert_eq!(a.scores.sections[0].total, 45.0);
    assert_eq!(a.scores.sections[0].challenges, Some(45.0));
    assert_eq!(a.scores.sections[1].total, 20.0);
    // best of 50 (first) and 55 (second)
    assert_eq!(a.scores.total, 55.0);
    assert_eq!(a.scores.total_percent, 55.0);
    // best of 50 and 27.5
    assert_eq!(a.scores.total_due, Some(50.0));
    assert_eq!(a.scores.total_percent_due, Some(50.0));

    let k = report.row("k@school.edu").unwrap();
    assert_eq!(k.scores.total, 100.0);
    assert_eq!(k.scores.total_due, Some(100.0));

    let table = merge_email_columns(report, &Regex::new(r".*@school\.edu$").unwrap()).unwrap();
    assert_eq!(
        table.row("a@school.edu").unwrap().resolution,
        EmailResolution::SchoolEmailPromoted
    );
    assert_eq!(
        table.row("k@school.edu").unwrap().resolution,
        EmailResolution::PrimaryPreferred
    );
}

#[test]
fn test_empty_dues_fail_before_exporting() {
    let exports = MemoryExports::default();
    let result = assignment().export_report_with_dues(&exports, &[], false, take_best);

    assert!(matches!(result, Err(ReportError::NoDues)));
    assert_eq!(exports.requests.get(), 0);
}

#[test]
fn test_stale_export_is_rejected() {
    let date = due_date(20);
    let mut exports = MemoryExports::default();
    exports.add_named(
        1,
        &date,
        "course_report_2024-01-13_0759_PST.csv",
        challenge_export(60, &[("Lee", "a@gmail.com", "", "50")]),
    );

    let result = assignment().export_report_by_date(&exports, &date, false);
    assert!(matches!(result, Err(ReportError::MissingTimeSuffix { .. })));
}

#[test]
fn test_missing_export_is_reported_with_section() {
    let date = due_date(20);
    let mut exports = MemoryExports::default();
    exports.add(1, &date, challenge_export(60, &[("Lee", "a@gmail.com", "", "50")]));

    let err = assignment()
        .export_report_by_date(&exports, &date, false)
        .unwrap_err();
    let cause = err.source().map(|s| s.to_string());
    match err {
        ReportError::Export { sections, .. } => assert_eq!(sections, vec![2]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        cause.as_deref(),
        Some("no export for (2, \"2024-01-20_0759_PST\")")
    );
}

#[test]
fn test_roster_mismatch_between_sections_fails() {
    let date = due_date(20);
    let mut exports = MemoryExports::default();
    exports.add(
        1,
        &date,
        challenge_export(
            60,
            &[("Lee", "a@gmail.com", "", "50"), ("Moreno", "j@gmail.com", "", "10")],
        ),
    );
    exports.add(2, &date, challenge_export(40, &[("Lee", "a@gmail.com", "", "50")]));

    let result = assignment().export_report_by_date(&exports, &date, false);
    assert!(matches!(result, Err(ReportError::LostRows { section_id: 2, .. })));
}

#[test]
fn test_section_total_checked_against_export_header() {
    let date = due_date(20);
    let mut exports = MemoryExports::default();
    exports.add(1, &date, challenge_export(50, &[("Lee", "a@gmail.com", "", "50")]));
    exports.add(2, &date, challenge_export(40, &[("Lee", "a@gmail.com", "", "50")]));

    let result = assignment().export_report_by_date(&exports, &date, false);
    assert!(matches!(
        result,
        Err(ReportError::SectionTotalMismatch { section_id: 1, .. })
    ));
}
