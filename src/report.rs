//! Row types shared by the scoring, merging and combining stages.

use serde::Serialize;

use crate::header::Category;
use crate::section::SectionId;

/// Name and email fields of one roster entry, as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Student {
    pub last_name: String,
    pub first_name: String,
    pub primary_email: String,
    pub school_email: Option<String>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Weighted points one student earned in one section.
///
/// Category fields are `Some` exactly for the categories the section counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SectionPoints {
    pub total: f64,
    pub participation: Option<f64>,
    pub challenges: Option<f64>,
    pub labs: Option<f64>,
}

impl SectionPoints {
    pub fn category(&self, category: Category) -> Option<f64> {
        match category {
            Category::Participation => self.participation,
            Category::Challenge => self.challenges,
            Category::Lab => self.labs,
        }
    }

    pub(crate) fn category_mut(&mut self, category: Category) -> &mut Option<f64> {
        match category {
            Category::Participation => &mut self.participation,
            Category::Challenge => &mut self.challenges,
            Category::Lab => &mut self.labs,
        }
    }

    /// Element-wise combination; a category present on one side only keeps
    /// that side's value.
    pub fn combine(&self, other: &SectionPoints, op: impl Fn(f64, f64) -> f64) -> SectionPoints {
        let pick = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => Some(op(a, b)),
            (a, b) => a.or(b),
        };
        SectionPoints {
            total: op(self.total, other.total),
            participation: pick(self.participation, other.participation),
            challenges: pick(self.challenges, other.challenges),
            labs: pick(self.labs, other.labs),
        }
    }
}

/// Which per-section columns a report carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionLayout {
    pub id: SectionId,
    pub categories: Vec<Category>,
}

impl SectionLayout {
    /// Column names in output order: `{id}` then `{id}.part|chal|labs`.
    pub fn column_names(&self) -> Vec<String> {
        std::iter::once(self.id.to_string())
            .chain(
                self.categories
                    .iter()
                    .map(|c| format!("{}.{}", self.id, c.column_suffix())),
            )
            .collect()
    }
}

/// One student's scoring columns across an assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scores {
    /// Aligned with the report's layout.
    pub sections: Vec<SectionPoints>,
    pub total: f64,
    pub total_percent: f64,
    pub total_due: Option<f64>,
    pub total_percent_due: Option<f64>,
}

impl Scores {
    /// Numeric values in the order of [`AssignmentReport::score_columns`].
    pub fn values(&self, layout: &[SectionLayout]) -> Vec<f64> {
        let mut values = Vec::new();
        for (points, section) in self.sections.iter().zip(layout) {
            values.push(points.total);
            values.extend(section.categories.iter().map(|c| points.category(*c).unwrap_or(0.0)));
        }
        values.push(self.total);
        values.push(self.total_percent);
        values.extend(self.total_due);
        values.extend(self.total_percent_due);
        values
    }
}

/// One row of a merged assignment report, keyed by primary email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub student: Student,
    pub scores: Scores,
}

impl ReportRow {
    pub fn key(&self) -> &str {
        &self.student.primary_email
    }
}

/// Per-student weighted scores for one assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentReport {
    pub layout: Vec<SectionLayout>,
    /// Sum of the declared totals of every section.
    pub total_points: f64,
    pub rows: Vec<ReportRow>,
}

impl AssignmentReport {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, primary_email: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|r| r.key() == primary_email)
    }

    /// Whether the due-adjusted totals have been filled in.
    pub fn has_due_columns(&self) -> bool {
        self.rows.iter().any(|r| r.scores.total_due.is_some())
    }

    /// Names of the numeric columns.
    pub fn score_columns(&self) -> Vec<String> {
        score_columns(&self.layout, self.has_due_columns())
    }
}

pub(crate) fn score_columns(layout: &[SectionLayout], with_due: bool) -> Vec<String> {
    let mut names: Vec<String> = layout.iter().flat_map(|s| s.column_names()).collect();
    names.push("total".to_string());
    names.push("total_percent".to_string());
    if with_due {
        names.push("total_due".to_string());
        names.push("total_percent_due".to_string());
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_layout_column_names() {
        let layout = SectionLayout {
            id: 12,
            categories: vec![Category::Participation, Category::Lab],
        };
        assert_eq!(layout.column_names(), ["12", "12.part", "12.labs"]);
    }

    #[test]
    fn test_combine_keeps_one_sided_categories() {
        let a = SectionPoints {
            total: 3.0,
            participation: Some(1.0),
            challenges: Some(2.0),
            labs: None,
        };
        let b = SectionPoints {
            total: 4.0,
            participation: Some(0.5),
            challenges: None,
            labs: None,
        };
        let combined = a.combine(&b, f64::max);
        assert_eq!(combined.total, 4.0);
        assert_eq!(combined.participation, Some(1.0));
        assert_eq!(combined.challenges, Some(2.0));
        assert_eq!(combined.labs, None);
    }

    #[test]
    fn test_score_values_follow_column_order() {
        let layout = vec![SectionLayout {
            id: 7,
            categories: vec![Category::Challenge],
        }];
        let scores = Scores {
            sections: vec![SectionPoints {
                total: 6.0,
                challenges: Some(6.0),
                ..Default::default()
            }],
            total: 6.0,
            total_percent: 60.0,
            total_due: Some(6.0),
            total_percent_due: Some(60.0),
        };
        assert_eq!(
            score_columns(&layout, true),
            ["7", "7.chal", "total", "total_percent", "total_due", "total_percent_due"]
        );
        assert_eq!(scores.values(&layout), [6.0, 6.0, 6.0, 60.0, 6.0, 60.0]);
    }
}
