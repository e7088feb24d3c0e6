//! Due dates and the point policies attached to them.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::report::AssignmentReport;

/// A cut-off instant together with the timezone abbreviation the platform
/// prints in export file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueDate {
    at: DateTime<FixedOffset>,
    tz_abbrev: String,
}

impl DueDate {
    pub fn new(at: DateTime<FixedOffset>, tz_abbrev: impl Into<String>) -> Self {
        Self {
            at,
            tz_abbrev: tz_abbrev.into(),
        }
    }

    /// Builds a due date from local wall-clock components and a UTC offset
    /// in minutes. Returns `None` for an impossible date or offset.
    #[allow(clippy::too_many_arguments)]
    pub fn from_components(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        offset_minutes: i32,
        tz_abbrev: &str,
    ) -> Option<Self> {
        let offset = FixedOffset::east_opt(offset_minutes * 60)?;
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        let at = offset.from_local_datetime(&naive).single()?;
        Some(Self::new(at, tz_abbrev))
    }

    pub fn at(&self) -> DateTime<FixedOffset> {
        self.at
    }

    pub fn tz_abbrev(&self) -> &str {
        &self.tz_abbrev
    }

    /// Offset from UTC in minutes, east positive.
    pub fn offset_minutes(&self) -> i32 {
        self.at.offset().local_minus_utc() / 60
    }

    /// The platform counts offsets west positive.
    pub fn platform_offset_minutes(&self) -> i32 {
        -self.offset_minutes()
    }

    /// `2024-03-08T15:59:59.000Z`
    pub fn utc_timestamp(&self) -> String {
        self.at
            .with_timezone(&Utc)
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string()
    }

    /// Suffix the platform appends to export file names, e.g.
    /// `2024-01-20_0759_PST`.
    pub fn report_name_suffix(&self) -> String {
        format!("{}_{}", self.at.format("%Y-%m-%d_%H%M"), self.tz_abbrev)
    }
}

impl fmt::Display for DueDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (offset {})",
            self.utc_timestamp(),
            self.tz_abbrev,
            self.offset_minutes()
        )
    }
}

pub type DuePolicy = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// A due date plus the transformation applied to a student's totals as of
/// that date (a late penalty, for instance).
pub struct Due {
    date: DueDate,
    policy: DuePolicy,
}

impl Due {
    /// Due date whose policy leaves points unchanged.
    pub fn new(date: DueDate) -> Self {
        Self::with_policy(date, |points| points)
    }

    pub fn with_policy<F>(date: DueDate, policy: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            date,
            policy: Box::new(policy),
        }
    }

    pub fn date(&self) -> &DueDate {
        &self.date
    }

    pub fn apply_policy(&self, points: f64) -> f64 {
        (self.policy)(points)
    }

    /// Fills `total_due` and `total_percent_due` from `total` and
    /// `total_percent`.
    pub fn apply(&self, report: &mut AssignmentReport) {
        for row in &mut report.rows {
            row.scores.total_due = Some(self.apply_policy(row.scores.total));
            row.scores.total_percent_due = Some(self.apply_policy(row.scores.total_percent));
        }
    }
}

impl fmt::Debug for Due {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Due").field("date", &self.date).finish_non_exhaustive()
    }
}
