use anyhow::{Context, Result, bail};
use chrono::DateTime;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::catalog::CourseSearch;
use crate::combine::take_best;
use crate::due::{Due, DueDate};

/// One report-assembly run.
///
/// Stored as JSON on disk:
/// ```json
/// {
///   "course": { "catalog": "courses.json", "code": "CS101Spring2024" },
///   "catalog": "assignments.json",
///   "assignment_title": "Week 2",
///   "combine": "max",
///   "dues": [
///     { "date": "2024-01-20T07:59:00-08:00", "time_zone": "PST" },
///     { "date": "2024-01-27T07:59:00-08:00", "time_zone": "PST",
///       "policy": { "kind": "scale", "factor": 0.5 } }
///   ],
///   "preferred_email_format": "@school\\.edu$",
///   "email_map": { "alias@gmail.com": "student@school.edu" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Optional course check against the dashboard listing.
    #[serde(default)]
    pub course: Option<CourseConfig>,
    /// Path of the assignment listing, relative to the config file.
    pub catalog: PathBuf,
    #[serde(default)]
    pub assignment_id: Option<u64>,
    #[serde(default)]
    pub assignment_title: Option<String>,
    #[serde(default)]
    pub include_time_spent: bool,
    #[serde(default)]
    pub combine: CombinePolicy,
    pub dues: Vec<DueConfig>,
    pub preferred_email_format: String,
    #[serde(default)]
    pub required_email_format: Option<String>,
    #[serde(default)]
    pub email_map: HashMap<String, String>,
}

impl RunConfig {
    /// Loads the config from a JSON file at `path`; relative catalog paths
    /// are resolved against the file's directory.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{path}'"))?;
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid config '{path}'"))?;

        if let Some(dir) = std::path::Path::new(path).parent() {
            if config.catalog.is_relative() {
                config.catalog = dir.join(&config.catalog);
            }
            if let Some(course) = config.course.as_mut().filter(|c| c.catalog.is_relative()) {
                course.catalog = dir.join(&course.catalog);
            }
        }
        Ok(config)
    }

    pub fn dues(&self) -> Result<Vec<Due>> {
        self.dues.iter().map(DueConfig::to_due).collect()
    }

    pub fn preferred_email_regex(&self) -> Result<Regex> {
        Regex::new(&self.preferred_email_format).context("invalid preferred_email_format")
    }

    pub fn required_email_regex(&self) -> Result<Option<Regex>> {
        self.required_email_format
            .as_deref()
            .map(|p| Regex::new(p).context("invalid required_email_format"))
            .transpose()
    }
}

/// Which course the run belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseConfig {
    /// Path of the course listing, relative to the config file.
    pub catalog: PathBuf,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl CourseConfig {
    pub fn search(&self) -> CourseSearch<'_> {
        CourseSearch {
            id: self.id,
            code: self.code.as_deref(),
            title_keyword: self.title.as_deref(),
        }
    }
}

/// How due snapshots are folded together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinePolicy {
    /// Best score across snapshots.
    #[default]
    Max,
    Min,
    /// The latest snapshot wins.
    Last,
}

impl CombinePolicy {
    pub fn op(self) -> fn(f64, f64) -> f64 {
        match self {
            CombinePolicy::Max => take_best,
            CombinePolicy::Min => f64::min,
            CombinePolicy::Last => |_, next| next,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DueConfig {
    /// RFC 3339 timestamp with offset.
    pub date: String,
    /// Abbreviation the platform prints in export names, e.g. `PST`.
    pub time_zone: String,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum PolicyConfig {
    #[default]
    Identity,
    Scale {
        factor: f64,
    },
}

impl DueConfig {
    pub fn to_due(&self) -> Result<Due> {
        let at = DateTime::parse_from_rfc3339(&self.date)
            .with_context(|| format!("invalid due date '{}'", self.date))?;
        if self.time_zone.trim().is_empty() {
            bail!("due date '{}' has no time zone abbreviation", self.date);
        }
        let date = DueDate::new(at, self.time_zone.trim());

        Ok(match self.policy {
            PolicyConfig::Identity => Due::new(date),
            PolicyConfig::Scale { factor } => Due::with_policy(date, move |points| points * factor),
        })
    }
}
