//! The platform's course and assignment listings and lookups into them.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::assignment::Assignment;
use crate::error::{ReportError, Result};

/// Rejects a platform response whose `success` flag is not set, carrying
/// the serialized `error` object in the message.
pub fn check_success(response: Value) -> Result<Value> {
    if response.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(response);
    }
    let error = response.get("error").cloned().unwrap_or(Value::Null);
    Err(ReportError::ApiFailure(serde_json::to_string_pretty(&error)?))
}

/// A course the user is enrolled in or teaches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Course {
    #[serde(rename = "zybook_id")]
    pub id: u64,
    #[serde(rename = "zybook_code")]
    pub code: String,
    pub title: String,
}

/// How a course is looked up. Exactly one criterion may be set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CourseSearch<'a> {
    pub id: Option<u64>,
    pub code: Option<&'a str>,
    pub title_keyword: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CourseItems {
    zybooks: Vec<Course>,
}

#[derive(Debug, Deserialize)]
struct CourseListing {
    items: CourseItems,
}

/// Courses listed on the user's dashboard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourseCatalog {
    pub courses: Vec<Course>,
}

impl CourseCatalog {
    /// Parses the JSON body of the dashboard's course listing.
    pub fn from_json(text: &str) -> Result<Self> {
        let response = check_success(serde_json::from_str(text)?)?;
        let listing: CourseListing = serde_json::from_value(response)?;
        debug!(courses = listing.items.zybooks.len(), "Course catalog loaded");
        Ok(Self {
            courses: listing.items.zybooks,
        })
    }

    /// Finds exactly one course by id, by code, or by a keyword in its title.
    ///
    /// # Errors
    ///
    /// More than one or none of the criteria given, several matches, or none.
    pub fn find(&self, search: &CourseSearch<'_>) -> Result<&Course> {
        let (matches, criterion): (Vec<&Course>, &'static str) =
            match (search.id, search.code, search.title_keyword) {
                (None, None, None) => return Err(ReportError::NoSearchParameter),
                (Some(id), None, None) => (
                    self.courses.iter().filter(|c| c.id == id).collect(),
                    "course id",
                ),
                (None, Some(code), None) => (
                    self.courses.iter().filter(|c| c.code == code).collect(),
                    "course code",
                ),
                (None, None, Some(keyword)) => (
                    self.courses
                        .iter()
                        .filter(|c| c.title.contains(keyword))
                        .collect(),
                    "title keyword",
                ),
                _ => {
                    return Err(ReportError::ConflictingSearch(
                        "course id, course code, title keyword",
                    ));
                }
            };

        match matches.as_slice() {
            [] => Err(ReportError::NotFound("course")),
            [only] => Ok(*only),
            _ => Err(ReportError::NotUnique(criterion)),
        }
    }
}

/// Assignments of one course.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AssignmentCatalog {
    pub assignments: Vec<Assignment>,
}

impl AssignmentCatalog {
    /// Parses the JSON body of the course's assignment listing.
    pub fn from_json(text: &str) -> Result<Self> {
        let response = check_success(serde_json::from_str(text)?)?;
        let catalog: Self = serde_json::from_value(response)?;
        debug!(assignments = catalog.assignments.len(), "Assignment catalog loaded");
        Ok(catalog)
    }

    /// Finds exactly one assignment by id or by a keyword in its title.
    ///
    /// # Errors
    ///
    /// Both or neither criteria given, several matches, or none.
    pub fn find(&self, id: Option<u64>, title_keyword: Option<&str>) -> Result<&Assignment> {
        let matches: Vec<&Assignment> = match (id, title_keyword) {
            (Some(_), Some(_)) => {
                return Err(ReportError::ConflictingSearch("assignment id, title keyword"));
            }
            (None, None) => return Err(ReportError::NoSearchParameter),
            (Some(id), None) => self.assignments.iter().filter(|a| a.id == id).collect(),
            (None, Some(keyword)) => self
                .assignments
                .iter()
                .filter(|a| a.title.contains(keyword))
                .collect(),
        };

        match matches.as_slice() {
            [] => Err(ReportError::NotFound("assignment")),
            [only] => Ok(*only),
            _ if id.is_some() => Err(ReportError::NotUnique("assignment id")),
            _ => Err(ReportError::NotUnique("title keyword")),
        }
    }
}
