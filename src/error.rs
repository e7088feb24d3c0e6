//! Error types for the report-assembly pipeline.
//!
//! Every variant names a single broken invariant so callers can match on the
//! failure instead of parsing a message.

use std::fmt;

use thiserror::Error;

use crate::header::Category;
use crate::section::SectionId;

/// A singular column the header parser must find exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    LastName,
    FirstName,
    PrimaryEmail,
    SchoolEmail,
    Total,
    CategoryTotal(Category),
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderField::LastName => f.write_str("last name"),
            HeaderField::FirstName => f.write_str("first name"),
            HeaderField::PrimaryEmail => f.write_str("primary email"),
            HeaderField::SchoolEmail => f.write_str("school email"),
            HeaderField::Total => f.write_str("total"),
            HeaderField::CategoryTotal(category) => write!(f, "{category} total"),
        }
    }
}

/// Malformed or ambiguous export headers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("duplicate {0} column")]
    DuplicateColumn(HeaderField),

    #[error("missing {0} column")]
    MissingColumn(HeaderField),

    #[error("total mismatch: header declares {declared}, category totals sum to {sum}")]
    TotalMismatch { declared: f64, sum: f64 },

    #[error("{category} total mismatch: header declares {declared}, items sum to {sum}")]
    CategoryTotalMismatch {
        category: Category,
        declared: f64,
        sum: f64,
    },
}

/// Pipeline stage at which a canonical email collision was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    MergeColumns,
    EmailMap,
}

impl fmt::Display for ReconcileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileStage::MergeColumns => f.write_str("merging the email columns"),
            ReconcileStage::EmailMap => f.write_str("replacing emails by map"),
        }
    }
}

/// One canonical email shared by several rows, with the email each row had before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEmail {
    pub email: String,
    pub sources: Vec<String>,
}

/// A canonical email that failed the required format, with the student's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEmail {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("section {section_id} declares {declared} points but its included categories total {derived}")]
    SectionTotalMismatch {
        section_id: SectionId,
        declared: f64,
        derived: f64,
    },

    #[error("section {section_id}: invalid score {value:?} in column {column} for row {row}")]
    InvalidScore {
        section_id: SectionId,
        row: usize,
        column: String,
        value: String,
    },

    #[error("section {section_id}: row {row} has no primary email")]
    MissingPrimaryEmail { section_id: SectionId, row: usize },

    #[error("section {section_id}: primary email {email} appears more than once")]
    DuplicateKey { section_id: SectionId, email: String },

    #[error("lost rows during merge of section {section_id}: {merged} rows left, expected at least {expected}")]
    LostRows {
        section_id: SectionId,
        merged: usize,
        expected: usize,
    },

    #[error("no section reports to merge")]
    NoSections,

    #[error("no due dates specified")]
    NoDues,

    #[error("due snapshot {due_index} has a different section layout")]
    LayoutMismatch { due_index: usize },

    #[error("due snapshot {due_index} has no row for {email}")]
    MissingSnapshotRow { due_index: usize, email: String },

    #[error("due snapshot {due_index} has a row for {email} missing from the first snapshot")]
    ExtraSnapshotRow { due_index: usize, email: String },

    #[error("expected time suffix {suffix} not found in filename {filename}")]
    MissingTimeSuffix { filename: String, suffix: String },

    #[error("duplicate email after {stage}: {}", list_duplicates(.duplicates))]
    DuplicateEmails {
        stage: ReconcileStage,
        duplicates: Vec<DuplicateEmail>,
    },

    #[error("invalid emails: {}", list_invalid(.0))]
    InvalidEmails(Vec<InvalidEmail>),

    #[error("only one of the search parameters can be specified: {0}")]
    ConflictingSearch(&'static str),

    #[error("no search parameter specified")]
    NoSearchParameter,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} not unique")]
    NotUnique(&'static str),

    #[error("section id {0} not found")]
    UnknownSection(SectionId),

    #[error("API call failed: {0}")]
    ApiFailure(String),

    #[error("export of sections {sections:?} failed")]
    Export {
        sections: Vec<SectionId>,
        #[source]
        source: anyhow::Error,
    },

    #[error("malformed export table: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

fn list_duplicates(duplicates: &[DuplicateEmail]) -> String {
    duplicates
        .iter()
        .map(|d| format!("{} (from {})", d.email, d.sources.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn list_invalid(invalid: &[InvalidEmail]) -> String {
    invalid
        .iter()
        .map(|e| format!("{} ({})", e.email, e.name))
        .collect::<Vec<_>>()
        .join("; ")
}
