//! Schema inference for exported report headers.
//!
//! An activity export names its columns freely, e.g.
//!
//! ```text
//! Last name, First name, Primary email, School email,
//! Total (52), Participation total (36), Challenge total (16), Lab total (0),
//! 1.1 - Participation (21), 1.2 - Participation (15),
//! 1.1 - Challenge (3), 1.2 - Challenge (13)
//! ```
//!
//! [`HeaderSchema::parse`] locates every column the pipeline needs and checks
//! that the declared point totals add up.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{HeaderField, SchemaError};

/// Grading sub-category of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Participation,
    Challenge,
    Lab,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Participation, Category::Challenge, Category::Lab];

    /// Suffix of the per-section column holding this category's points.
    pub fn column_suffix(self) -> &'static str {
        match self {
            Category::Participation => "part",
            Category::Challenge => "chal",
            Category::Lab => "labs",
        }
    }

    fn slot(self) -> usize {
        match self {
            Category::Participation => 0,
            Category::Challenge => 1,
            Category::Lab => 2,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Participation => "participation",
            Category::Challenge => "challenge",
            Category::Lab => "lab",
        })
    }
}

/// A column carrying a declared point value in its header.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointsColumn {
    pub index: usize,
    pub points: f64,
}

/// A per-activity column such as `1.2 - Challenge (13)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemColumn {
    pub index: usize,
    pub label: String,
    pub points: f64,
}

/// Column positions and declared points recognized in one export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderSchema {
    pub last_name: usize,
    pub first_name: usize,
    pub primary_email: usize,
    pub school_email: usize,
    pub total: PointsColumn,
    category_totals: [PointsColumn; 3],
    items: [Vec<ItemColumn>; 3],
}

/// Student identity columns, which carry no point value.
#[derive(Debug, Clone, Copy, PartialEq)]
enum IdentityField {
    LastName,
    FirstName,
    PrimaryEmail,
    SchoolEmail,
}

impl From<IdentityField> for HeaderField {
    fn from(field: IdentityField) -> Self {
        match field {
            IdentityField::LastName => HeaderField::LastName,
            IdentityField::FirstName => HeaderField::FirstName,
            IdentityField::PrimaryEmail => HeaderField::PrimaryEmail,
            IdentityField::SchoolEmail => HeaderField::SchoolEmail,
        }
    }
}

/// Result of classifying a single header.
#[derive(Debug, Clone, PartialEq)]
enum HeaderMatch {
    Field(IdentityField),
    Total(f64),
    CategoryTotal(Category, f64),
    Item(Category, String, f64),
}

#[derive(Debug, Clone, Copy)]
enum MatchKind {
    Field(IdentityField),
    Total,
    CategoryTotal(Category),
    Item(Category),
}

/// Ordered matchers; the first one that accepts a header wins.
static MATCHERS: LazyLock<Vec<(Regex, MatchKind)>> = LazyLock::new(|| {
    let rules: [(&str, MatchKind); 11] = [
        (r"^last\s+name$", MatchKind::Field(IdentityField::LastName)),
        (r"^first\s+name$", MatchKind::Field(IdentityField::FirstName)),
        (r"^school\s+email$", MatchKind::Field(IdentityField::SchoolEmail)),
        (r"^primary\s+email$", MatchKind::Field(IdentityField::PrimaryEmail)),
        (r"^total\s*\((\d+)\)$", MatchKind::Total),
        (
            r"^participation\s+total\s*\((\d+)\)$",
            MatchKind::CategoryTotal(Category::Participation),
        ),
        (
            r"^challenge\s+total\s*\((\d+)\)$",
            MatchKind::CategoryTotal(Category::Challenge),
        ),
        (
            r"^lab\s+total\s*\((\d+)\)$",
            MatchKind::CategoryTotal(Category::Lab),
        ),
        (
            r"^([0-9.]+)\s*-\s*participation\s*\((\d+)\)$",
            MatchKind::Item(Category::Participation),
        ),
        (
            r"^([0-9.]+)\s*-\s*challenge\s*\((\d+)\)$",
            MatchKind::Item(Category::Challenge),
        ),
        (
            r"^([0-9.]+)\s*-\s*lab\s*\((\d+)\)$",
            MatchKind::Item(Category::Lab),
        ),
    ];

    rules
        .into_iter()
        .map(|(pattern, kind)| {
            let regex = Regex::new(&format!("(?i){pattern}")).expect("static header pattern");
            (regex, kind)
        })
        .collect()
});

fn classify(header: &str) -> Option<HeaderMatch> {
    let header = header.trim_start_matches('\u{feff}').trim();

    for (regex, kind) in MATCHERS.iter() {
        let Some(caps) = regex.captures(header) else {
            continue;
        };
        let points = |group: usize| {
            caps.get(group)
                .and_then(|m| m.as_str().parse::<f64>().ok())
                .unwrap_or(0.0)
        };

        return Some(match *kind {
            MatchKind::Field(field) => HeaderMatch::Field(field),
            MatchKind::Total => HeaderMatch::Total(points(1)),
            MatchKind::CategoryTotal(category) => HeaderMatch::CategoryTotal(category, points(1)),
            MatchKind::Item(category) => {
                HeaderMatch::Item(category, caps[1].to_string(), points(2))
            }
        });
    }

    None
}

fn place<T>(slot: &mut Option<T>, value: T, field: HeaderField) -> Result<(), SchemaError> {
    if slot.is_some() {
        return Err(SchemaError::DuplicateColumn(field));
    }
    *slot = Some(value);
    Ok(())
}

fn require<T>(slot: Option<T>, field: HeaderField) -> Result<T, SchemaError> {
    slot.ok_or(SchemaError::MissingColumn(field))
}

impl HeaderSchema {
    /// Builds the schema from an export's header row.
    ///
    /// Headers are matched case-insensitively with surrounding whitespace
    /// ignored; their order and count are irrelevant. Unrecognized headers
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] naming the first broken invariant: a duplicate
    /// or missing singular column, a grand total that differs from the sum of
    /// the category totals, or a category whose items do not sum to its total.
    pub fn parse<S: AsRef<str>>(headers: &[S]) -> Result<Self, SchemaError> {
        let mut last_name = None;
        let mut first_name = None;
        let mut primary_email = None;
        let mut school_email = None;
        let mut total = None;
        let mut category_totals: [Option<PointsColumn>; 3] = [None; 3];
        let mut items: [Vec<ItemColumn>; 3] = Default::default();

        for (index, header) in headers.iter().enumerate() {
            let Some(matched) = classify(header.as_ref()) else {
                debug!(index, header = header.as_ref(), "Ignoring unrecognized header");
                continue;
            };

            match matched {
                HeaderMatch::Field(field) => {
                    let slot = match field {
                        IdentityField::LastName => &mut last_name,
                        IdentityField::FirstName => &mut first_name,
                        IdentityField::PrimaryEmail => &mut primary_email,
                        IdentityField::SchoolEmail => &mut school_email,
                    };
                    place(slot, index, field.into())?;
                }
                HeaderMatch::Total(points) => {
                    place(&mut total, PointsColumn { index, points }, HeaderField::Total)?;
                }
                HeaderMatch::CategoryTotal(category, points) => {
                    place(
                        &mut category_totals[category.slot()],
                        PointsColumn { index, points },
                        HeaderField::CategoryTotal(category),
                    )?;
                }
                HeaderMatch::Item(category, label, points) => {
                    items[category.slot()].push(ItemColumn {
                        index,
                        label,
                        points,
                    });
                }
            }
        }

        let last_name = require(last_name, HeaderField::LastName)?;
        let first_name = require(first_name, HeaderField::FirstName)?;
        let primary_email = require(primary_email, HeaderField::PrimaryEmail)?;
        let school_email = require(school_email, HeaderField::SchoolEmail)?;

        let total = require(total, HeaderField::Total)?;
        let [part, chal, labs] = category_totals;
        let category_totals = [
            require(part, HeaderField::CategoryTotal(Category::Participation))?,
            require(chal, HeaderField::CategoryTotal(Category::Challenge))?,
            require(labs, HeaderField::CategoryTotal(Category::Lab))?,
        ];

        let sum: f64 = category_totals.iter().map(|c| c.points).sum();
        if sum != total.points {
            return Err(SchemaError::TotalMismatch {
                declared: total.points,
                sum,
            });
        }

        for category in Category::ALL {
            let declared = category_totals[category.slot()].points;
            let sum: f64 = items[category.slot()].iter().map(|i| i.points).sum();
            if sum != declared {
                return Err(SchemaError::CategoryTotalMismatch {
                    category,
                    declared,
                    sum,
                });
            }
        }

        let schema = HeaderSchema {
            last_name,
            first_name,
            primary_email,
            school_email,
            total,
            category_totals,
            items,
        };
        debug!(
            total = schema.total.points,
            participation = schema.category_total(Category::Participation).points,
            challenge = schema.category_total(Category::Challenge).points,
            lab = schema.category_total(Category::Lab).points,
            "Parsed report header"
        );
        Ok(schema)
    }

    /// The `<Category> total (N)` column.
    pub fn category_total(&self, category: Category) -> PointsColumn {
        self.category_totals[category.slot()]
    }

    /// Per-activity columns of a category, in header order.
    pub fn items(&self, category: Category) -> &[ItemColumn] {
        &self.items[category.slot()]
    }
}
