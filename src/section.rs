//! Section metadata as delivered by the platform's assignment listing.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ReportError, Result};
use crate::header::{Category, HeaderSchema};

pub type SectionId = u64;

/// A gradable sub-unit of an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "canonical_section_id")]
    pub id: SectionId,
    pub title: String,
    pub total_points: f64,
    #[serde(rename = "include_participations", deserialize_with = "flag")]
    pub include_participation: bool,
    #[serde(deserialize_with = "flag")]
    pub include_challenges: bool,
    #[serde(deserialize_with = "flag")]
    pub include_labs: bool,
}

impl Section {
    pub fn includes(&self, category: Category) -> bool {
        match category {
            Category::Participation => self.include_participation,
            Category::Challenge => self.include_challenges,
            Category::Lab => self.include_labs,
        }
    }

    /// Included categories in canonical order.
    pub fn included_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.includes(*c))
            .collect()
    }

    /// Sum of the declared totals, taken from an export header, of the
    /// categories this section counts.
    pub fn points_from_schema(&self, schema: &HeaderSchema) -> f64 {
        self.included_categories()
            .into_iter()
            .map(|c| schema.category_total(c).points)
            .sum()
    }

    /// Checks the section's declared total against an export header.
    pub fn check_total(&self, schema: &HeaderSchema) -> Result<()> {
        let derived = self.points_from_schema(schema);
        if self.total_points != derived {
            return Err(ReportError::SectionTotalMismatch {
                section_id: self.id,
                declared: self.total_points,
                derived,
            });
        }
        Ok(())
    }
}

/// Ordered sections of one assignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sections(Vec<Section>);

impl Sections {
    pub fn new(sections: Vec<Section>) -> Self {
        Self(sections)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> Vec<SectionId> {
        self.0.iter().map(|s| s.id).collect()
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.0.iter().find(|s| s.id == id)
    }

    pub fn total_points(&self, id: SectionId) -> Result<f64> {
        self.get(id)
            .map(|s| s.total_points)
            .ok_or(ReportError::UnknownSection(id))
    }
}

/// The platform encodes flags either as JSON booleans or as `0`/`1`.
pub(crate) fn flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}
