//! Serialized rating documents.
//!
//! A document holds rating templates, rating specifications and any number
//! of ratings for any number of specifications. The shape mirrors the
//! element names of the CWMS ratings format (`rating-template`,
//! `rating-spec`, `rating`, `usgs-stream-rating`, `virtual-rating`, ...) expressed as JSON.
//!
//! Base-table methods normally come from the template matched through the
//! rating spec. A rating may instead carry `ind-methods` explicitly; shift
//! and offset tables always carry their methods.
//!
//! Round-trip contract: converting a model to a document and back yields a
//! structurally equal model.

mod convert;

use crate::method::AxisMethods;
use crate::rating::VerticalDatumInfo;
use crate::table::{PointGroup, RatingPoint};
use crate::template::{RatingSpec, RatingTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RatingsDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rating_templates: Vec<RatingTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rating_specs: Vec<RatingSpec>,
    #[serde(default)]
    pub ratings: Vec<RatingDoc>,
}

/// One rating version, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RatingDoc {
    Rating(TableRatingDoc),
    UsgsStreamRating(StreamRatingDoc),
    TransitionalRating(TransitionalRatingDoc),
    ExpressionRating(ExpressionRatingDoc),
    VirtualRating(VirtualRatingDoc),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HeaderDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_id: Option<String>,
    pub rating_spec_id: String,
    /// `ind1,ind2;dep`
    pub units_id: String,
    pub effective_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_date: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_datum_info: Option<VerticalDatumInfo>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableRatingDoc {
    #[serde(flatten)]
    pub header: HeaderDoc,
    /// Overrides the template's methods, outermost parameter first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ind_methods: Option<Vec<AxisMethods>>,
    pub rating_points: Vec<PointGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_points: Vec<RatingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StreamRatingDoc {
    #[serde(flatten)]
    pub header: HeaderDoc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ind_methods: Option<Vec<AxisMethods>>,
    pub rating_points: Vec<PointGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_points: Vec<RatingPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_offsets: Option<OffsetsDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub height_shifts: Vec<ShiftDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OffsetsDoc {
    #[serde(default = "offsets_methods")]
    pub methods: AxisMethods,
    pub points: Vec<RatingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ShiftDoc {
    #[serde(flatten)]
    pub header: HeaderDoc,
    #[serde(default = "shift_methods")]
    pub methods: AxisMethods,
    pub points: Vec<RatingPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransitionalRatingDoc {
    #[serde(flatten)]
    pub header: HeaderDoc,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub source_ratings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExpressionRatingDoc {
    #[serde(flatten)]
    pub header: HeaderDoc,
    /// e.g. `3.33 * I2 * I1 ^ 1.5`
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VirtualRatingDoc {
    #[serde(flatten)]
    pub header: HeaderDoc,
    /// Referred to as `R1`, `R2`, ... in `connections`.
    pub source_ratings: Vec<String>,
    pub connections: String,
}

fn offsets_methods() -> AxisMethods {
    AxisMethods::OFFSETS
}

fn shift_methods() -> AxisMethods {
    AxisMethods::SHIFTS
}

impl RatingDoc {
    pub fn header(&self) -> &HeaderDoc {
        match self {
            RatingDoc::Rating(d) => &d.header,
            RatingDoc::UsgsStreamRating(d) => &d.header,
            RatingDoc::TransitionalRating(d) => &d.header,
            RatingDoc::ExpressionRating(d) => &d.header,
            RatingDoc::VirtualRating(d) => &d.header,
        }
    }
}
