//! Rating variants.
//!
//! Every kind of rating shares one header and one evaluation contract:
//!
//! * plain table ratings
//! * USGS-style stream ratings (base table corrected by offsets and dated
//!   shifts)
//! * transitional ratings that pick a source rating by condition
//! * expression ratings computed from a formula
//! * virtual ratings that chain source ratings through connections
//!
//! They are modelled as a sum type; each variant owns its payload outright.
//! Transitional and virtual ratings reach their sources through the
//! catalogue in [`RateContext`].

pub mod condition;
pub mod expression;
pub mod stream;
pub mod table_rating;
pub mod transitional;
pub mod virtual_rating;

pub use condition::{Comparison, Condition, Operand};
pub use expression::{ExpressionRating, Formula};
pub use stream::UsgsStreamTableRating;
pub use table_rating::TableRating;
pub use transitional::TransitionalRating;
pub use virtual_rating::{Connections, VirtualRating};

use crate::catalog::SourceRatings;
use crate::error::{RatingError, Result};
use crate::units::format_units_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Shared header
// ---------------------------------------------------------------------------

/// Offset from the native vertical datum to another datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatumOffset {
    pub to_datum: String,
    pub value: f64,
    #[serde(default)]
    pub estimate: bool,
}

/// Vertical datum metadata carried by elevation ratings. Not used in
/// evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VerticalDatumInfo {
    pub native_datum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offsets: Vec<DatumOffset>,
}

/// Fields common to every rating variant.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingHeader {
    pub office_id: Option<String>,
    pub rating_spec_id: String,
    /// Independent units in parameter order, dependent unit last.
    pub units: Vec<String>,
    pub effective_date: DateTime<Utc>,
    /// Start of the blending period before `effective_date`. Carried as
    /// metadata only; resolution always switches at `effective_date`.
    pub transition_start_date: Option<DateTime<Utc>>,
    pub create_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub description: Option<String>,
    pub vertical_datum: Option<VerticalDatumInfo>,
}

impl RatingHeader {
    /// An active header with no optional metadata.
    pub fn new(
        office_id: &str,
        rating_spec_id: &str,
        units: &[&str],
        effective_date: DateTime<Utc>,
    ) -> Self {
        Self {
            office_id: Some(office_id.to_string()),
            rating_spec_id: rating_spec_id.to_string(),
            units: units.iter().map(|u| u.to_string()).collect(),
            effective_date,
            transition_start_date: None,
            create_date: None,
            active: true,
            description: None,
            vertical_datum: None,
        }
    }

    pub fn units_id(&self) -> String {
        format_units_id(&self.units)
    }

    pub fn ind_param_count(&self) -> usize {
        self.units.len().saturating_sub(1)
    }

    pub fn dep_unit(&self) -> &str {
        self.units.last().map(String::as_str).unwrap_or_default()
    }

    pub(crate) fn validate(&self, ind_params: usize) -> Result<()> {
        if self.rating_spec_id.trim().is_empty() {
            return Err(RatingError::construction("rating has no rating-spec-id"));
        }
        if self.units.len() != ind_params + 1 {
            return Err(RatingError::construction(format!(
                "{}: units \"{}\" do not match {} independent parameter(s)",
                self.rating_spec_id,
                self.units_id(),
                ind_params
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation context
// ---------------------------------------------------------------------------

/// Per-call inputs beyond the independent values themselves.
#[derive(Clone, Copy)]
pub struct RateContext<'a> {
    /// Value time; selects stream-rating shifts and transitional sources.
    pub time: DateTime<Utc>,
    /// Catalogue for transitional and virtual source ratings.
    pub sources: Option<&'a dyn SourceRatings>,
    /// Ratings currently delegating to a source, innermost first.
    pub chain: Option<&'a SourceChain<'a>>,
}

impl<'a> RateContext<'a> {
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            sources: None,
            chain: None,
        }
    }

    pub fn with_sources(mut self, sources: &'a dyn SourceRatings) -> Self {
        self.sources = Some(sources);
        self
    }
}

/// One link of the delegation chain carried through source evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SourceChain<'a> {
    pub spec_id: &'a str,
    pub parent: Option<&'a SourceChain<'a>>,
}

impl SourceChain<'_> {
    pub fn contains(&self, spec_id: &str) -> bool {
        let mut link = Some(self);
        while let Some(l) = link {
            if l.spec_id == spec_id {
                return true;
            }
            link = l.parent;
        }
        false
    }

    /// Spec ids from the outermost caller inwards.
    pub fn path(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut link = Some(self);
        while let Some(l) = link {
            ids.push(l.spec_id);
            link = l.parent;
        }
        ids.reverse();
        ids
    }
}

/// Evaluates source rating `spec_id` on behalf of `caller`. A source that
/// is already delegating further up the chain is a circular reference.
pub(crate) fn rate_source(
    ctx: &RateContext<'_>,
    caller: &str,
    spec_id: &str,
    ind_values: &[f64],
) -> Result<Option<f64>> {
    let catalog = ctx
        .sources
        .ok_or_else(|| RatingError::SourceNotFound(spec_id.to_string()))?;
    let link = SourceChain {
        spec_id: caller,
        parent: ctx.chain,
    };
    if link.contains(spec_id) {
        return Err(RatingError::construction(format!(
            "circular source reference: {} -> {}",
            link.path().join(" -> "),
            spec_id
        )));
    }
    let inner = RateContext {
        time: ctx.time,
        sources: Some(catalog),
        chain: Some(&link),
    };
    catalog.rate_source(spec_id, &inner, ind_values)
}

// ---------------------------------------------------------------------------
// Sum type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Rating {
    Table(TableRating),
    UsgsStream(UsgsStreamTableRating),
    Transitional(TransitionalRating),
    Expression(ExpressionRating),
    Virtual(VirtualRating),
}

impl Rating {
    pub fn header(&self) -> &RatingHeader {
        match self {
            Rating::Table(r) => &r.header,
            Rating::UsgsStream(r) => &r.header,
            Rating::Transitional(r) => &r.header,
            Rating::Expression(r) => &r.header,
            Rating::Virtual(r) => &r.header,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rating::Table(_) => "rating",
            Rating::UsgsStream(_) => "usgs-stream-rating",
            Rating::Transitional(_) => "transitional-rating",
            Rating::Expression(_) => "expression-rating",
            Rating::Virtual(_) => "virtual-rating",
        }
    }

    /// Spec ids of the source ratings this rating delegates to.
    pub fn source_ids(&self) -> &[String] {
        match self {
            Rating::Transitional(r) => r.sources(),
            Rating::Virtual(r) => r.sources(),
            _ => &[],
        }
    }

    pub fn ind_param_count(&self) -> usize {
        self.header().ind_param_count()
    }

    /// Forward evaluation. `Ok(None)` means undefined.
    pub fn rate(&self, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>> {
        let expected = self.ind_param_count();
        if ind_values.len() != expected {
            return Err(RatingError::ParameterCount {
                expected,
                actual: ind_values.len(),
            });
        }
        match self {
            Rating::Table(r) => r.rate(ind_values),
            Rating::UsgsStream(r) => r.rate(ctx.time, ind_values[0]),
            Rating::Transitional(r) => r.rate(ctx, ind_values),
            Rating::Expression(r) => r.rate(ind_values),
            Rating::Virtual(r) => r.rate(ctx, ind_values),
        }
    }

    /// Solves for the (single) independent value producing `dep_value`.
    pub fn reverse_rate(&self, ctx: &RateContext<'_>, dep_value: f64) -> Result<Option<f64>> {
        match self {
            Rating::Table(r) => r.reverse_rate(dep_value),
            Rating::UsgsStream(r) => r.reverse_rate(ctx.time, dep_value),
            Rating::Transitional(r) => r.reverse_rate(dep_value),
            Rating::Expression(r) => r.reverse_rate(dep_value),
            Rating::Virtual(r) => r.reverse_rate(dep_value),
        }
    }

    /// Min / max of every parameter; `None` for ratings without tables.
    pub fn extents(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        match self {
            Rating::Table(r) => Some(r.table.extents()),
            Rating::UsgsStream(r) => Some(r.base.extents()),
            Rating::Transitional(_) | Rating::Expression(_) | Rating::Virtual(_) => None,
        }
    }
}

impl From<TableRating> for Rating {
    fn from(r: TableRating) -> Self {
        Rating::Table(r)
    }
}

impl From<UsgsStreamTableRating> for Rating {
    fn from(r: UsgsStreamTableRating) -> Self {
        Rating::UsgsStream(r)
    }
}

impl From<TransitionalRating> for Rating {
    fn from(r: TransitionalRating) -> Self {
        Rating::Transitional(r)
    }
}

impl From<ExpressionRating> for Rating {
    fn from(r: ExpressionRating) -> Self {
        Rating::Expression(r)
    }
}

impl From<VirtualRating> for Rating {
    fn from(r: VirtualRating) -> Self {
        Rating::Virtual(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::AxisMethods;
    use crate::table::RatingTable;
    use chrono::TimeZone;

    #[test]
    fn test_header_units_id_and_counts() {
        let t = Utc.with_ymd_and_hms(2004, 1, 1, 6, 0, 0).unwrap();
        let header = RatingHeader::new("SWT", "ELDR.Elev;Area.Linear.Step", &["ft", "acre"], t);
        assert_eq!(header.units_id(), "ft;acre");
        assert_eq!(header.ind_param_count(), 1);
        assert_eq!(header.dep_unit(), "acre");
        assert!(header.validate(2).is_err(), "unit count must match parameter count");
    }

    #[test]
    fn test_rating_checks_parameter_count() {
        let t = Utc.with_ymd_and_hms(2004, 1, 1, 6, 0, 0).unwrap();
        let header = RatingHeader::new("SWT", "A.Elev;Area.Linear.Step", &["ft", "acre"], t);
        let table = RatingTable::from_pairs(&[(0.0, 0.0), (1.0, 1.0)], AxisMethods::default()).unwrap();
        let rating: Rating = TableRating::new(header, table).unwrap().into();
        let err = rating.rate(&RateContext::at(t), &[0.5, 0.5]).unwrap_err();
        assert_eq!(
            err,
            RatingError::ParameterCount {
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(rating.kind(), "rating");
    }
}
