//! Condition-switched ratings.
//!
//! Conditions are tested in declared order against the independent values
//! (and optionally source rating values). The first match routes the call
//! to its source rating. A source listed after the last condition is the
//! default.

use super::{Condition, Operand, RateContext, RatingHeader, rate_source};
use crate::error::{RatingError, Result};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionalRating {
    pub header: RatingHeader,
    conditions: Vec<Condition>,
    sources: Vec<String>,
}

impl TransitionalRating {
    /// `sources` holds one rating spec id per condition, optionally
    /// followed by a default.
    pub fn new(header: RatingHeader, conditions: Vec<Condition>, sources: Vec<String>) -> Result<Self> {
        let ind_params = header.ind_param_count();
        header.validate(ind_params)?;
        if ind_params == 0 {
            return Err(RatingError::construction(format!(
                "{}: transitional rating needs at least one independent parameter",
                header.rating_spec_id
            )));
        }
        if sources.len() != conditions.len() && sources.len() != conditions.len() + 1 {
            return Err(RatingError::construction(format!(
                "{}: {} source rating(s) for {} condition(s)",
                header.rating_spec_id,
                sources.len(),
                conditions.len()
            )));
        }
        if sources.is_empty() {
            return Err(RatingError::construction(format!(
                "{}: transitional rating has no source ratings",
                header.rating_spec_id
            )));
        }
        if sources.iter().any(|s| *s == header.rating_spec_id) {
            return Err(RatingError::construction(format!(
                "{}: transitional rating lists itself as a source",
                header.rating_spec_id
            )));
        }
        for condition in &conditions {
            for operand in condition.operands() {
                let out_of_range = match operand {
                    Operand::Ind(n) => n > ind_params,
                    Operand::Source(n) => n > sources.len(),
                    Operand::Literal(_) => false,
                };
                if out_of_range {
                    return Err(RatingError::construction(format!(
                        "{}: condition \"{}\" references an unknown operand",
                        header.rating_spec_id, condition
                    )));
                }
            }
        }
        Ok(Self {
            header,
            conditions,
            sources,
        })
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn default_source(&self) -> Option<&str> {
        (self.sources.len() > self.conditions.len())
            .then(|| self.sources[self.sources.len() - 1].as_str())
    }

    /// Index of the source selected for these inputs.
    pub fn select(&self, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<usize> {
        for (i, condition) in self.conditions.iter().enumerate() {
            let mut value = |operand: Operand| match operand {
                Operand::Ind(n) => Ok(ind_values.get(n - 1).copied()),
                Operand::Source(n) => self.rate_source(n - 1, ctx, ind_values),
                Operand::Literal(v) => Ok(Some(v)),
            };
            if condition.test(&mut value)? {
                trace!(spec = %self.header.rating_spec_id, condition = %condition, "transition matched");
                return Ok(i);
            }
        }
        if self.default_source().is_some() {
            return Ok(self.sources.len() - 1);
        }
        Err(RatingError::NoApplicableTransition {
            spec_id: self.header.rating_spec_id.clone(),
        })
    }

    pub fn rate(&self, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>> {
        let index = self.select(ctx, ind_values)?;
        self.rate_source(index, ctx, ind_values)
    }

    fn rate_source(&self, index: usize, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>> {
        rate_source(ctx, &self.header.rating_spec_id, &self.sources[index], ind_values)
    }

    pub fn reverse_rate(&self, _dep_value: f64) -> Result<Option<f64>> {
        Err(RatingError::NotInvertible(format!(
            "{}: transitional ratings cannot be reversed",
            self.header.rating_spec_id
        )))
    }
}
