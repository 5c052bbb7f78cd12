//! USGS-style stream ratings: a stage/flow base table corrected by a
//! stage offsets mapping and a collection of dated shift tables.
//!
//! Forward order for a value `v` at time `t`:
//!
//! 1. `v' = offsets(v)` (or `v` when there is no offsets table)
//! 2. shift = the shift effective at `t`, evaluated at `v'` (0 when none)
//! 3. result = `base(v') + shift`

use super::{RatingHeader, TableRating};
use crate::error::{RatingError, Result};
use crate::set::{EffectiveDatePolicy, resolve_index};
use crate::table::RatingTable;
use chrono::{DateTime, Utc};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub struct UsgsStreamTableRating {
    pub header: RatingHeader,
    /// Base table; extension rows live on the table itself.
    pub base: RatingTable,
    pub offsets: Option<RatingTable>,
    /// Shift ratings, ordered by effective date.
    pub shifts: Vec<TableRating>,
}

impl UsgsStreamTableRating {
    pub fn new(
        header: RatingHeader,
        base: RatingTable,
        offsets: Option<RatingTable>,
        mut shifts: Vec<TableRating>,
    ) -> Result<Self> {
        header.validate(base.ind_param_count())?;
        if base.ind_param_count() != 1 {
            return Err(RatingError::construction(format!(
                "{}: stream ratings take exactly one independent parameter",
                header.rating_spec_id
            )));
        }
        if offsets.as_ref().is_some_and(|o| o.ind_param_count() != 1) {
            return Err(RatingError::construction(format!(
                "{}: offsets table must have one independent parameter",
                header.rating_spec_id
            )));
        }
        if let Some(bad) = shifts.iter().find(|s| s.table.ind_param_count() != 1) {
            return Err(RatingError::construction(format!(
                "{}: shift {} must have one independent parameter",
                header.rating_spec_id, bad.header.effective_date
            )));
        }
        shifts.sort_by_key(|s| s.header.effective_date);
        Ok(Self {
            header,
            base,
            offsets,
            shifts,
        })
    }

    /// The active shift effective at `time`, if any.
    pub fn shift_at(&self, time: DateTime<Utc>) -> Option<&TableRating> {
        let active: Vec<&TableRating> = self.shifts.iter().filter(|s| s.header.active).collect();
        let dates: Vec<DateTime<Utc>> = active.iter().map(|s| s.header.effective_date).collect();
        resolve_index(&dates, time, EffectiveDatePolicy::Fail).map(|i| active[i])
    }

    pub fn rate(&self, time: DateTime<Utc>, value: f64) -> Result<Option<f64>> {
        let corrected = match &self.offsets {
            Some(offsets) => match offsets.rate(&[value])? {
                Some(v) => v,
                None => return Ok(None),
            },
            None => value,
        };
        let shift = match self.shift_at(time) {
            Some(shift) => match shift.table.rate(&[corrected])? {
                Some(s) => s,
                None => return Ok(None),
            },
            None => 0.0,
        };
        trace!(
            spec = %self.header.rating_spec_id,
            value,
            corrected,
            shift,
            "stream rating corrections"
        );
        Ok(self.base.rate(&[corrected])?.map(|base| base + shift))
    }

    /// Inverts offsets, base and shift together.
    ///
    /// With a shift in effect, `base + shift` is sampled at the union of
    /// the base and shift breakpoints and reversed with the base table's
    /// methods. The offsets mapping is then reversed on its own.
    pub fn reverse_rate(&self, time: DateTime<Utc>, dep_value: f64) -> Result<Option<f64>> {
        let corrected = match self.shift_at(time) {
            None => self.base.reverse_rate(dep_value)?,
            Some(shift) => self.shifted_base(&shift.table)?.reverse_rate(dep_value)?,
        };
        match (corrected, &self.offsets) {
            (Some(v), Some(offsets)) => offsets.reverse_rate(v),
            (corrected, _) => Ok(corrected),
        }
    }

    fn shifted_base(&self, shift: &RatingTable) -> Result<RatingTable> {
        let mut breakpoints = self.base.independent_values();
        breakpoints.extend(shift.independent_values());
        breakpoints.sort_by(f64::total_cmp);
        breakpoints.dedup();

        // every breakpoint must rate forward, or the inverse would answer
        // for stages the forward rating rejects
        let mut pairs = Vec::with_capacity(breakpoints.len());
        for x in breakpoints {
            match (self.base.rate(&[x])?, shift.rate(&[x])?) {
                (Some(base), Some(delta)) => pairs.push((x, base + delta)),
                _ => {
                    return Err(RatingError::NotInvertible(format!(
                        "{}: shifted base is undefined at {}",
                        self.header.rating_spec_id, x
                    )));
                }
            }
        }
        RatingTable::from_pairs(&pairs, self.base.methods())
    }
}
