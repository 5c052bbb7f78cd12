//! Rating sets: every version of one rating specification, ordered by
//! effective date.
//!
//! Resolution rule: the applicable rating at time `t` is the active rating
//! with the latest effective date `<= t`; equal effective dates resolve to
//! the one declared last. What happens before the first effective date is
//! governed by `EffectiveDatePolicy`.
//!
//! # Cache
//! Each set memoizes its last resolution together with the half-open
//! window `[effective, next_effective)` in which it stays valid. The cache
//! is private to one set value: cloning a set yields a fresh identity and
//! an empty cache, and materialization clears it. Callers that want to
//! carry a resolution themselves can use [`RatingSet::resolve`] with a
//! [`Resolution`] token; tokens from another set are never trusted.

use crate::catalog::SourceRatings;
use crate::error::{RatingError, Result};
use crate::loading::{LoadState, PendingRating, RatingContent, RatingSource};
use crate::rating::{RateContext, Rating};
use crate::template::{RatingSpec, RatingTemplate};
use crate::units::{IdentityConverter, UnitConverter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Effective-date resolution
// ---------------------------------------------------------------------------

/// What to do with a query time earlier than every effective date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectiveDatePolicy {
    /// Fail with `OutOfEffectiveRange`.
    #[default]
    Fail,
    /// Use the earliest rating.
    UseEarliest,
}

/// Index of the entry applicable at `time` in an ascending list of
/// effective dates. Ties resolve to the last entry.
pub fn resolve_index(
    effective_dates: &[DateTime<Utc>],
    time: DateTime<Utc>,
    policy: EffectiveDatePolicy,
) -> Option<usize> {
    match effective_dates.partition_point(|d| *d <= time) {
        0 if effective_dates.is_empty() => None,
        0 => match policy {
            EffectiveDatePolicy::Fail => None,
            EffectiveDatePolicy::UseEarliest => Some(0),
        },
        n => Some(n - 1),
    }
}

/// A resolved rating plus the time window it is valid for.
///
/// Returned by [`RatingSet::resolve`] and accepted back as a memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    set_id: u64,
    /// Index into [`RatingSet::ratings`].
    pub index: usize,
    /// Inclusive start; `None` means unbounded.
    pub start: Option<DateTime<Utc>>,
    /// Exclusive end; `None` means unbounded.
    pub end: Option<DateTime<Utc>>,
}

impl Resolution {
    pub fn covers(&self, time: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| time >= s) && self.end.is_none_or(|e| time < e)
    }
}

/// One resolvable rating: its effective date and storage index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScheduleEntry {
    effective: DateTime<Utc>,
    index: usize,
}

static NEXT_SET_ID: AtomicU64 = AtomicU64::new(1);

fn next_set_id() -> u64 {
    NEXT_SET_ID.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// RatingSet
// ---------------------------------------------------------------------------

pub struct RatingSet {
    id: u64,
    office_id: Option<String>,
    spec_id: String,
    template: Option<RatingTemplate>,
    spec: Option<RatingSpec>,
    content: RatingContent,
    schedule: Vec<ScheduleEntry>,
    policy: EffectiveDatePolicy,
    rating_time: Option<DateTime<Utc>>,
    data_units: Option<Vec<String>>,
    converter: Arc<dyn UnitConverter>,
    cache: Mutex<Option<Resolution>>,
}

impl RatingSet {
    fn with_content(office_id: Option<String>, spec_id: &str, content: RatingContent) -> Result<Self> {
        if spec_id.trim().is_empty() {
            return Err(RatingError::construction("rating set has no rating-spec-id"));
        }
        if let Some(h) = content.headers().iter().find(|h| h.rating_spec_id != spec_id) {
            return Err(RatingError::construction(format!(
                "rating {} does not belong to set {}",
                h.rating_spec_id, spec_id
            )));
        }
        let mut set = Self {
            id: next_set_id(),
            office_id,
            spec_id: spec_id.to_string(),
            template: None,
            spec: None,
            content,
            schedule: Vec::new(),
            policy: EffectiveDatePolicy::default(),
            rating_time: None,
            data_units: None,
            converter: Arc::new(IdentityConverter),
            cache: Mutex::new(None),
        };
        set.rebuild_schedule();
        debug!(
            spec = %set.spec_id,
            state = %set.state(),
            ratings = set.content.headers().len(),
            "rating set created"
        );
        Ok(set)
    }

    /// Eager set: all row data present.
    pub fn new(office_id: Option<&str>, spec_id: &str, mut ratings: Vec<Rating>) -> Result<Self> {
        ratings.sort_by_key(|r| r.header().effective_date);
        Self::with_content(office_id.map(String::from), spec_id, RatingContent::Eager(ratings))
    }

    /// Lazy set: headers known, rows fetched from `source` on
    /// [`materialize`](Self::materialize).
    pub fn lazy(
        office_id: Option<&str>,
        spec_id: &str,
        mut pending: Vec<PendingRating>,
        source: Arc<dyn RatingSource>,
    ) -> Result<Self> {
        pending.sort_by_key(|p| p.header.effective_date);
        Self::with_content(
            office_id.map(String::from),
            spec_id,
            RatingContent::Lazy {
                pending,
                source,
                loaded: OnceLock::new(),
            },
        )
    }

    /// Reference set: an identifier only, never evaluable.
    pub fn reference(office_id: Option<&str>, spec_id: &str) -> Result<Self> {
        Self::with_content(office_id.map(String::from), spec_id, RatingContent::Reference)
    }

    pub fn with_metadata(mut self, template: Option<RatingTemplate>, spec: Option<RatingSpec>) -> Self {
        self.template = template;
        self.spec = spec;
        self
    }

    pub fn with_policy(mut self, policy: EffectiveDatePolicy) -> Self {
        self.policy = policy;
        self.clear_cache();
        self
    }

    /// Hides ratings created after `rating_time`.
    pub fn with_rating_time(mut self, rating_time: Option<DateTime<Utc>>) -> Self {
        self.rating_time = rating_time;
        self.rebuild_schedule();
        self
    }

    /// Units the caller supplies and expects, dependent unit last.
    pub fn with_data_units(mut self, units: &[&str]) -> Self {
        self.data_units = Some(units.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn UnitConverter>) -> Self {
        self.converter = converter;
        self
    }

    fn rebuild_schedule(&mut self) {
        let rating_time = self.rating_time;
        self.schedule = self
            .content
            .headers()
            .iter()
            .enumerate()
            .filter(|(_, h)| h.active)
            .filter(|(_, h)| match (rating_time, h.create_date) {
                (Some(rt), Some(created)) => created <= rt,
                _ => true,
            })
            .map(|(index, h)| ScheduleEntry {
                effective: h.effective_date,
                index,
            })
            .collect();
        self.clear_cache();
    }

    fn clear_cache(&self) {
        *self.cache.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn office_id(&self) -> Option<&str> {
        self.office_id.as_deref()
    }

    pub fn spec_id(&self) -> &str {
        &self.spec_id
    }

    pub fn template(&self) -> Option<&RatingTemplate> {
        self.template.as_ref()
    }

    pub fn spec(&self) -> Option<&RatingSpec> {
        self.spec.as_ref()
    }

    pub fn state(&self) -> LoadState {
        self.content.state()
    }

    pub fn policy(&self) -> EffectiveDatePolicy {
        self.policy
    }

    pub fn rating_time(&self) -> Option<DateTime<Utc>> {
        self.rating_time
    }

    /// All ratings in effective-date order, or `DataNotLoaded`.
    pub fn ratings(&self) -> Result<&[Rating]> {
        self.content.ratings(&self.spec_id)
    }

    /// Number of versions known to the set, loaded or not.
    pub fn rating_count(&self) -> usize {
        self.content.headers().len()
    }

    pub fn effective_dates(&self) -> Vec<DateTime<Utc>> {
        self.schedule.iter().map(|e| e.effective).collect()
    }

    // -----------------------------------------------------------------------
    // Materialization
    // -----------------------------------------------------------------------

    /// Loads row data for a lazy set. Idempotent; clears the cache when it
    /// performs the transition.
    pub fn materialize(&self) -> Result<()> {
        if self.content.materialize(&self.spec_id)? {
            self.clear_cache();
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn resolve_fresh(&self, time: DateTime<Utc>) -> Result<Resolution> {
        let dates = self.effective_dates();
        let pos = resolve_index(&dates, time, self.policy).ok_or_else(|| {
            RatingError::OutOfEffectiveRange {
                spec_id: self.spec_id.clone(),
                time,
            }
        })?;
        let start = (time >= dates[pos]).then_some(dates[pos]);
        let end = if start.is_some() {
            dates.get(pos + 1).copied()
        } else {
            Some(dates[0])
        };
        Ok(Resolution {
            set_id: self.id,
            index: self.schedule[pos].index,
            start,
            end,
        })
    }

    /// Resolves the rating applicable at `time` without touching the
    /// internal cache. A `memo` from an earlier call on this same set is
    /// reused when its window covers `time`.
    pub fn resolve(&self, time: DateTime<Utc>, memo: Option<&Resolution>) -> Result<Resolution> {
        match memo {
            Some(m) if m.set_id == self.id && m.covers(time) => Ok(m.clone()),
            _ => self.resolve_fresh(time),
        }
    }

    fn resolve_cached(&self, time: DateTime<Utc>) -> Result<usize> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.as_ref().filter(|c| c.covers(time)) {
            trace!(spec = %self.spec_id, index = hit.index, "rating cache hit");
            return Ok(hit.index);
        }
        let fresh = self.resolve_fresh(time)?;
        trace!(spec = %self.spec_id, index = fresh.index, "rating cache miss");
        let index = fresh.index;
        *cache = Some(fresh);
        Ok(index)
    }

    /// The rating applicable at `time`.
    pub fn rating_at(&self, time: DateTime<Utc>) -> Result<&Rating> {
        let ratings = self.ratings()?;
        let index = self.resolve_cached(time)?;
        Ok(&ratings[index])
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    pub fn rate(&self, time: DateTime<Utc>, ind_values: &[f64]) -> Result<Option<f64>> {
        self.rate_with(time, ind_values, None)
    }

    /// Like [`rate`](Self::rate) with a catalogue for transitional sources.
    pub fn rate_with(
        &self,
        time: DateTime<Utc>,
        ind_values: &[f64],
        sources: Option<&dyn SourceRatings>,
    ) -> Result<Option<f64>> {
        let ctx = RateContext {
            time,
            sources,
            chain: None,
        };
        self.rate_in(&ctx, ind_values)
    }

    /// Like [`rate`](Self::rate) at `ctx.time`, keeping the catalogue and
    /// delegation chain of an enclosing evaluation.
    pub fn rate_in(&self, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>> {
        let rating = self.rating_at(ctx.time)?;
        let units = &rating.header().units;
        let expected = rating.ind_param_count();
        if ind_values.len() != expected {
            return Err(RatingError::ParameterCount {
                expected,
                actual: ind_values.len(),
            });
        }
        let data_units = self.data_units_for(units)?;
        let converted = match data_units {
            Some(data) => ind_values
                .iter()
                .enumerate()
                .map(|(i, v)| self.converter.convert(*v, &data[i], &units[i]))
                .collect::<Result<Vec<f64>>>()?,
            None => ind_values.to_vec(),
        };
        let value = rating.rate(ctx, &converted)?;
        match (value, data_units) {
            (Some(y), Some(data)) => self
                .converter
                .convert(y, &units[expected], &data[expected])
                .map(Some),
            (value, _) => Ok(value),
        }
    }

    /// Evaluates `(times[i], values[i])` pairs in order. The first error
    /// fails the whole batch.
    pub fn rate_batch(&self, times: &[DateTime<Utc>], values: &[Vec<f64>]) -> Result<Vec<Option<f64>>> {
        if times.len() != values.len() {
            return Err(RatingError::construction(format!(
                "{} times supplied for {} value sets",
                times.len(),
                values.len()
            )));
        }
        times
            .iter()
            .zip(values)
            .map(|(t, v)| self.rate(*t, v))
            .collect()
    }

    /// Solves for the independent value producing `dep_value` at `time`.
    pub fn reverse_rate(&self, time: DateTime<Utc>, dep_value: f64) -> Result<Option<f64>> {
        let rating = self.rating_at(time)?;
        let units = &rating.header().units;
        if rating.ind_param_count() != 1 {
            return Err(RatingError::NotInvertible(format!(
                "{} has {} independent parameters",
                self.spec_id,
                rating.ind_param_count()
            )));
        }
        let data_units = self.data_units_for(units)?;
        let dep = match data_units {
            Some(data) => self.converter.convert(dep_value, &data[1], &units[1])?,
            None => dep_value,
        };
        let value = rating.reverse_rate(&RateContext::at(time), dep)?;
        match (value, data_units) {
            (Some(x), Some(data)) => self.converter.convert(x, &units[0], &data[0]).map(Some),
            (value, _) => Ok(value),
        }
    }

    /// Min / max of every parameter of the rating applicable at `time`, in
    /// the rating's own units.
    pub fn extents(&self, time: DateTime<Utc>) -> Result<Option<(Vec<f64>, Vec<f64>)>> {
        Ok(self.rating_at(time)?.extents())
    }

    fn data_units_for(&self, rating_units: &[String]) -> Result<Option<&[String]>> {
        match &self.data_units {
            None => Ok(None),
            Some(data) if data.len() == rating_units.len() => Ok(Some(data.as_slice())),
            Some(data) => Err(RatingError::ParameterCount {
                expected: rating_units.len(),
                actual: data.len(),
            }),
        }
    }
}

impl Clone for RatingSet {
    /// The clone is a distinct set: new identity, empty cache.
    fn clone(&self) -> Self {
        Self {
            id: next_set_id(),
            office_id: self.office_id.clone(),
            spec_id: self.spec_id.clone(),
            template: self.template.clone(),
            spec: self.spec.clone(),
            content: self.content.clone(),
            schedule: self.schedule.clone(),
            policy: self.policy,
            rating_time: self.rating_time,
            data_units: self.data_units.clone(),
            converter: Arc::clone(&self.converter),
            cache: Mutex::new(None),
        }
    }
}

impl PartialEq for RatingSet {
    /// Structural equality; identity, cache and collaborators are ignored.
    fn eq(&self, other: &Self) -> bool {
        self.office_id == other.office_id
            && self.spec_id == other.spec_id
            && self.template == other.template
            && self.spec == other.spec
            && self.state() == other.state()
            && self.ratings().ok() == other.ratings().ok()
    }
}

impl fmt::Debug for RatingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RatingSet")
            .field("spec_id", &self.spec_id)
            .field("office_id", &self.office_id)
            .field("content", &self.content)
            .field("policy", &self.policy)
            .field("rating_time", &self.rating_time)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::{AxisMethods, RatingMethod};
    use crate::rating::{RatingHeader, TableRating};
    use crate::table::RatingTable;
    use crate::units::FactorConverter;
    use chrono::{Duration, TimeZone};

    const SPEC: &str = "ELDR.Elev;Area.Linear.Step";

    fn t(year: i32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap()
    }

    fn version(effective: DateTime<Utc>, scale: f64) -> Rating {
        let header = RatingHeader::new("SWT", SPEC, &["ft", "acre"], effective);
        let table = RatingTable::from_pairs(
            &[(0.0, 0.0), (10.0, 10.0 * scale)],
            AxisMethods::new(RatingMethod::Linear, RatingMethod::Null, RatingMethod::Null),
        )
        .unwrap();
        TableRating::new(header, table).unwrap().into()
    }

    fn three_versions() -> RatingSet {
        RatingSet::new(
            Some("SWT"),
            SPEC,
            vec![version(t(2010), 2.0), version(t(2000), 1.0), version(t(2020), 3.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_index_rules() {
        let dates = [t(2000), t(2010), t(2010), t(2020)];
        assert_eq!(resolve_index(&dates, t(1999), EffectiveDatePolicy::Fail), None);
        assert_eq!(resolve_index(&dates, t(1999), EffectiveDatePolicy::UseEarliest), Some(0));
        assert_eq!(resolve_index(&dates, t(2000), EffectiveDatePolicy::Fail), Some(0));
        assert_eq!(resolve_index(&dates, t(2010), EffectiveDatePolicy::Fail), Some(2), "ties go to the last declared");
        assert_eq!(resolve_index(&dates, t(2030), EffectiveDatePolicy::Fail), Some(3));
        assert_eq!(resolve_index(&[], t(2030), EffectiveDatePolicy::UseEarliest), None);
    }

    #[test]
    fn test_versions_selected_by_time() {
        let set = three_versions();
        assert_eq!(set.rate(t(2005), &[5.0]).unwrap(), Some(5.0));
        assert_eq!(set.rate(t(2015), &[5.0]).unwrap(), Some(10.0));
        assert_eq!(set.rate(t(2025), &[5.0]).unwrap(), Some(15.0));
    }

    #[test]
    fn test_transition_start_date_does_not_blend() {
        let mut late = version(t(2010), 2.0);
        if let Rating::Table(r) = &mut late {
            r.header.transition_start_date = Some(t(2005));
        }
        let set = RatingSet::new(Some("SWT"), SPEC, vec![version(t(2000), 1.0), late]).unwrap();
        assert_eq!(set.rate(t(2007), &[5.0]).unwrap(), Some(5.0), "older version until the effective date");
        assert_eq!(set.rate(t(2010), &[5.0]).unwrap(), Some(10.0));
    }

    #[test]
    fn test_before_first_effective_date() {
        let set = three_versions();
        assert!(matches!(
            set.rate(t(1990), &[5.0]).unwrap_err(),
            RatingError::OutOfEffectiveRange { .. }
        ));
        let lenient = set.with_policy(EffectiveDatePolicy::UseEarliest);
        assert_eq!(lenient.rate(t(1990), &[5.0]).unwrap(), Some(5.0));
        // the pre-history window must not leak into the first version's window
        assert_eq!(lenient.rate(t(2012), &[5.0]).unwrap(), Some(10.0));
    }

    #[test]
    fn test_cache_matches_fresh_resolution_in_any_order() {
        let set = three_versions();
        let times = [t(2025), t(2005), t(2015), t(2015), t(2005), t(2020), t(2019)];
        for time in times {
            let warm = set.rate(time, &[5.0]).unwrap();
            let cold = three_versions().rate(time, &[5.0]).unwrap();
            assert_eq!(warm, cold, "cached result differs at {}", time);
        }
    }

    #[test]
    fn test_memo_token_reused_only_within_window_and_set() {
        let set = three_versions();
        let first = set.resolve(t(2012), None).unwrap();
        assert_eq!(first.start, Some(t(2010)));
        assert_eq!(first.end, Some(t(2020)));
        let again = set.resolve(t(2013), Some(&first)).unwrap();
        assert_eq!(again, first);
        let moved = set.resolve(t(2021), Some(&first)).unwrap();
        assert_ne!(moved.index, first.index);

        let other = RatingSet::new(Some("SWT"), SPEC, vec![version(t(2000), 7.0)]).unwrap();
        let foreign = other.resolve(t(2013), Some(&first)).unwrap();
        assert_eq!(foreign.index, 0, "a token from another set must be ignored");
        assert_eq!(foreign.end, None);
    }

    #[test]
    fn test_clone_gets_independent_cache() {
        let set = three_versions();
        set.rate(t(2015), &[5.0]).unwrap();
        let copy = set.clone();
        let token = set.resolve(t(2015), None).unwrap();
        assert_eq!(copy.resolve(t(2015), Some(&token)).unwrap().set_id, copy.id);
        assert_eq!(copy, set, "clones stay structurally equal");
    }

    #[test]
    fn test_inactive_versions_skipped() {
        let mut hidden = version(t(2010), 2.0);
        if let Rating::Table(r) = &mut hidden {
            r.header.active = false;
        }
        let set = RatingSet::new(None, SPEC, vec![version(t(2000), 1.0), hidden]).unwrap();
        assert_eq!(set.rate(t(2015), &[5.0]).unwrap(), Some(5.0));
        assert_eq!(set.rating_count(), 2);
        assert_eq!(set.effective_dates(), vec![t(2000)]);
    }

    #[test]
    fn test_rating_time_hides_later_creations() {
        let mut late = version(t(2010), 2.0);
        if let Rating::Table(r) = &mut late {
            r.header.create_date = Some(t(2012));
        }
        let set = RatingSet::new(None, SPEC, vec![version(t(2000), 1.0), late]).unwrap();
        assert_eq!(set.rate(t(2015), &[5.0]).unwrap(), Some(10.0));
        let as_of_2011 = set.with_rating_time(Some(t(2011)));
        assert_eq!(as_of_2011.rate(t(2015), &[5.0]).unwrap(), Some(5.0));
    }

    #[test]
    fn test_batch_matches_single_calls_and_fails_fast() {
        let set = three_versions();
        let times = vec![t(2025), t(2005), t(2015)];
        let values = vec![vec![5.0], vec![5.0], vec![5.0]];
        let batch = set.rate_batch(&times, &values).unwrap();
        let single: Vec<_> = times
            .iter()
            .zip(&values)
            .map(|(time, v)| three_versions().rate(*time, v).unwrap())
            .collect();
        assert_eq!(batch, single);

        let bad_times = vec![t(2005), t(1990), t(2015)];
        assert!(set.rate_batch(&bad_times, &values).is_err());
        assert!(set.rate_batch(&times[..2], &values).is_err(), "length mismatch");
    }

    #[test]
    fn test_unit_conversion_around_evaluation() {
        let conv = FactorConverter::new()
            .with("m", "ft", 2.0, 0.0)
            .unwrap()
            .with("acre", "ha", 0.5, 0.0)
            .unwrap();
        let set = three_versions()
            .with_data_units(&["m", "ha"])
            .with_converter(Arc::new(conv));
        // 2.5 m -> 5 ft -> 5 acre -> 2.5 ha
        assert_eq!(set.rate(t(2005), &[2.5]).unwrap(), Some(2.5));
        assert_eq!(set.reverse_rate(t(2005), 2.5).unwrap(), Some(2.5));
    }

    #[test]
    fn test_unknown_unit_conversion_fails() {
        let set = three_versions().with_data_units(&["m", "acre"]);
        assert!(matches!(
            set.rate(t(2005), &[1.0]).unwrap_err(),
            RatingError::UnitConversion { .. }
        ));
    }

    #[test]
    fn test_foreign_rating_rejected() {
        let header = RatingHeader::new("SWT", "OTHER.Elev;Area.Linear.Step", &["ft", "acre"], t(2000));
        let table = RatingTable::from_pairs(&[(0.0, 0.0)], AxisMethods::default()).unwrap();
        let foreign: Rating = TableRating::new(header, table).unwrap().into();
        assert!(RatingSet::new(None, SPEC, vec![foreign]).is_err());
    }

    #[test]
    fn test_reference_set_reports_data_not_loaded() {
        let set = RatingSet::reference(Some("SWT"), SPEC).unwrap();
        assert_eq!(set.state(), LoadState::Reference);
        assert!(matches!(
            set.rate(t(2005), &[1.0]).unwrap_err(),
            RatingError::DataNotLoaded { .. }
        ));
        assert!(set.materialize().is_err());
    }

    #[test]
    fn test_extents_at_time() {
        let set = three_versions();
        let (mins, maxs) = set.extents(t(2015) + Duration::days(1)).unwrap().unwrap();
        assert_eq!(mins, vec![0.0, 0.0]);
        assert_eq!(maxs, vec![10.0, 20.0]);
    }
}
