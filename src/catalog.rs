//! Rating catalogue: rating sets keyed by rating spec id.
//!
//! Transitional and virtual ratings name their sources by spec id; the
//! catalogue is what resolves those names at evaluation time. Source
//! references must not form a cycle: [`RatingCatalog::check_source_graph`]
//! rejects one among loaded sets, and evaluation refuses to re-enter a
//! rating already on the delegation chain.

use crate::error::{RatingError, Result};
use crate::rating::RateContext;
use crate::set::RatingSet;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Resolves a source rating by spec id and evaluates it.
///
/// `ctx` carries the value time and the delegation chain; implementations
/// hand it on to [`RatingSet::rate_in`].
pub trait SourceRatings {
    fn rate_source(&self, spec_id: &str, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>>;
}

#[derive(Debug, Clone, Default)]
pub struct RatingCatalog {
    sets: HashMap<String, RatingSet>,
}

impl RatingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the set for its spec id.
    pub fn insert(&mut self, set: RatingSet) -> Option<RatingSet> {
        self.sets.insert(set.spec_id().to_string(), set)
    }

    /// Looks up a set by spec id. Returns `None` if not found.
    pub fn get(&self, spec_id: &str) -> Option<&RatingSet> {
        self.sets.get(spec_id)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Spec ids in sorted order.
    pub fn spec_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.sets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Rates through the named set, resolving transitional and virtual
    /// sources against this catalogue.
    pub fn rate(&self, spec_id: &str, time: DateTime<Utc>, ind_values: &[f64]) -> Result<Option<f64>> {
        self.rate_source(spec_id, &RateContext::at(time), ind_values)
    }

    /// Fails with a construction error when the source references of the
    /// loaded sets form a cycle. Unloaded sets and unknown ids are skipped;
    /// evaluation still guards against them.
    pub fn check_source_graph(&self) -> Result<()> {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        for (spec_id, set) in &self.sets {
            let Ok(ratings) = set.ratings() else {
                continue;
            };
            let targets = edges.entry(spec_id.as_str()).or_default();
            for source in ratings.iter().flat_map(|r| r.source_ids()) {
                if !targets.contains(&source.as_str()) {
                    targets.push(source.as_str());
                }
            }
        }
        let mut done = HashSet::new();
        let mut path = Vec::new();
        for spec_id in self.spec_ids() {
            visit(spec_id, &edges, &mut done, &mut path)?;
        }
        Ok(())
    }

    /// Materializes every lazy set. Reference sets are skipped.
    pub fn materialize_all(&self) -> Result<()> {
        for set in self.sets.values() {
            if set.state() != crate::loading::LoadState::Reference {
                set.materialize()?;
            }
        }
        Ok(())
    }
}

fn visit<'a>(
    spec_id: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    done: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Result<()> {
    if done.contains(spec_id) {
        return Ok(());
    }
    if let Some(pos) = path.iter().position(|p| *p == spec_id) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(spec_id);
        return Err(RatingError::construction(format!(
            "circular source reference: {}",
            cycle.join(" -> ")
        )));
    }
    path.push(spec_id);
    for target in edges.get(spec_id).into_iter().flatten() {
        visit(*target, edges, done, path)?;
    }
    path.pop();
    done.insert(spec_id);
    Ok(())
}

impl SourceRatings for RatingCatalog {
    fn rate_source(&self, spec_id: &str, ctx: &RateContext<'_>, ind_values: &[f64]) -> Result<Option<f64>> {
        let set = self
            .get(spec_id)
            .ok_or_else(|| RatingError::SourceNotFound(spec_id.to_string()))?;
        set.rate_in(&ctx.with_sources(self), ind_values)
    }
}
