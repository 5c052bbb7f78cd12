//! Materialization strategies for rating sets.
//!
//! A set is created in one of three states and only the lazy one ever
//! changes: `LazyUnloaded` moves to `LazyLoaded` on the first successful
//! `materialize` call. Row data is written once; a racing second load is
//! discarded so every reader sees the same ratings.

use crate::error::{RatingError, Result};
use crate::method::AxisMethods;
use crate::rating::{Rating, RatingHeader, TableRating, UsgsStreamTableRating};
use crate::table::{PointGroup, RatingPoint, RatingTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

// ---------------------------------------------------------------------------
// Strategy and state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    #[default]
    Eager,
    Lazy,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Reference,
    LazyUnloaded,
    LazyLoaded,
    Eager,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Reference => write!(f, "reference"),
            LoadState::LazyUnloaded => write!(f, "lazy, not materialized"),
            LoadState::LazyLoaded => write!(f, "lazy, materialized"),
            LoadState::Eager => write!(f, "eager"),
        }
    }
}

// ---------------------------------------------------------------------------
// Collaborator
// ---------------------------------------------------------------------------

/// External row provider used by lazy sets.
pub trait RatingSource: Send + Sync {
    /// Returns the base-table rows for one rating version.
    fn materialize(&self, rating_id: &str, handle: &str) -> Result<Vec<PointGroup>>;
}

/// Row provider backed by an in-memory map of handle to rows.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: HashMap<String, Vec<PointGroup>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: impl Into<String>, rows: Vec<PointGroup>) {
        self.rows.insert(handle.into(), rows);
    }
}

impl RatingSource for InMemorySource {
    fn materialize(&self, rating_id: &str, handle: &str) -> Result<Vec<PointGroup>> {
        self.rows.get(handle).cloned().ok_or_else(|| {
            RatingError::Document(format!("no rows for {} under handle '{}'", rating_id, handle))
        })
    }
}

// ---------------------------------------------------------------------------
// Pending ratings
// ---------------------------------------------------------------------------

/// Everything about a rating version except its base-table rows.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingBody {
    Table {
        methods: Vec<AxisMethods>,
        extension: Vec<RatingPoint>,
    },
    UsgsStream {
        methods: AxisMethods,
        extension: Vec<RatingPoint>,
        offsets: Option<RatingTable>,
        shifts: Vec<TableRating>,
    },
    /// Ratings with no rows of their own (transitional).
    Complete(Box<Rating>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRating {
    pub header: RatingHeader,
    pub body: PendingBody,
    /// Opaque key handed back to the `RatingSource`.
    pub handle: String,
}

impl PendingRating {
    /// Splits a complete rating into its pending form and its base rows.
    pub fn from_rating(rating: &Rating, handle: impl Into<String>) -> (Self, Vec<PointGroup>) {
        let handle = handle.into();
        let header = rating.header().clone();
        let (body, rows) = match rating {
            Rating::Table(r) => (
                PendingBody::Table {
                    methods: r.table.axis_methods(),
                    extension: r.table.extension_points(),
                },
                r.table.to_point_groups(),
            ),
            Rating::UsgsStream(r) => (
                PendingBody::UsgsStream {
                    methods: r.base.methods(),
                    extension: r.base.extension_points(),
                    offsets: r.offsets.clone(),
                    shifts: r.shifts.clone(),
                },
                r.base.to_point_groups(),
            ),
            Rating::Transitional(_) | Rating::Expression(_) | Rating::Virtual(_) => {
                (PendingBody::Complete(Box::new(rating.clone())), Vec::new())
            }
        };
        (
            Self {
                header,
                body,
                handle,
            },
            rows,
        )
    }

    /// Rebuilds the full rating from delivered rows.
    pub fn build(&self, rows: &[PointGroup]) -> Result<Rating> {
        match &self.body {
            PendingBody::Table { methods, extension } => {
                let table = RatingTable::from_point_groups(rows, methods)?;
                let table = if extension.is_empty() {
                    table
                } else {
                    table.with_extension(extension)?
                };
                Ok(TableRating::new(self.header.clone(), table)?.into())
            }
            PendingBody::UsgsStream {
                methods,
                extension,
                offsets,
                shifts,
            } => {
                let base = RatingTable::from_point_groups(rows, std::slice::from_ref(methods))?
                    .with_extension(extension)?;
                Ok(UsgsStreamTableRating::new(
                    self.header.clone(),
                    base,
                    offsets.clone(),
                    shifts.clone(),
                )?
                .into())
            }
            PendingBody::Complete(rating) => Ok((**rating).clone()),
        }
    }

    fn needs_rows(&self) -> bool {
        !matches!(self.body, PendingBody::Complete(_))
    }
}

// ---------------------------------------------------------------------------
// Set content
// ---------------------------------------------------------------------------

/// Storage behind a rating set, one variant per strategy.
#[derive(Clone)]
pub(crate) enum RatingContent {
    Reference,
    Lazy {
        pending: Vec<PendingRating>,
        source: Arc<dyn RatingSource>,
        loaded: OnceLock<Vec<Rating>>,
    },
    Eager(Vec<Rating>),
}

impl fmt::Debug for RatingContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingContent::Reference => write!(f, "Reference"),
            RatingContent::Lazy { pending, loaded, .. } => f
                .debug_struct("Lazy")
                .field("pending", &pending.len())
                .field("loaded", &loaded.get().map(Vec::len))
                .finish(),
            RatingContent::Eager(ratings) => f.debug_tuple("Eager").field(&ratings.len()).finish(),
        }
    }
}

impl RatingContent {
    pub(crate) fn state(&self) -> LoadState {
        match self {
            RatingContent::Reference => LoadState::Reference,
            RatingContent::Lazy { loaded, .. } if loaded.get().is_some() => LoadState::LazyLoaded,
            RatingContent::Lazy { .. } => LoadState::LazyUnloaded,
            RatingContent::Eager(_) => LoadState::Eager,
        }
    }

    /// Headers in storage order; available before materialization.
    pub(crate) fn headers(&self) -> Vec<&RatingHeader> {
        match self {
            RatingContent::Reference => Vec::new(),
            RatingContent::Lazy { pending, .. } => pending.iter().map(|p| &p.header).collect(),
            RatingContent::Eager(ratings) => ratings.iter().map(Rating::header).collect(),
        }
    }

    pub(crate) fn ratings(&self, spec_id: &str) -> Result<&[Rating]> {
        match self {
            RatingContent::Eager(ratings) => Ok(ratings),
            RatingContent::Lazy { loaded, .. } => loaded.get().map(Vec::as_slice).ok_or_else(|| {
                RatingError::DataNotLoaded {
                    spec_id: spec_id.to_string(),
                    state: self.state().to_string(),
                }
            }),
            RatingContent::Reference => Err(RatingError::DataNotLoaded {
                spec_id: spec_id.to_string(),
                state: self.state().to_string(),
            }),
        }
    }

    /// Fetches and builds every pending rating. Returns `true` when this
    /// call performed the transition.
    pub(crate) fn materialize(&self, spec_id: &str) -> Result<bool> {
        match self {
            RatingContent::Eager(_) => Ok(false),
            RatingContent::Reference => Err(RatingError::DataNotLoaded {
                spec_id: spec_id.to_string(),
                state: "reference sets cannot be materialized".into(),
            }),
            RatingContent::Lazy {
                pending,
                source,
                loaded,
            } => {
                if loaded.get().is_some() {
                    return Ok(false);
                }
                let mut ratings = Vec::with_capacity(pending.len());
                for p in pending {
                    let rows = if p.needs_rows() {
                        source.materialize(spec_id, &p.handle)?
                    } else {
                        Vec::new()
                    };
                    ratings.push(p.build(&rows)?);
                }
                debug!(spec = %spec_id, ratings = ratings.len(), "materialized lazy rating set");
                Ok(loaded.set(ratings).is_ok())
            }
        }
    }
}
