//! Error taxonomy for the rating engine.
//!
//! Every evaluation failure is surfaced to the caller as a `RatingError`
//! for the specific query that triggered it. A `Null` rating method is not
//! a failure: it produces `Ok(None)` ("undefined") instead.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Which side of a table axis a range violation happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    /// Query sorted before the first independent value.
    Low,
    /// Query sorted after the last independent value.
    High,
    /// Query fell between two rows and the in-range method is `ERROR`.
    InRange,
}

impl fmt::Display for RangeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeBound::Low => write!(f, "below table range"),
            RangeBound::High => write!(f, "above table range"),
            RangeBound::InRange => write!(f, "between table rows"),
        }
    }
}

/// Errors that can arise when building or evaluating ratings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RatingError {
    /// Non-monotonic table, malformed document or missing required field.
    #[error("construction error: {0}")]
    Construction(String),

    /// An `ERROR` rating method was triggered.
    #[error("value {value} is {bound} and the rating method is ERROR")]
    RangeViolation { value: f64, bound: RangeBound },

    /// Reverse evaluation requested on a table that cannot be inverted.
    #[error("rating is not invertible: {0}")]
    NotInvertible(String),

    /// No rating version applies at the requested time.
    #[error("no rating of {spec_id} is effective at {time}")]
    OutOfEffectiveRange { spec_id: String, time: DateTime<Utc> },

    /// No transitional condition matched and no default source exists.
    #[error("no transitional condition of {spec_id} matched the input values")]
    NoApplicableTransition { spec_id: String },

    /// Evaluation attempted before row data was materialised.
    #[error("rating data for {spec_id} is not loaded ({state})")]
    DataNotLoaded { spec_id: String, state: String },

    /// The injected unit conversion service rejected a conversion.
    #[error("cannot convert from '{from}' to '{to}': {reason}")]
    UnitConversion {
        from: String,
        to: String,
        reason: String,
    },

    /// Logarithmic interpolation requested on non-positive values.
    #[error("{method} interpolation requires positive values")]
    LogarithmicDomain { method: String },

    /// A formula produced a non-finite value.
    #[error("formula evaluation failed: {0}")]
    Formula(String),

    /// A transitional or virtual rating names a source missing from the
    /// catalogue.
    #[error("source rating '{0}' was not found")]
    SourceNotFound(String),

    /// Wrong number of independent values for the rating.
    #[error("expected {expected} independent value(s), got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// The serialized document could not be read or written.
    #[error("document error: {0}")]
    Document(String),
}

impl RatingError {
    pub(crate) fn construction(msg: impl Into<String>) -> Self {
        RatingError::Construction(msg.into())
    }
}

impl From<serde_json::Error> for RatingError {
    fn from(err: serde_json::Error) -> Self {
        RatingError::Document(err.to_string())
    }
}

pub type Result<T, E = RatingError> = std::result::Result<T, E>;
