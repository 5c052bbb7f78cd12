//! Rating curve evaluation engine.
//!
//! Converts independent hydrologic parameter values (stage, elevation,
//! gate opening, ...) into a dependent value (flow, storage, area, ...)
//! through dated, versioned rating tables.

pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod loading;
pub mod logging;
pub mod method;
pub mod rating;
pub mod set;
pub mod table;
pub mod template;
pub mod units;

pub use catalog::{RatingCatalog, SourceRatings};
pub use config::{ConfigError, EngineConfig};
pub use document::RatingsDocument;
pub use error::{RangeBound, RatingError, Result};
pub use loading::{InMemorySource, LoadState, LoadStrategy, RatingSource};
pub use method::{AxisMethods, RatingMethod};
pub use rating::{
    ExpressionRating, Formula, RateContext, Rating, RatingHeader, TableRating, TransitionalRating,
    UsgsStreamTableRating, VirtualRating,
};
pub use set::{EffectiveDatePolicy, RatingSet, Resolution};
pub use table::{PointGroup, RatingPoint, RatingTable};
pub use units::{FactorConverter, IdentityConverter, UnitConverter};
