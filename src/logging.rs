/// Structured logging for the rating engine.
///
/// The engine itself only emits `tracing` events (cache hits at trace,
/// set construction and materialization at debug/info). This module is
/// for the embedding application: it installs a subscriber with an
/// optional log file and offers helpers that classify and log rating
/// failures with the spec id attached.

use crate::error::RatingError;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Table,
    Set,
    Loading,
    Document,
    Catalog,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Table => write!(f, "TABLE"),
            Component::Set => write!(f, "SET"),
            Component::Loading => write!(f, "LOAD"),
            Component::Document => write!(f, "DOC"),
            Component::Catalog => write!(f, "CAT"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// The query fell outside what the rating defines (range, time, transition)
    Expected,
    /// Malformed data, missing collaborators or caller misuse
    Unexpected,
    /// Cannot tell without more context
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber setup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{value}'")]
    Filter {
        value: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("logging already initialised: {0}")]
    Subscriber(String),
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `min_level` when set. With `log_file` the output is
/// appended to that file without ANSI colours.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&str>,
    console_timestamps: bool,
) -> Result<(), LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(min_level.as_filter()).map_err(|source| LoggingError::Filter {
            value: min_level.as_filter().to_string(),
            source,
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact();

    let installed = match (log_file, console_timestamps) {
        (Some(path), _) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.to_string(),
                    source,
                })?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        (None, true) => builder.try_init(),
        (None, false) => builder.without_time().try_init(),
    };
    installed.map_err(|e| LoggingError::Subscriber(e.to_string()))?;
    info(
        Component::System,
        None,
        &format!("logging initialised at {}", min_level),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

pub fn info(component: Component, spec_id: Option<&str>, message: &str) {
    tracing::info!(component = %component, spec = spec_id.unwrap_or("-"), "{}", message);
}

pub fn warn(component: Component, spec_id: Option<&str>, message: &str) {
    tracing::warn!(component = %component, spec = spec_id.unwrap_or("-"), "{}", message);
}

pub fn error(component: Component, spec_id: Option<&str>, message: &str) {
    tracing::error!(component = %component, spec = spec_id.unwrap_or("-"), "{}", message);
}

pub fn debug(component: Component, spec_id: Option<&str>, message: &str) {
    tracing::debug!(component = %component, spec = spec_id.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

pub fn classify_failure(err: &RatingError) -> FailureType {
    match err {
        RatingError::RangeViolation { .. }
        | RatingError::OutOfEffectiveRange { .. }
        | RatingError::NoApplicableTransition { .. } => FailureType::Expected,
        RatingError::Construction(_)
        | RatingError::Document(_)
        | RatingError::UnitConversion { .. }
        | RatingError::SourceNotFound(_)
        | RatingError::ParameterCount { .. }
        | RatingError::DataNotLoaded { .. } => FailureType::Unexpected,
        RatingError::NotInvertible(_)
        | RatingError::LogarithmicDomain { .. }
        | RatingError::Formula(_) => FailureType::Unknown,
    }
}

/// The component a failure most likely originated in.
pub fn component_of(err: &RatingError) -> Component {
    match err {
        RatingError::RangeViolation { .. }
        | RatingError::NotInvertible(_)
        | RatingError::LogarithmicDomain { .. }
        | RatingError::Formula(_)
        | RatingError::ParameterCount { .. } => Component::Table,
        RatingError::OutOfEffectiveRange { .. } | RatingError::UnitConversion { .. } => Component::Set,
        RatingError::DataNotLoaded { .. } => Component::Loading,
        RatingError::Construction(_) | RatingError::Document(_) => Component::Document,
        RatingError::NoApplicableTransition { .. } | RatingError::SourceNotFound(_) => Component::Catalog,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a rating failure with automatic classification.
pub fn log_rating_failure(spec_id: &str, operation: &str, err: &RatingError) {
    let failure_type = classify_failure(err);
    let component = component_of(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(component, Some(spec_id), &message),
        FailureType::Unexpected => error(component, Some(spec_id), &message),
        FailureType::Unknown => warn(component, Some(spec_id), &message),
    }
}
