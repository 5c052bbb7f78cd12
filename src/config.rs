/// Engine configuration.
///
/// Read from a TOML file named by `RATING_ENGINE_CONFIG` (a `.env` file is
/// honoured). Every section is optional:
///
/// ```toml
/// [resolution]
/// before_first = "use-earliest"
///
/// [logging]
/// level = "debug"
/// file = "rating_engine.log"
/// timestamps = false
///
/// [[units.conversions]]
/// from = "ft"
/// to = "m"
/// factor = 0.3048
/// ```

use crate::error::RatingError;
use crate::logging::{LogLevel, LoggingError, init_logger};
use crate::set::{EffectiveDatePolicy, RatingSet};
use crate::units::FactorConverter;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "RATING_ENGINE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub resolution: ResolutionConfig,
    pub logging: LoggingConfig,
    pub units: UnitsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolutionConfig {
    pub before_first: EffectiveDatePolicy,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnitsConfig {
    pub conversions: Vec<ConversionEntry>,
}

/// `to = from * factor + offset`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionEntry {
    pub from: String,
    pub to: String,
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str::<EngineConfig>(content)?)
    }

    /// Loads the file named by `RATING_ENGINE_CONFIG`, or defaults when the
    /// variable is unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()),
            _ => Ok(Self::default()),
        }
    }

    pub fn policy(&self) -> EffectiveDatePolicy {
        self.resolution.before_first
    }

    pub fn unit_converter(&self) -> Result<FactorConverter, ConfigError> {
        let mut converter = FactorConverter::new();
        for entry in &self.units.conversions {
            converter
                .insert(&entry.from, &entry.to, entry.factor, entry.offset)
                .map_err(|e: RatingError| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(converter)
    }

    pub fn init_logging(&self) -> Result<(), LoggingError> {
        init_logger(
            self.logging.level,
            self.logging.file.as_deref(),
            self.logging.timestamps,
        )
    }

    /// Applies the resolution policy and, when conversions are configured,
    /// the unit converter to `set`.
    pub fn configure(&self, set: RatingSet) -> Result<RatingSet, ConfigError> {
        let set = set.with_policy(self.policy());
        if self.units.conversions.is_empty() {
            return Ok(set);
        }
        Ok(set.with_converter(Arc::new(self.unit_converter()?)))
    }
}
