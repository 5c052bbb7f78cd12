//! Unit handling at the edge of a rating set.
//!
//! The engine never owns conversion tables. Callers inject a
//! `UnitConverter`; the rating set invokes it on independent values before
//! evaluation and on the dependent value afterwards.

use crate::error::{RatingError, Result};
use std::collections::HashMap;

/// Injected unit conversion service.
pub trait UnitConverter: Send + Sync {
    fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64>;
}

/// Accepts only same-unit "conversions".
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityConverter;

impl UnitConverter for IdentityConverter {
    fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64> {
        if from == to {
            Ok(value)
        } else {
            Err(RatingError::UnitConversion {
                from: from.to_string(),
                to: to.to_string(),
                reason: "no conversion service configured".into(),
            })
        }
    }
}

/// Linear conversions of the form `to = from * factor + offset`.
///
/// The inverse direction is derived automatically when it is not
/// registered explicitly.
#[derive(Debug, Clone, Default)]
pub struct FactorConverter {
    entries: HashMap<(String, String), (f64, f64)>,
}

impl FactorConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: &str, to: &str, factor: f64, offset: f64) -> Result<Self> {
        self.insert(from, to, factor, offset)?;
        Ok(self)
    }

    pub fn insert(&mut self, from: &str, to: &str, factor: f64, offset: f64) -> Result<()> {
        if factor == 0.0 || !factor.is_finite() || !offset.is_finite() {
            return Err(RatingError::UnitConversion {
                from: from.to_string(),
                to: to.to_string(),
                reason: format!("invalid factor {} / offset {}", factor, offset),
            });
        }
        self.entries
            .insert((from.to_string(), to.to_string()), (factor, offset));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl UnitConverter for FactorConverter {
    fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64> {
        if from == to {
            return Ok(value);
        }
        if let Some((factor, offset)) = self.entries.get(&(from.to_string(), to.to_string())) {
            return Ok(value * factor + offset);
        }
        if let Some((factor, offset)) = self.entries.get(&(to.to_string(), from.to_string())) {
            return Ok((value - offset) / factor);
        }
        Err(RatingError::UnitConversion {
            from: from.to_string(),
            to: to.to_string(),
            reason: "unknown unit pair".into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Units identifier
// ---------------------------------------------------------------------------

/// Parses a units identifier such as `"ft;cfs"` or `"%,%,%,%;%"` into an
/// ordered list with the dependent unit last.
pub fn parse_units_id(units_id: &str) -> Result<Vec<String>> {
    let (ind, dep) = units_id.split_once(';').ok_or_else(|| {
        RatingError::construction(format!("units id \"{}\" has no ';' separator", units_id))
    })?;
    let mut units: Vec<String> = ind.split(',').map(|u| u.trim().to_string()).collect();
    units.push(dep.trim().to_string());
    if units.iter().any(|u| u.is_empty()) {
        return Err(RatingError::construction(format!(
            "units id \"{}\" contains an empty unit",
            units_id
        )));
    }
    Ok(units)
}

/// Inverse of [`parse_units_id`].
pub fn format_units_id(units: &[String]) -> String {
    match units.split_last() {
        Some((dep, ind)) => format!("{};{}", ind.join(","), dep),
        None => String::new(),
    }
}
