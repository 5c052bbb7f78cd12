//! Rating methods: the interpolation / extrapolation policy of a table axis.
//!
//! Each axis of a rating table carries three method selections: one for
//! queries that fall between two rows and one for each side of the table.
//! This module holds the method enumeration and the numeric kernels shared
//! by forward and reverse lookups; the row search itself lives in
//! `crate::table`.

use crate::error::{RatingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Rating method
// ---------------------------------------------------------------------------

/// The twelve named rating behaviours.
///
/// `Previous` / `Next` / `Nearest` select by row position, `Lower` /
/// `Higher` / `Closest` by dependent value. Serialized with the names used
/// in rating documents (`"LIN-LOG"`, `"NEAREST"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RatingMethod {
    Null,
    Error,
    Linear,
    Logarithmic,
    LinLog,
    LogLin,
    Previous,
    Next,
    Nearest,
    Lower,
    Higher,
    Closest,
}

impl RatingMethod {
    pub const ALL: [RatingMethod; 12] = [
        RatingMethod::Null,
        RatingMethod::Error,
        RatingMethod::Linear,
        RatingMethod::Logarithmic,
        RatingMethod::LinLog,
        RatingMethod::LogLin,
        RatingMethod::Previous,
        RatingMethod::Next,
        RatingMethod::Nearest,
        RatingMethod::Lower,
        RatingMethod::Higher,
        RatingMethod::Closest,
    ];

    /// Name used in rating documents.
    pub fn name(self) -> &'static str {
        match self {
            RatingMethod::Null => "NULL",
            RatingMethod::Error => "ERROR",
            RatingMethod::Linear => "LINEAR",
            RatingMethod::Logarithmic => "LOGARITHMIC",
            RatingMethod::LinLog => "LIN-LOG",
            RatingMethod::LogLin => "LOG-LIN",
            RatingMethod::Previous => "PREVIOUS",
            RatingMethod::Next => "NEXT",
            RatingMethod::Nearest => "NEAREST",
            RatingMethod::Lower => "LOWER",
            RatingMethod::Higher => "HIGHER",
            RatingMethod::Closest => "CLOSEST",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RatingMethod::Null => "Return null if between values or outside range",
            RatingMethod::Error => "Raise an error if between values or outside range",
            RatingMethod::Linear => {
                "Linear interpolation or extrapolation of independent and dependent values"
            }
            RatingMethod::Logarithmic => {
                "Logarithmic interpolation or extrapolation of independent and dependent values"
            }
            RatingMethod::LinLog => {
                "Linear interpolation/extrapolation of independent values, logarithmic of dependent values"
            }
            RatingMethod::LogLin => {
                "Logarithmic interpolation/extrapolation of independent values, linear of dependent values"
            }
            RatingMethod::Previous => "Return the value that is lower in position",
            RatingMethod::Next => "Return the value that is higher in position",
            RatingMethod::Nearest => "Return the value that is nearest in position",
            RatingMethod::Lower => "Return the value that is lower in magnitude",
            RatingMethod::Higher => "Return the value that is higher in magnitude",
            RatingMethod::Closest => "Return the value that is closest in magnitude",
        }
    }

    /// True for the methods that compute a value from a pair of rows.
    pub fn is_interpolating(self) -> bool {
        matches!(
            self,
            RatingMethod::Linear
                | RatingMethod::Logarithmic
                | RatingMethod::LinLog
                | RatingMethod::LogLin
        )
    }

    /// The method to use once independent and dependent axes are swapped.
    pub fn swapped_axes(self) -> RatingMethod {
        match self {
            RatingMethod::LinLog => RatingMethod::LogLin,
            RatingMethod::LogLin => RatingMethod::LinLog,
            other => other,
        }
    }

    fn log_independent(self) -> bool {
        matches!(self, RatingMethod::Logarithmic | RatingMethod::LogLin)
    }

    fn log_dependent(self) -> bool {
        matches!(self, RatingMethod::Logarithmic | RatingMethod::LinLog)
    }
}

impl fmt::Display for RatingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RatingMethod {
    type Err = RatingError;

    /// Case-insensitive; accepts `LIN_LOG` as well as `LIN-LOG`.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('_', "-");
        RatingMethod::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| RatingError::construction(format!("\"{}\" is not a valid rating method", s)))
    }
}

impl TryFrom<String> for RatingMethod {
    type Error = RatingError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RatingMethod> for String {
    fn from(method: RatingMethod) -> Self {
        method.name().to_string()
    }
}

// ---------------------------------------------------------------------------
// Axis configuration
// ---------------------------------------------------------------------------

/// The in-range / out-of-range method triple carried by one table axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AxisMethods {
    pub in_range: RatingMethod,
    pub out_range_low: RatingMethod,
    pub out_range_high: RatingMethod,
}

impl AxisMethods {
    pub const fn new(
        in_range: RatingMethod,
        out_range_low: RatingMethod,
        out_range_high: RatingMethod,
    ) -> Self {
        Self {
            in_range,
            out_range_low,
            out_range_high,
        }
    }

    /// Defaults for stream-rating shift tables.
    pub const SHIFTS: AxisMethods =
        AxisMethods::new(RatingMethod::Linear, RatingMethod::Nearest, RatingMethod::Nearest);

    /// Defaults for stream-rating offset tables.
    pub const OFFSETS: AxisMethods =
        AxisMethods::new(RatingMethod::Previous, RatingMethod::Next, RatingMethod::Previous);

    /// Methods for the same axis after swapping independent and dependent
    /// values. `descending` means the dependent values decrease, so the
    /// reversed table's low side corresponds to the original high side.
    pub fn reversed(self, descending: bool) -> Self {
        let (low, high) = if descending {
            (self.out_range_high, self.out_range_low)
        } else {
            (self.out_range_low, self.out_range_high)
        };
        AxisMethods::new(
            self.in_range.swapped_axes(),
            low.swapped_axes(),
            high.swapped_axes(),
        )
    }
}

impl Default for AxisMethods {
    fn default() -> Self {
        AxisMethods::new(RatingMethod::Linear, RatingMethod::Error, RatingMethod::Error)
    }
}

// ---------------------------------------------------------------------------
// Numeric kernels
// ---------------------------------------------------------------------------

/// Interpolates (or extrapolates) `x` through the pair `(x0, y0)`,
/// `(x1, y1)` using one of the four interpolating methods.
///
/// Logarithmic axes require strictly positive values, including the query
/// itself on a logarithmic independent axis.
pub fn interpolate(method: RatingMethod, x: f64, p0: (f64, f64), p1: (f64, f64)) -> Result<f64> {
    if !method.is_interpolating() {
        return Err(RatingError::construction(format!(
            "{} is not an interpolating method",
            method
        )));
    }
    let (mut x0, mut y0) = p0;
    let (mut x1, mut y1) = p1;
    let mut xq = x;

    if method.log_independent() {
        if xq <= 0.0 || x0 <= 0.0 || x1 <= 0.0 {
            return Err(RatingError::LogarithmicDomain {
                method: method.to_string(),
            });
        }
        xq = xq.ln();
        x0 = x0.ln();
        x1 = x1.ln();
    }
    if method.log_dependent() {
        if y0 <= 0.0 || y1 <= 0.0 {
            return Err(RatingError::LogarithmicDomain {
                method: method.to_string(),
            });
        }
        y0 = y0.ln();
        y1 = y1.ln();
    }

    let y = y0 + (y1 - y0) * (xq - x0) / (x1 - x0);
    Ok(if method.log_dependent() { y.exp() } else { y })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_parse_case_insensitively() {
        for method in RatingMethod::ALL {
            let lower = method.name().to_lowercase();
            assert_eq!(lower.parse::<RatingMethod>().unwrap(), method);
        }
        assert_eq!("lin_log".parse::<RatingMethod>().unwrap(), RatingMethod::LinLog);
    }

    #[test]
    fn test_unknown_method_is_construction_error() {
        let err = "CUBIC".parse::<RatingMethod>().unwrap_err();
        assert!(matches!(err, RatingError::Construction(_)));
    }

    #[test]
    fn test_linear_kernel() {
        let y = interpolate(RatingMethod::Linear, 1279.5, (1279.0, 0.0), (1280.0, 10.0)).unwrap();
        assert_eq!(y, 5.0);
    }

    #[test]
    fn test_linear_kernel_extrapolates() {
        let y = interpolate(RatingMethod::Linear, 3.0, (1.0, 10.0), (2.0, 20.0)).unwrap();
        assert!((y - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_logarithmic_kernel_follows_power_law() {
        // y = x^2 is a straight line in log-log space.
        let y = interpolate(RatingMethod::Logarithmic, 3.0, (1.0, 1.0), (10.0, 100.0)).unwrap();
        assert!((y - 9.0).abs() < 1e-9, "expected 9, got {}", y);
    }

    #[test]
    fn test_lin_log_kernel_is_exponential_in_x() {
        let y = interpolate(RatingMethod::LinLog, 0.5, (0.0, 1.0), (1.0, 100.0)).unwrap();
        assert!((y - 10.0).abs() < 1e-9, "expected 10, got {}", y);
    }

    #[test]
    fn test_log_lin_kernel_is_logarithmic_in_x() {
        let y = interpolate(RatingMethod::LogLin, 10.0, (1.0, 0.0), (100.0, 2.0)).unwrap();
        assert!((y - 1.0).abs() < 1e-9, "expected 1, got {}", y);
    }

    #[test]
    fn test_log_kernels_reject_non_positive_values() {
        let err = interpolate(RatingMethod::Logarithmic, 1.0, (0.0, 1.0), (2.0, 3.0)).unwrap_err();
        assert!(matches!(err, RatingError::LogarithmicDomain { .. }));
        let err = interpolate(RatingMethod::LinLog, 1.0, (0.0, 0.0), (2.0, 3.0)).unwrap_err();
        assert!(matches!(err, RatingError::LogarithmicDomain { .. }));
        // LOG-LIN only cares about the independent axis.
        assert!(interpolate(RatingMethod::LogLin, 1.0, (0.5, -1.0), (2.0, 3.0)).is_ok());
    }

    #[test]
    fn test_reversed_methods_swap_log_axes_and_sides() {
        let methods = AxisMethods::new(RatingMethod::LinLog, RatingMethod::Null, RatingMethod::LogLin);
        let rev = methods.reversed(false);
        assert_eq!(rev.in_range, RatingMethod::LogLin);
        assert_eq!(rev.out_range_high, RatingMethod::LinLog);
        let rev_desc = methods.reversed(true);
        assert_eq!(rev_desc.out_range_low, RatingMethod::LinLog);
        assert_eq!(rev_desc.out_range_high, RatingMethod::Null);
    }
}
