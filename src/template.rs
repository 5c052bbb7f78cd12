//! Rating templates and specifications.
//!
//! Configuration-only metadata. A template names the parameters and the
//! per-axis rating methods; a specification binds a template to a location
//! and carries rounding and automation flags. Ratings find their template
//! through their spec id (`location.parameters.template-version.spec-version`).

use crate::method::{AxisMethods, RatingMethod};
use serde::{Deserialize, Serialize};

/// One independent parameter of a template, with its axis methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndParameterSpec {
    /// 1-based position, outermost first.
    pub position: usize,
    pub parameter: String,
    pub in_range_method: RatingMethod,
    pub out_range_low_method: RatingMethod,
    pub out_range_high_method: RatingMethod,
}

impl IndParameterSpec {
    pub fn methods(&self) -> AxisMethods {
        AxisMethods::new(
            self.in_range_method,
            self.out_range_low_method,
            self.out_range_high_method,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RatingTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_id: Option<String>,
    /// e.g. `"Elev;Area"`.
    pub parameters_id: String,
    /// e.g. `"Linear"`.
    pub version: String,
    pub ind_parameter_specs: Vec<IndParameterSpec>,
    pub dep_parameter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RatingTemplate {
    /// `parameters-id.version`, e.g. `"Elev;Area.Linear"`.
    pub fn template_id(&self) -> String {
        format!("{}.{}", self.parameters_id, self.version)
    }

    /// Axis methods ordered by parameter position.
    pub fn axis_methods(&self) -> Vec<AxisMethods> {
        let mut specs: Vec<&IndParameterSpec> = self.ind_parameter_specs.iter().collect();
        specs.sort_by_key(|s| s.position);
        specs.iter().map(|s| s.methods()).collect()
    }
}

/// Rounding specification for one parameter, kept as the raw digit string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RoundingSpec {
    pub position: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RatingSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_id: Option<String>,
    pub rating_spec_id: String,
    pub template_id: String,
    pub location_id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agency: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(default)]
    pub auto_activate: bool,
    #[serde(default)]
    pub auto_migrate_extension: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ind_rounding_specs: Vec<RoundingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dep_rounding_spec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Derives the template id from a rating spec id of the form
/// `location.parameters.template-version.spec-version`.
pub fn template_id_from_spec_id(spec_id: &str) -> Option<String> {
    let parts: Vec<&str> = spec_id.split('.').collect();
    if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    Some(format!("{}.{}", parts[1], parts[2]))
}
