use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::{properties::PropertyValue, rules::Operator};

/// Body of the flag-listing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlagListResponse {
    pub results: Vec<FlagDefinition>,
}

/// A feature flag as defined on the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FlagDefinition {
    /// Unique flag key.
    pub key: String,
    /// A simple flag has no targeting rules and is decided by percentage rollout alone.
    #[serde(rename = "is_simple_flag", default)]
    pub is_simple: bool,
    /// Rollout percentage (0-100) of a simple flag. `None` means 100.
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
    /// Inactive flags are never stored in the cache.
    #[serde(default)]
    pub active: bool,
    /// Targeting rules.
    #[serde(default)]
    pub filters: Filters,
}

/// Targeting rules of a [`FlagDefinition`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Filters {
    /// Set when the flag targets groups rather than persons.
    #[serde(default)]
    pub aggregation_group_type_index: Option<u8>,
    /// Rule groups, evaluated in order; the first fully matching group wins.
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
    /// Present for multivariate flags.
    #[serde(default)]
    pub multivariate: Option<MultivariateSpec>,
}

/// An AND-ed list of conditions optionally gated by a rollout percentage.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct RuleGroup {
    #[serde(default)]
    pub properties: Vec<PropertyCondition>,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
}

/// A single targeting condition.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PropertyCondition {
    pub key: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default = "null_value")]
    pub value: PropertyValue,
    /// Which property bag the condition reads from.
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
}

fn null_value() -> PropertyValue {
    PropertyValue::Null
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    #[default]
    Person,
    Group,
    #[serde(other)]
    Other,
}

/// Variants of a multivariate flag. Order defines bucket boundaries.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MultivariateSpec {
    #[serde(default)]
    pub variants: Vec<VariantDefinition>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VariantDefinition {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rollout_percentage: Option<u8>,
}

impl FlagDefinition {
    /// Effective rollout percentage of a simple flag.
    pub fn effective_rollout_percentage(&self) -> u8 {
        self.rollout_percentage.unwrap_or(100)
    }

    /// Returns `true` if the flag aggregates by group instead of by person.
    pub fn is_group_flag(&self) -> bool {
        self.filters.aggregation_group_type_index.is_some()
    }
}

/// Outcome of a flag evaluation: either a plain on/off value or the key of the assigned variant.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, From)]
#[serde(untagged)]
pub enum FlagValue {
    Boolean(bool),
    Variant(String),
}

impl FlagValue {
    /// Any value other than `false` counts as enabled, variants included.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, FlagValue::Boolean(false))
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FlagValue::Boolean(b) => Some(*b),
            FlagValue::Variant(_) => None,
        }
    }

    pub fn as_variant(&self) -> Option<&str> {
        match self {
            FlagValue::Variant(key) => Some(key),
            FlagValue::Boolean(_) => None,
        }
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Variant(value.to_owned())
    }
}
