use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::EvaluationError,
    flags::PropertyCondition,
    properties::{Properties, PropertyValue},
};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Exact,
    IsNot,
    IsSet,
    IsNotSet,
    Icontains,
    NotIcontains,
    Regex,
    NotRegex,
    Gt,
    Lt,
    Gte,
    Lte,
    /// Any operator introduced on the server after this client was built. Never matches.
    #[serde(other)]
    Unknown,
}

impl PropertyCondition {
    /// Matches the condition against `properties`.
    ///
    /// # Errors
    ///
    /// - [`EvaluationError::UnsupportedOperator`] for `is_not_set`, regardless of the inputs.
    /// - [`EvaluationError::MissingProperty`] if the property is absent and the operator needs a
    ///   value to compare.
    /// - [`EvaluationError::TypeMismatch`], [`EvaluationError::InvalidPattern`] and
    ///   [`EvaluationError::NotOrderable`] for values the operator cannot work with.
    pub fn matches(&self, properties: &Properties) -> Result<bool, EvaluationError> {
        match self.operator {
            Operator::IsNotSet => {
                return Err(EvaluationError::UnsupportedOperator {
                    operator: "is_not_set",
                })
            }
            Operator::IsSet => return Ok(properties.contains_key(&self.key)),
            Operator::Unknown => {
                log::debug!(target: "featureflags", key = self.key.as_str(); "ignoring condition with unknown operator");
                return Ok(false);
            }
            _ => {}
        }

        let actual = properties
            .get(&self.key)
            .ok_or_else(|| EvaluationError::MissingProperty {
                key: self.key.clone(),
            })?;

        match self.operator {
            Operator::Exact => Ok(self.exact(actual)),
            Operator::IsNot => Ok(!self.exact(actual)),

            Operator::Icontains | Operator::NotIcontains => {
                let (actual, expected) = self.string_operands(actual)?;
                let contains = actual
                    .to_lowercase()
                    .contains(&expected.to_lowercase());
                Ok(if self.operator == Operator::Icontains {
                    contains
                } else {
                    !contains
                })
            }

            Operator::Regex | Operator::NotRegex => {
                let (actual, pattern) = self.string_operands(actual)?;
                let regex = Regex::new(pattern).map_err(|_| EvaluationError::InvalidPattern {
                    pattern: pattern.to_owned(),
                })?;
                let matches = regex.is_match(actual);
                Ok(if self.operator == Operator::Regex {
                    matches
                } else {
                    !matches
                })
            }

            Operator::Gt | Operator::Lt | Operator::Gte | Operator::Lte => {
                let not_orderable = || EvaluationError::NotOrderable {
                    key: self.key.clone(),
                };
                let expected = self.value.as_number().ok_or_else(not_orderable)?;
                let actual = actual.as_number().ok_or_else(not_orderable)?;
                Ok(match self.operator {
                    Operator::Gt => actual > expected,
                    Operator::Lt => actual < expected,
                    Operator::Gte => actual >= expected,
                    Operator::Lte => actual <= expected,
                    _ => {
                        // unreachable
                        false
                    }
                })
            }

            Operator::IsSet | Operator::IsNotSet | Operator::Unknown => {
                // handled above
                Ok(false)
            }
        }
    }

    /// Membership test for list values, equality for scalars.
    fn exact(&self, actual: &PropertyValue) -> bool {
        match &self.value {
            PropertyValue::List(values) => values.contains(actual),
            value => value == actual,
        }
    }

    fn string_operands<'a>(
        &'a self,
        actual: &'a PropertyValue,
    ) -> Result<(&'a str, &'a str), EvaluationError> {
        match (actual.as_str(), self.value.as_str()) {
            (Some(actual), Some(expected)) => Ok((actual, expected)),
            _ => Err(EvaluationError::TypeMismatch {
                key: self.key.clone(),
            }),
        }
    }
}
