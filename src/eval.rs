use crate::{
    error::EvaluationError,
    flags::{FlagDefinition, FlagValue, PropertyType, RuleGroup},
    hasher::{check_rollout, Hasher},
    properties::Properties,
    variants::resolve_variant,
};

impl FlagDefinition {
    /// Evaluate the flag locally.
    ///
    /// Returns `Ok(None)` when the flag cannot be decided without asking the server, which happens
    /// when a multivariate flag matches but its variant ranges are incomplete. A flag without rule
    /// groups matches nobody.
    pub fn evaluate(
        &self,
        subject_id: &str,
        person_properties: &Properties,
        group_properties: &Properties,
        hasher: &impl Hasher,
    ) -> Result<Option<FlagValue>, EvaluationError> {
        if self.is_simple {
            let enabled =
                check_rollout(hasher, &self.key, subject_id, self.effective_rollout_percentage())?;
            return Ok(Some(FlagValue::Boolean(enabled)));
        }

        for group in &self.filters.groups {
            if group.is_match(self, subject_id, person_properties, group_properties, hasher)? {
                return match &self.filters.multivariate {
                    Some(spec) => resolve_variant(spec, &self.key, subject_id, hasher),
                    None => Ok(Some(FlagValue::Boolean(true))),
                };
            }
        }

        Ok(Some(FlagValue::Boolean(false)))
    }
}

impl RuleGroup {
    /// All conditions must match, then the subject must fall within the group's rollout.
    pub fn is_match(
        &self,
        flag: &FlagDefinition,
        subject_id: &str,
        person_properties: &Properties,
        group_properties: &Properties,
        hasher: &impl Hasher,
    ) -> Result<bool, EvaluationError> {
        for condition in &self.properties {
            let properties = if flag.is_group_flag()
                || condition.property_type == PropertyType::Group
            {
                group_properties
            } else {
                person_properties
            };

            if !condition.matches(properties)? {
                return Ok(false);
            }
        }

        match self.rollout_percentage {
            Some(rollout_percentage) => {
                check_rollout(hasher, &flag.key, subject_id, rollout_percentage)
            }
            None => Ok(true),
        }
    }
}
