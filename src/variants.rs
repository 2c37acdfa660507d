use crate::{
    error::EvaluationError,
    flags::{FlagValue, MultivariateSpec},
    hasher::Hasher,
};

/// Salt used when bucketing a subject into a variant.
const VARIANT_SALT: &str = "variant";

/// Bucket range `[value_min, value_max)` owned by a single variant.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRange<'a> {
    pub key: &'a str,
    pub value_min: f64,
    pub value_max: f64,
}

impl VariantRange<'_> {
    pub fn contains(&self, value: f64) -> bool {
        self.value_min <= value && value < self.value_max
    }
}

/// Lays the variants out back to back over `[0, 1)`, in definition order.
///
/// Returns `None` if a variant has no rollout percentage, as its range cannot be computed.
pub fn variant_lookup_table(spec: &MultivariateSpec) -> Option<Vec<VariantRange<'_>>> {
    let mut value_min = 0.0;
    spec.variants
        .iter()
        .map(|variant| {
            let value_max = value_min + f64::from(variant.rollout_percentage?) / 100.0;
            let range = VariantRange {
                key: &variant.key,
                value_min,
                value_max,
            };
            value_min = value_max;
            Some(range)
        })
        .collect()
}

/// Picks the variant of `flag_key` for `subject_id`.
///
/// Returns `Ok(None)` if the variants cannot be laid out, and `FlagValue::Boolean(true)` if the
/// subject's bucket falls outside every range (percentages summing to less than 100).
pub fn resolve_variant(
    spec: &MultivariateSpec,
    flag_key: &str,
    subject_id: &str,
    hasher: &impl Hasher,
) -> Result<Option<FlagValue>, EvaluationError> {
    let Some(lookup_table) = variant_lookup_table(spec) else {
        return Ok(None);
    };

    for range in lookup_table {
        // Hash is recomputed for each range so that bucket assignments stay identical to the
        // other SDKs.
        let value = hasher.hash(flag_key, subject_id, VARIANT_SALT)?;
        if range.contains(value) {
            return Ok(Some(FlagValue::Variant(range.key.to_owned())));
        }
    }

    Ok(Some(FlagValue::Boolean(true)))
}
