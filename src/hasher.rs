use sha1::{Digest, Sha1};

use crate::error::EvaluationError;

/// Normalization constant: the largest value representable by 15 hex digits.
pub const LONG_SCALE: u64 = 0xFFFFFFFFFFFFFFF;

/// Number of leading hex digits of the digest used for bucketing.
const HASH_HEX_WIDTH: usize = 15;

/// Maps `(flag key, subject id, salt)` to a deterministic value in `[0, 1]`.
pub trait Hasher {
    fn hash(&self, key: &str, subject_id: &str, salt: &str) -> Result<f64, EvaluationError>;
}

/// SHA-1 based hasher shared by every SDK language, so that a subject lands in the same bucket
/// no matter which client evaluates the flag.
pub struct Sha1Hasher;

impl Hasher for Sha1Hasher {
    fn hash(&self, key: &str, subject_id: &str, salt: &str) -> Result<f64, EvaluationError> {
        let digest = Sha1::new()
            .chain_update(key)
            .chain_update(".")
            .chain_update(subject_id)
            .chain_update(salt)
            .finalize();
        let hex_digest = hex::encode(digest);
        let prefix = hex_digest
            .get(..HASH_HEX_WIDTH)
            .ok_or(EvaluationError::InternalHash)?;
        let value =
            u64::from_str_radix(prefix, 16).map_err(|_| EvaluationError::InternalHash)?;
        Ok(value as f64 / LONG_SCALE as f64)
    }
}

/// Returns `true` if the subject falls within the first `rollout_percentage` percent of buckets
/// for `key`.
pub fn check_rollout(
    hasher: &impl Hasher,
    key: &str,
    subject_id: &str,
    rollout_percentage: u8,
) -> Result<bool, EvaluationError> {
    let value = hasher.hash(key, subject_id, "")?;
    Ok(value <= f64::from(rollout_percentage) / 100.0)
}

#[cfg(test)]
pub struct DeterministicHasher(pub std::collections::HashMap<String, f64>);

#[cfg(test)]
impl Hasher for DeterministicHasher {
    fn hash(&self, key: &str, subject_id: &str, salt: &str) -> Result<f64, EvaluationError> {
        Ok(self
            .0
            .get(&format!("{key}.{subject_id}{salt}"))
            .copied()
            .unwrap_or(0.0))
    }
}
