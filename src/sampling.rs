//! Deterministic per-user sampling.
//!
//! A user is bucketed by a character-code hash folded into 100 buckets, so a
//! given user is either always or never captured for a fixed rate.

const BUCKETS: u32 = 100;
const MULTIPLIER: u32 = 31;

/// Stable bucket in `0..100` for a user id. Accumulates UTF-16 code units so
/// ids hash identically to producers running on a JS runtime.
pub fn bucket_for(user_id: &str) -> u32 {
    user_id
        .encode_utf16()
        .fold(0u32, |acc, unit| (acc * MULTIPLIER + u32::from(unit)) % BUCKETS)
}

/// Whether `user_id` falls inside the sampled fraction `rate`.
pub fn should_sample(user_id: &str, rate: f64) -> bool {
    if rate <= 0.0 {
        return false;
    }
    if rate >= 1.0 {
        return true;
    }

    let scalar = f64::from(bucket_for(user_id)) / f64::from(BUCKETS);
    scalar < rate
}
