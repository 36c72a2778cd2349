//! Bounded retry for checkpoint persistence

use crate::error::{CheckpointError, Result};
use tracing::warn;

/// Attempts made before a save or lookup failure is propagated.
pub(crate) const SAVE_ATTEMPTS: u32 = 3;

/// Re-issue `op` up to `attempts` times with no backoff, returning the
/// first success or the last error.
pub(crate) fn with_retries<T>(
    what: &str,
    attempts: u32,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut last_error = None;

    for attempt in 1..=attempts {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("{} attempt {}/{} failed: {}", what, attempt, attempts, e);
                last_error = Some(e);
            },
        }
    }

    // last_error is always Some here because attempts >= 1 and every failed
    // attempt records its error.
    match last_error {
        Some(e) => Err(e),
        None => Err(CheckpointError::RetriesExhausted(what.to_string())),
    }
}
