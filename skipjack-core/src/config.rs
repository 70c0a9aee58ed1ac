//! Configuration for the skip-list map

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of levels in a skip list
pub const DEFAULT_MAX_HEIGHT: usize = 16;

/// Default probability of growing a tower by one level
pub const DEFAULT_PROBABILITY: f64 = 0.5;

/// Hard upper bound on `max_height`, to keep tower allocations sane
pub const MAX_HEIGHT_LIMIT: usize = 64;

/// Tuning parameters for a skip-list map, fixed at construction
///
/// `max_height` bounds how many levels any tower may span, and `probability`
/// is the per-level coin flip of the geometric height distribution. The
/// defaults give the classical expected O(log n) traversal for maps up to
/// tens of millions of entries.
///
/// # Example
///
/// ```
/// use skipjack_core::SkipListConfig;
///
/// let config = SkipListConfig {
///     max_height: 20,
///     probability: 0.25,
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkipListConfig {
    /// Maximum number of levels any node may span
    pub max_height: usize,

    /// Probability that a new tower grows by one more level
    pub probability: f64,
}

impl Default for SkipListConfig {
    fn default() -> Self {
        Self {
            max_height: DEFAULT_MAX_HEIGHT,
            probability: DEFAULT_PROBABILITY,
        }
    }
}

impl SkipListConfig {
    /// Checks that the parameters describe a usable skip list
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_height` is zero or exceeds
    /// [`MAX_HEIGHT_LIMIT`], or if `probability` lies outside `(0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.max_height == 0 || self.max_height > MAX_HEIGHT_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_height must be in 1..={}, got {}",
                MAX_HEIGHT_LIMIT, self.max_height
            )));
        }
        if !(self.probability > 0.0 && self.probability < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "probability must be in (0, 1), got {}",
                self.probability
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SkipListConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_height() {
        let config = SkipListConfig {
            max_height: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_height() {
        let config = SkipListConfig {
            max_height: MAX_HEIGHT_LIMIT + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_degenerate_probability() {
        for p in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            let config = SkipListConfig {
                probability: p,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "probability {p} should be rejected");
        }
    }
}
