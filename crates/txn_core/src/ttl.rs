//! Retention policy for transaction records.

use crate::error::InvalidTtlPolicy;

/// Default record lifetime (1 hour).
pub const DEFAULT_TTL_SECONDS: u64 = 3600;

/// Longest lifetime a caller may request (24 hours).
pub const MAX_TTL_SECONDS: u64 = 86_400;

/// Clamps caller-requested lifetimes into `[1, max_ttl]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    default_ttl: u64,
    max_ttl: u64,
}

impl TtlPolicy {
    pub fn new(default_ttl: u64, max_ttl: u64) -> Result<Self, InvalidTtlPolicy> {
        if default_ttl == 0 || max_ttl == 0 || default_ttl > max_ttl || max_ttl > i64::MAX as u64 {
            return Err(InvalidTtlPolicy {
                default_ttl,
                max_ttl,
            });
        }
        Ok(Self {
            default_ttl,
            max_ttl,
        })
    }

    pub fn default_ttl(&self) -> u64 {
        self.default_ttl
    }

    pub fn max_ttl(&self) -> u64 {
        self.max_ttl
    }

    /// `min(requested ?? default, max)`, with non-positive results replaced
    /// by the default.
    pub fn clamp(&self, requested: Option<i64>) -> u64 {
        // Both bounds fit in i64, checked in `new`.
        let default = self.default_ttl as i64;
        let effective = requested.unwrap_or(default).min(self.max_ttl as i64);
        if effective <= 0 {
            self.default_ttl
        } else {
            effective as u64
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL_SECONDS,
            max_ttl: MAX_TTL_SECONDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_defaults() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.clamp(None), DEFAULT_TTL_SECONDS);
        assert_eq!(policy.clamp(Some(10)), 10);
        assert_eq!(policy.clamp(Some(1)), 1);
    }

    #[test]
    fn test_clamp_caps_at_max() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.clamp(Some(999_999_999)), MAX_TTL_SECONDS);
        assert_eq!(policy.clamp(Some(i64::MAX)), MAX_TTL_SECONDS);
        assert_eq!(policy.clamp(Some(86_400)), 86_400);
    }

    #[test]
    fn test_clamp_non_positive_falls_back() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.clamp(Some(0)), DEFAULT_TTL_SECONDS);
        assert_eq!(policy.clamp(Some(-5)), DEFAULT_TTL_SECONDS);
        assert_eq!(policy.clamp(Some(i64::MIN)), DEFAULT_TTL_SECONDS);
    }

    #[test]
    fn test_custom_policy() {
        let policy = TtlPolicy::new(60, 300).unwrap();
        assert_eq!(policy.clamp(None), 60);
        assert_eq!(policy.clamp(Some(1_000)), 300);
        assert_eq!(policy.clamp(Some(-1)), 60);
    }

    #[test]
    fn test_invalid_policies_rejected() {
        assert!(TtlPolicy::new(0, 10).is_err());
        assert!(TtlPolicy::new(10, 0).is_err());
        assert!(TtlPolicy::new(100, 10).is_err());
        assert!(TtlPolicy::new(1, u64::MAX).is_err());
    }
}
