//! Run parameters (`AllotmentParams`) with safe defaults and domain checks.
//!
//! Wire shape (all keys optional):
//! `{"max_preferences": 3, "fallback": "least_filled"}`

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Largest accepted `max_preferences`.
pub const MAX_PREFERENCES_CEILING: u8 = 10;

/// What happens to students left without a seat after preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FallbackPolicy {
    /// Place into the offering with the fewest committed seats.
    #[default]
    LeastFilled,
    /// Report every such student as unallottable.
    Disabled,
}

impl FallbackPolicy {
    pub fn as_token(self) -> &'static str {
        match self {
            FallbackPolicy::LeastFilled => "least_filled",
            FallbackPolicy::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct AllotmentParams {
    /// Upper bound on ranked choices per submission (ranks 1..=max).
    pub max_preferences: u8,
    pub fallback: FallbackPolicy,
}

impl Default for AllotmentParams {
    fn default() -> Self {
        Self {
            max_preferences: 3,
            fallback: FallbackPolicy::LeastFilled,
        }
    }
}

/// Domain checks that types alone cannot express.
pub fn validate_domains(p: &AllotmentParams) -> Result<(), CoreError> {
    if p.max_preferences == 0 || p.max_preferences > MAX_PREFERENCES_CEILING {
        return Err(CoreError::DomainOutOfRange("max_preferences"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let p = AllotmentParams::default();
        assert_eq!(p.max_preferences, 3);
        assert_eq!(p.fallback, FallbackPolicy::LeastFilled);
        assert!(validate_domains(&p).is_ok());
    }

    #[test]
    fn max_preferences_bounds() {
        let zero = AllotmentParams { max_preferences: 0, ..Default::default() };
        let big = AllotmentParams { max_preferences: 11, ..Default::default() };
        assert_eq!(validate_domains(&zero), Err(CoreError::DomainOutOfRange("max_preferences")));
        assert!(validate_domains(&big).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_params_fill_defaults() {
        let p: AllotmentParams = serde_json::from_str(r#"{"fallback":"disabled"}"#).unwrap();
        assert_eq!(p.max_preferences, 3);
        assert_eq!(p.fallback, FallbackPolicy::Disabled);
        assert!(serde_json::from_str::<AllotmentParams>(r#"{"tie_policy":"random"}"#).is_err());
    }
}
