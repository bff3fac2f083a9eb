//! Targeting rules narrowing a campaign audience.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::AppError;

/// Loyalty tier of a storefront account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            other => Err(format!("unknown membership tier '{other}'")),
        }
    }
}

/// Structured filter applied on top of the opted-in base filter.
///
/// Serialized with an internal `type` tag:
///
/// ```json
/// { "type": "all_opted_in" }
/// { "type": "membership_tier", "tiers": ["gold", "platinum"] }
/// { "type": "spend_range", "min_cents": 10000, "max_cents": null }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetingSpec {
    /// Every recipient passing the base filter.
    #[default]
    AllOptedIn,
    /// Recipients whose membership tier is one of `tiers`.
    MembershipTier { tiers: Vec<MembershipTier> },
    /// Recipients whose lifetime spend (in cents) falls inside the inclusive range.
    SpendRange {
        #[serde(default)]
        min_cents: Option<i64>,
        #[serde(default)]
        max_cents: Option<i64>,
    },
}

impl TargetingSpec {
    /// Checks that the targeting can be turned into a meaningful query.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if:
    /// - a tier filter lists no tiers
    /// - a spend range has no bounds, a negative bound, or `min > max`
    pub fn validate(&self) -> Result<(), AppError> {
        match self {
            Self::AllOptedIn => Ok(()),
            Self::MembershipTier { tiers } => {
                if tiers.is_empty() {
                    return Err(AppError::bad_request(
                        "Membership tier targeting requires at least one tier",
                        json!({ "field": "targeting.tiers" }),
                    ));
                }
                Ok(())
            }
            Self::SpendRange {
                min_cents,
                max_cents,
            } => {
                if min_cents.is_none() && max_cents.is_none() {
                    return Err(AppError::bad_request(
                        "Spend range targeting requires min_cents or max_cents",
                        json!({ "field": "targeting" }),
                    ));
                }
                if min_cents.is_some_and(|v| v < 0) || max_cents.is_some_and(|v| v < 0) {
                    return Err(AppError::bad_request(
                        "Spend range bounds must not be negative",
                        json!({ "min_cents": min_cents, "max_cents": max_cents }),
                    ));
                }
                if let (Some(min), Some(max)) = (min_cents, max_cents)
                    && min > max
                {
                    return Err(AppError::bad_request(
                        "Spend range min_cents must not exceed max_cents",
                        json!({ "min_cents": min, "max_cents": max }),
                    ));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_all_opted_in() {
        assert_eq!(TargetingSpec::default(), TargetingSpec::AllOptedIn);
    }

    #[test]
    fn test_deserialize_tagged_variants() {
        let spec: TargetingSpec = serde_json::from_str(r#"{"type":"all_opted_in"}"#).unwrap();
        assert_eq!(spec, TargetingSpec::AllOptedIn);

        let spec: TargetingSpec =
            serde_json::from_str(r#"{"type":"membership_tier","tiers":["gold","platinum"]}"#)
                .unwrap();
        assert_eq!(
            spec,
            TargetingSpec::MembershipTier {
                tiers: vec![MembershipTier::Gold, MembershipTier::Platinum]
            }
        );

        let spec: TargetingSpec =
            serde_json::from_str(r#"{"type":"spend_range","min_cents":500}"#).unwrap();
        assert_eq!(
            spec,
            TargetingSpec::SpendRange {
                min_cents: Some(500),
                max_cents: None
            }
        );
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        let result =
            serde_json::from_str::<TargetingSpec>(r#"{"type":"membership_tier","tiers":["vip"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_tiers() {
        let spec = TargetingSpec::MembershipTier { tiers: vec![] };
        assert!(matches!(spec.validate(), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_validate_spend_range() {
        let open = TargetingSpec::SpendRange {
            min_cents: None,
            max_cents: None,
        };
        assert!(open.validate().is_err());

        let inverted = TargetingSpec::SpendRange {
            min_cents: Some(10),
            max_cents: Some(5),
        };
        assert!(inverted.validate().is_err());

        let negative = TargetingSpec::SpendRange {
            min_cents: Some(-1),
            max_cents: None,
        };
        assert!(negative.validate().is_err());

        let ok = TargetingSpec::SpendRange {
            min_cents: Some(0),
            max_cents: Some(0),
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_tier_from_str() {
        assert_eq!("Gold".parse::<MembershipTier>(), Ok(MembershipTier::Gold));
        assert!("diamond".parse::<MembershipTier>().is_err());
    }
}
