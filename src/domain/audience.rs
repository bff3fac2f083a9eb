//! Audience query building.
//!
//! [`AudienceQuery`] is the pure translation of a [`TargetingSpec`] into the
//! predicate a repository evaluates. The base filter (active account with a
//! contact address, and opted in unless explicitly relaxed for previews) is
//! always part of the query and cannot be switched off by a spec.

use serde::Serialize;

use crate::domain::entities::{MembershipTier, Recipient, TargetingSpec};

/// Concrete recipient filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceQuery {
    /// Restrict to these tiers. `None` means any tier (including none).
    pub tiers: Option<Vec<MembershipTier>>,
    /// Inclusive lower bound on lifetime spend.
    pub min_spend_cents: Option<i64>,
    /// Inclusive upper bound on lifetime spend.
    pub max_spend_cents: Option<i64>,
    /// Require the marketing opt-in flag.
    pub require_opt_in: bool,
}

impl AudienceQuery {
    /// Query used for dispatch: base filter including opt-in, ANDed with the targeting.
    pub fn for_dispatch(spec: &TargetingSpec) -> Self {
        Self::from_spec(spec, true)
    }

    /// Same spec filter, without the opt-in requirement. Used to size the
    /// theoretical audience in previews.
    pub fn ignoring_opt_in(spec: &TargetingSpec) -> Self {
        Self::from_spec(spec, false)
    }

    fn from_spec(spec: &TargetingSpec, require_opt_in: bool) -> Self {
        let mut query = Self {
            tiers: None,
            min_spend_cents: None,
            max_spend_cents: None,
            require_opt_in,
        };

        match spec {
            TargetingSpec::AllOptedIn => {}
            TargetingSpec::MembershipTier { tiers } => {
                let mut tiers = tiers.clone();
                tiers.sort_by_key(|t| t.as_str());
                tiers.dedup();
                query.tiers = Some(tiers);
            }
            TargetingSpec::SpendRange {
                min_cents,
                max_cents,
            } => {
                query.min_spend_cents = *min_cents;
                query.max_spend_cents = *max_cents;
            }
        }

        query
    }

    /// Tier names as stored in the account table.
    pub fn tier_names(&self) -> Option<Vec<String>> {
        self.tiers
            .as_ref()
            .map(|tiers| tiers.iter().map(|t| t.as_str().to_string()).collect())
    }

    /// Evaluates the query against a single recipient.
    pub fn matches(&self, recipient: &Recipient) -> bool {
        if !recipient.active || recipient.contact_address().is_none() {
            return false;
        }
        if self.require_opt_in && !recipient.opted_in {
            return false;
        }
        if let Some(tiers) = &self.tiers {
            match recipient.membership_tier {
                Some(tier) if tiers.contains(&tier) => {}
                _ => return false,
            }
        }
        if self
            .min_spend_cents
            .is_some_and(|min| recipient.total_spent_cents < min)
        {
            return false;
        }
        if self
            .max_spend_cents
            .is_some_and(|max| recipient.total_spent_cents > max)
        {
            return false;
        }
        true
    }
}

/// Audience size estimate returned by previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AudienceCount {
    /// Active accounts with an address matching the targeting, regardless of opt-in.
    pub total_eligible: i64,
    /// The subset that is opted in: exactly what a dispatch would reach.
    pub total_opted_in: i64,
}
