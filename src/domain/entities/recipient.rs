//! Recipient entity: a read-only view of a storefront account.

use super::targeting::MembershipTier;

/// A potential campaign recipient.
///
/// Owned by the account store. This service only reads it, except for lazy
/// unsubscribe-token issuance and opt-out through the unsubscribe endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub id: i64,
    pub email: Option<String>,
    pub opted_in: bool,
    pub active: bool,
    pub membership_tier: Option<MembershipTier>,
    pub total_spent_cents: i64,
    pub unsubscribe_token: Option<String>,
}

impl Recipient {
    /// Contact address, if present and non-blank.
    pub fn contact_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Base eligibility for any marketing send: opted in, active, reachable.
    pub fn is_reachable(&self) -> bool {
        self.opted_in && self.active && self.contact_address().is_some()
    }
}

/// Input data for inserting an account. Used by tests and seeding.
#[derive(Debug, Clone)]
pub struct NewRecipient {
    pub email: Option<String>,
    pub opted_in: bool,
    pub active: bool,
    pub membership_tier: Option<MembershipTier>,
    pub total_spent_cents: i64,
}

impl NewRecipient {
    /// An active, opted-in account with the given address.
    pub fn opted_in(email: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            opted_in: true,
            active: true,
            membership_tier: None,
            total_spent_cents: 0,
        }
    }
}
