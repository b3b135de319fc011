use near_sdk::{near, AccountId};

use crate::agreement::AgreementId;

/// Per-account swap bookkeeping: whom the account approved and which agreement it is bound to.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Party {
    pub approved_target: Option<AccountId>,
    pub agreement: Option<AgreementId>,
}

impl Party {
    /// Whether this party chose `other` as its counterparty.
    pub fn approves(&self, other: &AccountId) -> bool {
        self.approved_target.as_ref() == Some(other)
    }

    pub fn is_empty(&self) -> bool {
        self.approved_target.is_none() && self.agreement.is_none()
    }

    /// Drops the approval and the agreement link, but only if the link still
    /// points at `agreement_id`. Returns whether anything changed.
    pub fn release(&mut self, agreement_id: AgreementId) -> bool {
        if self.agreement != Some(agreement_id) {
            return false;
        }
        self.agreement = None;
        self.approved_target = None;
        true
    }
}
