use near_sdk::{near, AccountId, NearToken};

use crate::error::SwapError;

/// Administrative configuration: who may change the approval fee, and the fee itself.
#[near(serializers = [borsh])]
pub struct FeePolicy {
    pub owner_id: AccountId,
    pub fee: NearToken,
}

impl FeePolicy {
    pub fn new(owner_id: AccountId, fee: NearToken) -> Self {
        Self { owner_id, fee }
    }

    pub fn set_fee(&mut self, caller: &AccountId, fee: NearToken) -> Result<(), SwapError> {
        if *caller != self.owner_id {
            return Err(SwapError::Unauthorized);
        }
        self.fee = fee;
        Ok(())
    }

    /// A zero fee disables the check.
    pub fn assert_paid(&self, attached: NearToken) -> Result<(), SwapError> {
        if attached < self.fee {
            return Err(SwapError::PaymentRequired {
                required: self.fee.as_yoctonear(),
                attached: attached.as_yoctonear(),
            });
        }
        Ok(())
    }
}
