use near_sdk::json_types::U128;
use near_sdk::{near, AccountId};

use crate::agreement::{Agreement, AgreementId, AssetRef, Custody};
use crate::error::SwapError;
use crate::{Contract, ContractExt};

/// One manifest slot as reported by `list_managed_assets`. `asset` is `None`
/// while nothing has been deposited into the slot.
#[near(serializers = [json])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagedAsset {
    pub asset: Option<AssetRef>,
    pub giver: AccountId,
    pub custody: Custody,
}

#[near]
impl Contract {
    /// Counterparty of `account_id`'s active agreement.
    pub fn agreement(&self, account_id: AccountId) -> Option<AccountId> {
        let (_, agreement) = self.active_agreement(&account_id)?;
        agreement.counterpart_of(&account_id).cloned()
    }

    pub fn approved_target(&self, account_id: AccountId) -> Option<AccountId> {
        self.parties.get(&account_id)?.approved_target.clone()
    }

    /// True while the account's agreement still waits for deposits.
    pub fn can_deposit(&self, account_id: AccountId) -> bool {
        self.active_agreement(&account_id)
            .is_some_and(|(_, agreement)| !agreement.swapped && !agreement.cancelled)
    }

    /// True while the swap has handed the account nfts it has not withdrawn yet.
    pub fn swaps_can_be_withdrawn(&self, account_id: AccountId) -> bool {
        self.active_agreement(&account_id)
            .is_some_and(|(_, agreement)| agreement.claimable_swaps(&account_id) > 0)
    }

    #[handle_result]
    pub fn list_managed_assets(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<ManagedAsset>, SwapError> {
        let (_, agreement) = self
            .active_agreement(&account_id)
            .ok_or(SwapError::NoActiveAgreement)?;
        Ok(agreement
            .slots
            .iter()
            .map(|slot| ManagedAsset {
                asset: (slot.custody != Custody::Unfilled).then(|| slot.asset.clone()),
                giver: agreement.party(slot.giver).clone(),
                custody: slot.custody.clone(),
            })
            .collect())
    }

    pub fn get_agreement(&self, agreement_id: AgreementId) -> Option<Agreement> {
        self.agreements.get(&agreement_id).cloned()
    }

    pub fn get_fee(&self) -> U128 {
        U128(self.fee_policy.fee.as_yoctonear())
    }

    pub fn get_owner(&self) -> AccountId {
        self.fee_policy.owner_id.clone()
    }
}
