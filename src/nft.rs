use std::collections::HashMap;

use near_sdk::{ext_contract, near, AccountId, PromiseOrValue};

use crate::agreement::TokenId;

/// The part of a NEP-171 `nft_token` response the escrow relies on.
#[near(serializers = [json])]
#[derive(Clone, Debug)]
pub struct JsonToken {
    pub token_id: TokenId,
    pub owner_id: AccountId,
    /// NEP-178 approvals, absent on collections without the approval extension.
    pub approved_account_ids: Option<HashMap<AccountId, u64>>,
}

impl JsonToken {
    pub fn approval_id_for(&self, account_id: &AccountId) -> Option<u64> {
        self.approved_account_ids
            .as_ref()
            .and_then(|approvals| approvals.get(account_id).copied())
    }
}

// NEP-171 collection, plus the NEP-178 approval id argument on transfers
#[ext_contract(ext_nft)]
pub trait NonFungibleToken {
    fn nft_token(&self, token_id: TokenId) -> Option<JsonToken>;
    fn nft_transfer(
        &mut self,
        receiver_id: AccountId,
        token_id: TokenId,
        approval_id: Option<u64>,
        memo: Option<String>,
    );
}

/// NEP-171 receiver side, implemented by the swap contract so owners can push
/// an nft in with `nft_transfer_call`.
pub trait NonFungibleTokenReceiver {
    fn nft_on_transfer(
        &mut self,
        sender_id: AccountId,
        previous_owner_id: AccountId,
        token_id: TokenId,
        msg: String,
    ) -> PromiseOrValue<bool>;
}
