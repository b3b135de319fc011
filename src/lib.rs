use near_sdk::json_types::U128;
use near_sdk::store::{IterableMap, LookupMap};
use near_sdk::{
    env, ext_contract, log, near, serde_json, AccountId, Gas, NearToken, Promise, PromiseError,
    PromiseOrValue, StorageUsage,
};

mod agreement;
mod custody;
mod error;
mod fees;
mod nft;
mod party;
mod utils;
mod views;


pub use agreement::{Agreement, AgreementId, AssetRef, AssetSlot, Custody, Side, SlotRef, TokenId};
pub use error::SwapError;
pub use nft::{JsonToken, NonFungibleTokenReceiver};
pub use party::Party;
pub use views::ManagedAsset;

use fees::FeePolicy;
use nft::ext_nft;
use utils::log_swap_event;

const ONE_YOCTO: NearToken = NearToken::from_yoctonear(1);
const GAS_FOR_NFT_TOKEN: Gas = Gas::from_tgas(10);
const GAS_FOR_NFT_TRANSFER: Gas = Gas::from_tgas(20);
const GAS_FOR_SETTLEMENT: Gas = Gas::from_tgas(15);
// Covers the transfer and the settlement it schedules.
const GAS_FOR_OWNER_CHECK: Gas = Gas::from_tgas(50);
// Upper bound on the `nft_token` response we are willing to read.
const MAX_TOKEN_RESPONSE_LEN: usize = 16 * 1024;

#[ext_contract(ext_self)]
pub trait SelfCallbacks {
    fn on_deposit_owner_resolved(&mut self, at: SlotRef, depositor: AccountId);
    fn on_deposit_settled(&mut self, at: SlotRef, depositor: AccountId);
    fn on_withdrawal_settled(&mut self, at: SlotRef, beneficiary: AccountId);
}

#[near(contract_state)]
pub struct Contract {
    pub fee_policy: FeePolicy,
    pub parties: IterableMap<AccountId, Party>,
    pub agreements: IterableMap<AgreementId, Agreement>,
    // Every nft currently held by the contract or moving in or out of it.
    pub custody: LookupMap<AssetRef, SlotRef>,
    pub next_agreement_id: AgreementId,
}

impl Default for Contract {
    fn default() -> Self {
        Self::new(env::predecessor_account_id(), None)
    }
}

#[near]
impl Contract {
    #[init]
    pub fn new(owner_id: AccountId, fee: Option<U128>) -> Self {
        let fee = NearToken::from_yoctonear(fee.map(|fee| fee.0).unwrap_or(0));
        Self {
            fee_policy: FeePolicy::new(owner_id, fee),
            parties: IterableMap::new(b"p"),
            agreements: IterableMap::new(b"a"),
            custody: LookupMap::new(b"c"),
            next_agreement_id: 0,
        }
    }

    /// Picks the single account the caller is willing to swap with, replacing
    /// any earlier choice. The configured fee plus the storage it adds must be attached.
    #[payable]
    #[handle_result]
    pub fn approve(&mut self, target: AccountId) -> Result<(), SwapError> {
        let caller = env::predecessor_account_id();
        if target == caller {
            return Err(SwapError::SelfApproval);
        }
        let attached = env::attached_deposit();
        self.fee_policy.assert_paid(attached)?;
        let initial_usage = env::storage_usage();

        let mut party = self.parties.get(&caller).cloned().unwrap_or_default();
        party.approved_target = Some(target.clone());
        self.parties.insert(caller.clone(), party);
        self.assert_storage_paid(
            initial_usage,
            attached.saturating_sub(self.fee_policy.fee),
        )?;

        log!("SWAP_APPROVED: actor='{}', target='{}'", caller, target);
        Ok(())
    }

    /// Installs the agreement between the caller and the account it approved.
    /// `give` is what the caller deposits, `receive` what the counterparty deposits.
    /// The attached deposit pays for the storage the agreement takes.
    #[payable]
    #[handle_result]
    pub fn create(
        &mut self,
        give: Vec<AssetRef>,
        receive: Vec<AssetRef>,
    ) -> Result<AgreementId, SwapError> {
        let initiator = env::predecessor_account_id();
        let initiator_party = self.parties.get(&initiator).cloned().unwrap_or_default();
        let counterparty = initiator_party
            .approved_target
            .clone()
            .ok_or(SwapError::ApprovalMissing)?;
        let counterparty_party = self.parties.get(&counterparty).cloned().unwrap_or_default();
        if !counterparty_party.approves(&initiator) {
            return Err(SwapError::ApprovalMissing);
        }
        if initiator_party.agreement.is_some() || counterparty_party.agreement.is_some() {
            return Err(SwapError::AgreementAlreadyExists);
        }

        let agreement = Agreement::new(initiator.clone(), counterparty.clone(), give, receive)?;
        if agreement
            .slots
            .iter()
            .any(|slot| self.custody.contains_key(&slot.asset))
        {
            return Err(SwapError::InvalidManifest(
                "an nft is still held under another agreement",
            ));
        }

        let initial_usage = env::storage_usage();
        let agreement_id = self.next_agreement_id;
        self.next_agreement_id += 1;
        self.agreements.insert(agreement_id, agreement);
        let bound = [
            (initiator.clone(), initiator_party),
            (counterparty, counterparty_party),
        ];
        for (account, mut party) in bound {
            party.agreement = Some(agreement_id);
            self.parties.insert(account, party);
        }
        self.assert_storage_paid(initial_usage, env::attached_deposit())?;

        log_swap_event("CREATED", agreement_id, &initiator, None);
        Ok(agreement_id)
    }

    /// Pulls one of the caller's promised nfts into escrow. The caller must own
    /// the token and have approved this contract on the collection (NEP-178).
    pub fn deposit(&mut self, collection: AccountId, token_id: TokenId) -> Promise {
        let depositor = env::predecessor_account_id();
        let asset = AssetRef::new(collection, token_id);
        let at = self
            .lock_deposit(&depositor, &asset)
            .unwrap_or_else(|err| err.abort());
        log_swap_event("DEPOSIT_STARTED", at.agreement_id, &depositor, Some(&asset));

        ext_nft::ext(asset.collection.clone())
            .with_static_gas(GAS_FOR_NFT_TOKEN)
            .nft_token(asset.token_id)
            .then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_OWNER_CHECK)
                    .on_deposit_owner_resolved(at, depositor),
            )
    }

    /// Sends an escrowed nft to the caller, who must be its current beneficiary:
    /// the depositor before the swap, the counterpart after it.
    pub fn withdraw(&mut self, collection: AccountId, token_id: TokenId) -> Promise {
        let caller = env::predecessor_account_id();
        let asset = AssetRef::new(collection, token_id);
        let at = self
            .lock_withdrawal(&caller, &asset)
            .unwrap_or_else(|err| err.abort());
        log_swap_event("WITHDRAWAL_STARTED", at.agreement_id, &caller, Some(&asset));

        ext_nft::ext(asset.collection.clone())
            .with_attached_deposit(ONE_YOCTO)
            .with_static_gas(GAS_FOR_NFT_TRANSFER)
            .nft_transfer(
                caller.clone(),
                asset.token_id,
                None,
                Some("nft swap withdrawal".to_string()),
            )
            .then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_SETTLEMENT)
                    .on_withdrawal_settled(at, caller),
            )
    }

    /// Tears down the caller's agreement for both parties. Only possible while
    /// the caller has nothing in escrow.
    #[handle_result]
    pub fn cancel(&mut self) -> Result<(), SwapError> {
        let caller = env::predecessor_account_id();
        let (agreement_id, agreement) = self
            .active_agreement(&caller)
            .ok_or(SwapError::NoActiveAgreement)?;
        if agreement.holds_custody_for(&caller) {
            return Err(SwapError::CustodyNotClear);
        }
        let parties = [agreement.initiator.clone(), agreement.counterparty.clone()];

        if let Some(agreement) = self.agreements.get_mut(&agreement_id) {
            agreement.cancelled = true;
        }
        for account in &parties {
            self.release_party(account, agreement_id);
        }

        log_swap_event("CANCELLED", agreement_id, &caller, None);
        self.retire_if_settled(agreement_id);
        Ok(())
    }

    #[handle_result]
    pub fn set_fee(&mut self, amount: U128) -> Result<(), SwapError> {
        let caller = env::predecessor_account_id();
        let fee = NearToken::from_yoctonear(amount.0);
        self.fee_policy.set_fee(&caller, fee)?;
        log!("SWAP_FEE_UPDATED: actor='{}', fee='{}'", caller, amount.0);
        Ok(())
    }

    // --- PRIVATE CALLBACKS ---
    #[private]
    pub fn on_deposit_owner_resolved(
        &mut self,
        at: SlotRef,
        depositor: AccountId,
    ) -> PromiseOrValue<bool> {
        let Some(asset) = self.slot_at(at).map(|slot| slot.asset.clone()) else {
            return PromiseOrValue::Value(false);
        };

        // A failed call or a response that is not a token reads as "not the owner".
        let approval_id = env::promise_result_checked(0, MAX_TOKEN_RESPONSE_LEN)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Option<JsonToken>>(&bytes).ok())
            .flatten()
            .filter(|token| token.owner_id == depositor)
            .ok_or(SwapError::NotAssetOwner)
            .and_then(|token| {
                token
                    .approval_id_for(&env::current_account_id())
                    .ok_or(SwapError::TransferNotApproved)
            });

        // No panic past this point: it would roll the unlock back.
        let approval_id = match approval_id {
            Ok(approval_id) => approval_id,
            Err(err) => {
                self.unlock_deposit(at, &depositor);
                log!(
                    "SWAP_DEPOSIT_REJECTED: agreement='{}', actor='{}', asset='{}:{}', reason='{}'",
                    at.agreement_id,
                    depositor,
                    asset.collection,
                    asset.token_id,
                    err
                );
                return PromiseOrValue::Value(false);
            }
        };

        ext_nft::ext(asset.collection)
            .with_attached_deposit(ONE_YOCTO)
            .with_static_gas(GAS_FOR_NFT_TRANSFER)
            .nft_transfer(
                env::current_account_id(),
                asset.token_id,
                Some(approval_id),
                Some("nft swap deposit".to_string()),
            )
            .then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_SETTLEMENT)
                    .on_deposit_settled(at, depositor),
            )
            .into()
    }

    #[private]
    pub fn on_deposit_settled(&mut self, at: SlotRef, depositor: AccountId) -> bool {
        if !promise_succeeded() {
            log!("NFT pull failed. Releasing the slot lock.");
            self.unlock_deposit(at, &depositor);
            return false;
        }
        self.complete_deposit(at, &depositor);
        true
    }

    #[private]
    pub fn on_withdrawal_settled(&mut self, at: SlotRef, beneficiary: AccountId) -> bool {
        let transferred = promise_succeeded();
        self.finish_withdrawal(at, &beneficiary, transferred);
        transferred
    }
}

// Only the outcome of `nft_transfer` matters, so its payload is never read.
fn promise_succeeded() -> bool {
    !matches!(env::promise_result_checked(0, 0), Err(PromiseError::Failed))
}

impl Contract {
    /// Writes pending collection changes and fails unless `available` pays for
    /// the bytes added since `initial_usage`.
    fn assert_storage_paid(
        &mut self,
        initial_usage: StorageUsage,
        available: NearToken,
    ) -> Result<(), SwapError> {
        self.parties.flush();
        self.agreements.flush();
        let added = env::storage_usage().saturating_sub(initial_usage);
        let required = env::storage_byte_cost().saturating_mul(u128::from(added));
        if available < required {
            return Err(SwapError::StorageDepositRequired {
                required: required.as_yoctonear(),
                attached: available.as_yoctonear(),
            });
        }
        Ok(())
    }
}

/// NEP-171 receiver: lets an owner deposit with `nft_transfer_call` on the
/// collection instead of approving this contract first.
#[near]
impl NonFungibleTokenReceiver for Contract {
    #[allow(unused_variables)]
    fn nft_on_transfer(
        &mut self,
        sender_id: AccountId,
        previous_owner_id: AccountId,
        token_id: TokenId,
        msg: String,
    ) -> PromiseOrValue<bool> {
        let asset = AssetRef::new(env::predecessor_account_id(), token_id);
        match self.accept_deposit(&previous_owner_id, &asset) {
            Ok(_) => PromiseOrValue::Value(false),
            Err(err) => {
                // Returning true hands the nft back to its previous owner.
                log!(
                    "SWAP_DEPOSIT_REJECTED: actor='{}', asset='{}:{}', reason='{}'",
                    previous_owner_id,
                    asset.collection,
                    asset.token_id,
                    err
                );
                PromiseOrValue::Value(true)
            }
        }
    }
}
