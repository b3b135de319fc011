use near_sdk::AccountId;

use crate::agreement::{Agreement, AgreementId, AssetRef, AssetSlot, Custody, SlotRef};
use crate::error::SwapError;
use crate::utils::log_swap_event;
use crate::Contract;

// Ledger bookkeeping. Every method here commits its state before any
// cross-contract call is issued by the caller.
impl Contract {
    pub(crate) fn active_agreement(
        &self,
        account_id: &AccountId,
    ) -> Option<(AgreementId, &Agreement)> {
        let agreement_id = self.parties.get(account_id)?.agreement?;
        self.agreements
            .get(&agreement_id)
            .map(|agreement| (agreement_id, agreement))
    }

    pub(crate) fn slot_at(&self, at: SlotRef) -> Option<&AssetSlot> {
        self.agreements.get(&at.agreement_id)?.slot(at.slot)
    }

    fn slot_at_mut(&mut self, at: SlotRef) -> Option<&mut AssetSlot> {
        self.agreements.get_mut(&at.agreement_id)?.slot_mut(at.slot)
    }

    /// Reserves `depositor`'s unfilled give-slot for `asset` ahead of the pull transfer.
    pub(crate) fn lock_deposit(
        &mut self,
        depositor: &AccountId,
        asset: &AssetRef,
    ) -> Result<SlotRef, SwapError> {
        let (agreement_id, agreement) = self
            .active_agreement(depositor)
            .ok_or(SwapError::AssetNotManaged)?;
        let slot = agreement.fillable_slot(depositor, asset)?;
        if self.custody.contains_key(asset) {
            // Already sitting in escrow, so the depositor cannot be its owner.
            return Err(SwapError::NotAssetOwner);
        }

        let at = SlotRef { agreement_id, slot };
        if let Some(entry) = self.slot_at_mut(at) {
            entry.custody = Custody::Depositing(depositor.clone());
        }
        self.custody.insert(asset.clone(), at);
        Ok(at)
    }

    /// Undoes `lock_deposit` after the ownership check or the transfer failed.
    pub(crate) fn unlock_deposit(&mut self, at: SlotRef, depositor: &AccountId) {
        let Some(entry) = self.slot_at_mut(at) else {
            return;
        };
        if entry.custody != Custody::Depositing(depositor.clone()) {
            return;
        }
        entry.custody = Custody::Unfilled;
        let asset = entry.asset.clone();
        self.custody.remove(&asset);
        self.retire_if_settled(at.agreement_id);
    }

    /// Records the nft as held for `depositor` and fires the swap if this was the last one.
    pub(crate) fn complete_deposit(&mut self, at: SlotRef, depositor: &AccountId) -> bool {
        let Some(agreement) = self.agreements.get_mut(&at.agreement_id) else {
            return false;
        };
        let Some(entry) = agreement.slot_mut(at.slot) else {
            return false;
        };
        entry.custody = Custody::Deposited(depositor.clone());
        let asset = entry.asset.clone();
        log_swap_event("DEPOSITED", at.agreement_id, depositor, Some(&asset));

        let swapped = agreement.trigger_swap();
        if swapped {
            log_swap_event("SWAPPED", at.agreement_id, depositor, None);
        }
        swapped
    }

    /// Push-path deposit: the collection already moved `asset` to us on behalf of `depositor`.
    pub(crate) fn accept_deposit(
        &mut self,
        depositor: &AccountId,
        asset: &AssetRef,
    ) -> Result<SlotRef, SwapError> {
        let (agreement_id, agreement) = self
            .active_agreement(depositor)
            .ok_or(SwapError::AssetNotManaged)?;
        let slot = agreement.fillable_slot(depositor, asset)?;
        if self.custody.contains_key(asset) {
            return Err(SwapError::NotAssetOwner);
        }

        let at = SlotRef { agreement_id, slot };
        self.custody.insert(asset.clone(), at);
        self.complete_deposit(at, depositor);
        Ok(at)
    }

    /// Locks a held slot for its current beneficiary ahead of the outbound transfer.
    pub(crate) fn lock_withdrawal(
        &mut self,
        caller: &AccountId,
        asset: &AssetRef,
    ) -> Result<SlotRef, SwapError> {
        let at = *self.custody.get(asset).ok_or(SwapError::AssetNotManaged)?;
        let entry = self.slot_at_mut(at).ok_or(SwapError::AssetNotManaged)?;
        if entry.custody.beneficiary() != Some(caller) {
            return Err(SwapError::NotBeneficiary);
        }
        entry.custody = Custody::Withdrawing(caller.clone());
        Ok(at)
    }

    /// Finalises a withdrawal. On failure the slot goes back to the escrowed
    /// state it was locked from, which may complete the swap.
    pub(crate) fn finish_withdrawal(
        &mut self,
        at: SlotRef,
        beneficiary: &AccountId,
        transferred: bool,
    ) {
        let Some(agreement) = self.agreements.get_mut(&at.agreement_id) else {
            return;
        };
        let swapped = agreement.swapped;
        let Some(entry) = agreement.slot_mut(at.slot) else {
            return;
        };
        if entry.custody != Custody::Withdrawing(beneficiary.clone()) {
            return;
        }

        if !transferred {
            entry.custody = if swapped {
                Custody::Swapped(beneficiary.clone())
            } else {
                Custody::Deposited(beneficiary.clone())
            };
            let asset = entry.asset.clone();
            log_swap_event("WITHDRAWAL_FAILED", at.agreement_id, beneficiary, Some(&asset));

            // The other deposits may have landed while this slot was locked.
            if agreement.trigger_swap() {
                log_swap_event("SWAPPED", at.agreement_id, beneficiary, None);
            }
            return;
        }

        entry.custody = Custody::Released;
        let asset = entry.asset.clone();
        let spent = swapped && !agreement.has_unclaimed_swaps(beneficiary);
        self.custody.remove(&asset);
        log_swap_event("WITHDRAWN", at.agreement_id, beneficiary, Some(&asset));

        if spent {
            self.release_party(beneficiary, at.agreement_id);
        }
        self.retire_if_settled(at.agreement_id);
    }

    /// Clears `account_id`'s approval and agreement link if it still points at `agreement_id`.
    pub(crate) fn release_party(&mut self, account_id: &AccountId, agreement_id: AgreementId) {
        let Some(party) = self.parties.get_mut(account_id) else {
            return;
        };
        if party.release(agreement_id) && party.is_empty() {
            self.parties.remove(account_id);
        }
    }

    /// Drops an agreement nobody is bound to any more once nothing is held under it.
    pub(crate) fn retire_if_settled(&mut self, agreement_id: AgreementId) {
        let Some(agreement) = self.agreements.get(&agreement_id) else {
            return;
        };
        let linked = [&agreement.initiator, &agreement.counterparty]
            .into_iter()
            .any(|account| {
                self.parties
                    .get(account)
                    .is_some_and(|party| party.agreement == Some(agreement_id))
            });
        if linked || !agreement.is_settled() {
            return;
        }

        let initiator = agreement.initiator.clone();
        self.agreements.remove(&agreement_id);
        log_swap_event("RETIRED", agreement_id, &initiator, None);
    }
}
