use near_sdk::{near, AccountId};

use crate::error::SwapError;

/// Sequential identifier of an installed agreement.
pub type AgreementId = u64;

/// NEP-171 token identifier.
pub type TokenId = String;

/// Upper bound on the number of assets a single manifest may name.
pub const MAX_SLOTS: usize = 32;

/// Reference to one externally owned NFT: the collection contract and the token in it.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssetRef {
    pub collection: AccountId,
    pub token_id: TokenId,
}

impl AssetRef {
    pub fn new(collection: AccountId, token_id: TokenId) -> Self {
        Self {
            collection,
            token_id,
        }
    }
}

/// Which principal of the agreement has to deposit a slot.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Initiator,
    Counterparty,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Initiator => Side::Counterparty,
            Side::Counterparty => Side::Initiator,
        }
    }
}

/// Custody state of one slot.
///
/// `Depositing` and `Withdrawing` mark a transfer in flight: the record is
/// committed before the collection is called and finalised by the callback,
/// so nothing else can touch the slot meanwhile.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Custody {
    Unfilled,
    Depositing(AccountId),
    /// Held for the depositor, who may still take it back.
    Deposited(AccountId),
    /// Held for the depositor's counterpart after the swap fired.
    Swapped(AccountId),
    Withdrawing(AccountId),
    Released,
}

impl Custody {
    /// The account currently entitled to withdraw, if the asset sits in escrow.
    pub fn beneficiary(&self) -> Option<&AccountId> {
        match self {
            Custody::Deposited(account) | Custody::Swapped(account) => Some(account),
            _ => None,
        }
    }

    /// True when the ledger holds, or is moving, the asset on behalf of `account`.
    pub fn is_held_for(&self, account: &AccountId) -> bool {
        match self {
            Custody::Depositing(holder)
            | Custody::Deposited(holder)
            | Custody::Swapped(holder)
            | Custody::Withdrawing(holder) => holder == account,
            Custody::Unfilled | Custody::Released => false,
        }
    }

    pub fn is_held(&self) -> bool {
        !matches!(self, Custody::Unfilled | Custody::Released)
    }
}

#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetSlot {
    pub asset: AssetRef,
    pub giver: Side,
    pub custody: Custody,
}

/// Where a held asset lives: the agreement and the slot position in its manifest.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotRef {
    pub agreement_id: AgreementId,
    pub slot: u32,
}

/// The swap terms installed by `create`, shared by both principals.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug)]
pub struct Agreement {
    pub initiator: AccountId,
    pub counterparty: AccountId,
    // Initiator's give-set first, then the counterparty's, in the order supplied.
    pub slots: Vec<AssetSlot>,
    pub swapped: bool,
    pub cancelled: bool,
}

impl Agreement {
    pub fn new(
        initiator: AccountId,
        counterparty: AccountId,
        give: Vec<AssetRef>,
        receive: Vec<AssetRef>,
    ) -> Result<Self, SwapError> {
        if give.is_empty() || receive.is_empty() {
            return Err(SwapError::InvalidManifest("both sides must give at least one nft"));
        }
        if give.len() + receive.len() > MAX_SLOTS {
            return Err(SwapError::InvalidManifest("too many nfts in one agreement"));
        }

        let slots: Vec<AssetSlot> = give
            .into_iter()
            .map(|asset| (asset, Side::Initiator))
            .chain(receive.into_iter().map(|asset| (asset, Side::Counterparty)))
            .map(|(asset, giver)| AssetSlot {
                asset,
                giver,
                custody: Custody::Unfilled,
            })
            .collect();

        for (i, slot) in slots.iter().enumerate() {
            if slots[..i].iter().any(|other| other.asset == slot.asset) {
                return Err(SwapError::InvalidManifest("the same nft is listed twice"));
            }
        }

        Ok(Self {
            initiator,
            counterparty,
            slots,
            swapped: false,
            cancelled: false,
        })
    }

    pub fn party(&self, side: Side) -> &AccountId {
        match side {
            Side::Initiator => &self.initiator,
            Side::Counterparty => &self.counterparty,
        }
    }

    pub fn side_of(&self, account: &AccountId) -> Option<Side> {
        if *account == self.initiator {
            Some(Side::Initiator)
        } else if *account == self.counterparty {
            Some(Side::Counterparty)
        } else {
            None
        }
    }

    pub fn counterpart_of(&self, account: &AccountId) -> Option<&AccountId> {
        self.side_of(account).map(|side| self.party(side.opposite()))
    }

    pub fn slot(&self, index: u32) -> Option<&AssetSlot> {
        self.slots.get(index as usize)
    }

    pub fn slot_mut(&mut self, index: u32) -> Option<&mut AssetSlot> {
        self.slots.get_mut(index as usize)
    }

    /// Index of the still unfilled slot `depositor` has to give for `asset`.
    pub fn fillable_slot(&self, depositor: &AccountId, asset: &AssetRef) -> Result<u32, SwapError> {
        let side = self.side_of(depositor).ok_or(SwapError::AssetNotManaged)?;
        if self.swapped || self.cancelled {
            return Err(SwapError::AssetNotManaged);
        }
        self.slots
            .iter()
            .position(|slot| {
                slot.giver == side && slot.asset == *asset && slot.custody == Custody::Unfilled
            })
            .map(|index| index as u32)
            .ok_or(SwapError::AssetNotManaged)
    }

    /// Fires the swap if every slot on both sides is deposited. Each slot is
    /// handed to the counterpart of its depositor. Returns whether it fired.
    pub fn trigger_swap(&mut self) -> bool {
        if self.swapped || self.cancelled {
            return false;
        }
        if !self
            .slots
            .iter()
            .all(|slot| matches!(slot.custody, Custody::Deposited(_)))
        {
            return false;
        }

        let initiator = self.initiator.clone();
        let counterparty = self.counterparty.clone();
        for slot in self.slots.iter_mut() {
            let beneficiary = match slot.giver {
                Side::Initiator => counterparty.clone(),
                Side::Counterparty => initiator.clone(),
            };
            slot.custody = Custody::Swapped(beneficiary);
        }
        self.swapped = true;
        true
    }

    pub fn holds_custody_for(&self, account: &AccountId) -> bool {
        self.slots.iter().any(|slot| slot.custody.is_held_for(account))
    }

    /// True while `account` has received slots left to withdraw, including ones in flight.
    pub fn has_unclaimed_swaps(&self, account: &AccountId) -> bool {
        self.slots.iter().any(|slot| match &slot.custody {
            Custody::Swapped(holder) | Custody::Withdrawing(holder) => holder == account,
            _ => false,
        })
    }

    pub fn claimable_swaps(&self, account: &AccountId) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.custody == Custody::Swapped(account.clone()))
            .count()
    }

    /// No slot is held or moving.
    pub fn is_settled(&self) -> bool {
        self.slots.iter().all(|slot| !slot.custody.is_held())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountId {
        name.parse().unwrap()
    }

    fn asset(collection: &str, token_id: &str) -> AssetRef {
        AssetRef::new(account(collection), token_id.to_string())
    }

    fn sample() -> Agreement {
        Agreement::new(
            account("alice.near"),
            account("bob.near"),
            vec![asset("nft1.near", "1"), asset("nft2.near", "1")],
            vec![asset("nft1.near", "2")],
        )
        .unwrap()
    }

    #[test]
    fn slots_keep_creation_order() {
        let agreement = sample();
        let givers: Vec<Side> = agreement.slots.iter().map(|s| s.giver).collect();
        assert_eq!(
            givers,
            vec![Side::Initiator, Side::Initiator, Side::Counterparty]
        );
        assert_eq!(agreement.slots[2].asset, asset("nft1.near", "2"));
        assert!(agreement
            .slots
            .iter()
            .all(|s| s.custody == Custody::Unfilled));
    }

    #[test]
    fn rejects_empty_and_duplicate_manifests() {
        let err = Agreement::new(
            account("alice.near"),
            account("bob.near"),
            vec![],
            vec![asset("nft1.near", "2")],
        )
        .unwrap_err();
        assert!(matches!(err, SwapError::InvalidManifest(_)));

        let err = Agreement::new(
            account("alice.near"),
            account("bob.near"),
            vec![asset("nft1.near", "1")],
            vec![asset("nft1.near", "1")],
        )
        .unwrap_err();
        assert!(matches!(err, SwapError::InvalidManifest(_)));
    }

    #[test]
    fn only_the_giving_side_can_fill_a_slot() {
        let agreement = sample();
        assert_eq!(
            agreement.fillable_slot(&account("alice.near"), &asset("nft2.near", "1")),
            Ok(1)
        );
        assert_eq!(
            agreement.fillable_slot(&account("bob.near"), &asset("nft2.near", "1")),
            Err(SwapError::AssetNotManaged)
        );
        assert_eq!(
            agreement.fillable_slot(&account("carol.near"), &asset("nft1.near", "2")),
            Err(SwapError::AssetNotManaged)
        );
    }

    #[test]
    fn swap_fires_once_everything_is_deposited() {
        let mut agreement = sample();
        agreement.slots[0].custody = Custody::Deposited(account("alice.near"));
        agreement.slots[1].custody = Custody::Deposited(account("alice.near"));
        assert!(!agreement.trigger_swap());

        agreement.slots[2].custody = Custody::Deposited(account("bob.near"));
        assert!(agreement.trigger_swap());
        assert!(agreement.swapped);
        assert_eq!(agreement.slots[0].custody, Custody::Swapped(account("bob.near")));
        assert_eq!(agreement.slots[2].custody, Custody::Swapped(account("alice.near")));
        assert_eq!(agreement.claimable_swaps(&account("bob.near")), 2);

        assert!(!agreement.trigger_swap());
    }

    #[test]
    fn in_flight_deposit_blocks_the_swap() {
        let mut agreement = sample();
        agreement.slots[0].custody = Custody::Deposited(account("alice.near"));
        agreement.slots[1].custody = Custody::Depositing(account("alice.near"));
        agreement.slots[2].custody = Custody::Deposited(account("bob.near"));
        assert!(!agreement.trigger_swap());
        assert!(agreement.holds_custody_for(&account("alice.near")));
        assert!(!agreement.is_settled());
    }
}
