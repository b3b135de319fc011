use near_sdk::{env, FunctionError};
use thiserror::Error;

/// Every way a swap operation can be rejected. Any of these aborts the
/// receipt, so no state written by the failing call survives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    #[error("you cannot approve yourself")]
    SelfApproval,

    #[error("fee is required to approve target: required {required}, attached {attached}")]
    PaymentRequired { required: u128, attached: u128 },

    #[error("attach a deposit for storage: required {required}, attached {attached}")]
    StorageDepositRequired { required: u128, attached: u128 },

    #[error("both parties must approve each other before creating an agreement")]
    ApprovalMissing,

    #[error("an agreement already exists for one of the parties")]
    AgreementAlreadyExists,

    #[error("that nft is not under management")]
    AssetNotManaged,

    #[error("you don't own this nft")]
    NotAssetOwner,

    #[error("the swap contract is not approved to transfer this nft")]
    TransferNotApproved,

    #[error("you are not the beneficiary of this nft")]
    NotBeneficiary,

    #[error("nothing to cancel")]
    NoActiveAgreement,

    #[error("withdraw nfts first")]
    CustodyNotClear,

    #[error("invalid manifest: {0}")]
    InvalidManifest(&'static str),

    #[error("only the owner can call this method")]
    Unauthorized,
}

impl SwapError {
    /// Aborts the current receipt with this error's message.
    pub fn abort(&self) -> ! {
        env::panic_str(&self.to_string())
    }
}

impl FunctionError for SwapError {
    fn panic(&self) -> ! {
        self.abort()
    }
}
