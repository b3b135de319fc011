use near_sdk::{env, AccountId};

use crate::agreement::{AgreementId, AssetRef};

// Helper for consistent logging
pub fn log_swap_event(
    event: &str,
    agreement_id: AgreementId,
    actor: &AccountId,
    asset: Option<&AssetRef>,
) {
    match asset {
        Some(asset) => env::log_str(&format!(
            "SWAP_{}: agreement='{}', actor='{}', asset='{}:{}'",
            event, agreement_id, actor, asset.collection, asset.token_id
        )),
        None => env::log_str(&format!(
            "SWAP_{}: agreement='{}', actor='{}'",
            event, agreement_id, actor
        )),
    }
}
