use thiserror::Error;
use tracing::info;

use crate::datastore::{Datastore, Transfer, TransferOutcome};
use crate::fighter::Fighter;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("no manager profile for {0}; run setup first")]
    NoProfile(String),
    #[error("fighter {0} not found")]
    UnknownFighter(i64),
    #[error("{0} is not on the market")]
    AlreadyOwned(String),
    #[error("not enough cash: {price} needed, {cash} available")]
    InsufficientFunds { cash: i64, price: i64 },
    #[error("balance or ownership changed during the purchase; nothing was charged")]
    Conflict,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl MarketError {
    /// Rejections happen before any write is issued.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoProfile(_) | Self::UnknownFighter(_) | Self::AlreadyOwned(_) | Self::InsufficientFunds { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Purchase {
    pub fighter: Fighter,
    pub price: i64,
    pub cash_left: i64,
}

pub fn listings(store: &mut dyn Datastore) -> anyhow::Result<Vec<Fighter>> {
    store.market_listings()
}

pub fn purchase(store: &mut dyn Datastore, buyer_id: &str, fighter_id: i64) -> Result<Purchase, MarketError> {
    let profile = store
        .profile(buyer_id)?
        .ok_or_else(|| MarketError::NoProfile(buyer_id.to_string()))?;
    let fighter = store
        .fighter(fighter_id)?
        .ok_or(MarketError::UnknownFighter(fighter_id))?;

    if !fighter.on_market() {
        return Err(MarketError::AlreadyOwned(fighter.name));
    }
    if profile.cash < fighter.value {
        return Err(MarketError::InsufficientFunds {
            cash: profile.cash,
            price: fighter.value,
        });
    }

    // Everything above only reads; the transfer is the one write.
    let transfer = Transfer {
        buyer_id: buyer_id.to_string(),
        fighter_id,
        price: fighter.value,
        expected_cash: profile.cash,
    };
    match store.transfer_fighter(&transfer)? {
        TransferOutcome::Completed { cash_left } => {
            info!(buyer = buyer_id, fighter = %fighter.name, price = fighter.value, "fighter bought");
            let price = fighter.value;
            let mut fighter = fighter;
            fighter.owner_id = Some(buyer_id.to_string());
            Ok(Purchase {
                fighter,
                price,
                cash_left,
            })
        }
        TransferOutcome::Conflict => Err(MarketError::Conflict),
    }
}
