use crate::error::{RaffleError, Result};
use crate::types::{Amount, ParticipantId};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Delivers a settled pot to the winner.
#[async_trait]
pub trait PayoutSink: Send + Sync {
    /// Fails with `TransferFailed` when the funds could not be delivered.
    async fn transfer(&self, to: &ParticipantId, amount: Amount) -> Result<()>;
}

/// Credits payouts to in-memory balances.
#[derive(Debug, Default)]
pub struct InMemoryBank {
    balances: RwLock<HashMap<ParticipantId, Amount>>,
    rejecting: AtomicBool,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every transfer fails.
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    pub fn balance_of(&self, participant: &ParticipantId) -> Amount {
        self.balances
            .read()
            .get(participant)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    pub fn total_paid(&self) -> Amount {
        self.balances
            .read()
            .values()
            .fold(Amount::ZERO, |acc, a| acc.checked_add(*a).unwrap_or(acc))
    }
}

#[async_trait]
impl PayoutSink for InMemoryBank {
    async fn transfer(&self, to: &ParticipantId, amount: Amount) -> Result<()> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(RaffleError::transfer_failed(format!(
                "Recipient {} rejected {} wei",
                to, amount
            )));
        }

        let mut balances = self.balances.write();
        let balance = balances.entry(to.clone()).or_insert(Amount::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| RaffleError::transfer_failed(format!("Balance overflow for {}", to)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transfer_credits_recipient() {
        let bank = InMemoryBank::new();
        let alice = ParticipantId::new("alice");

        bank.transfer(&alice, Amount::from_wei(30)).await.unwrap();
        bank.transfer(&alice, Amount::from_wei(5)).await.unwrap();

        assert_eq!(bank.balance_of(&alice), Amount::from_wei(35));
        assert_eq!(bank.total_paid(), Amount::from_wei(35));
    }

    #[tokio::test]
    async fn test_rejecting_bank_fails_transfer() {
        let bank = InMemoryBank::new();
        let alice = ParticipantId::new("alice");
        bank.set_rejecting(true);

        let err = bank.transfer(&alice, Amount::from_wei(30)).await;
        assert!(matches!(err, Err(RaffleError::TransferFailed(_))));
        assert_eq!(bank.balance_of(&alice), Amount::ZERO);
    }
}
