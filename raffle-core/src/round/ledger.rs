use crate::error::{RaffleError, Result};
use crate::types::{Amount, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One paid entry in the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub participant: ParticipantId,
    pub paid: Amount,
    pub entered_at: DateTime<Utc>,
}

/// Entrants and accumulated pot of the current round.
///
/// Entry order is the winner index space. The entry list and the balance
/// only ever change together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotLedger {
    entries: Vec<Entry>,
    balance: Amount,
}

impl PotLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn participant(&self, index: usize) -> Option<&ParticipantId> {
        self.entries.get(index).map(|e| &e.participant)
    }

    pub fn participants(&self) -> Vec<ParticipantId> {
        self.entries.iter().map(|e| e.participant.clone()).collect()
    }

    pub(crate) fn record(
        &mut self,
        participant: ParticipantId,
        paid: Amount,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let balance = self
            .balance
            .checked_add(paid)
            .ok_or_else(|| RaffleError::internal("Pot balance overflow"))?;

        self.entries.push(Entry {
            participant,
            paid,
            entered_at: at,
        });
        self.balance = balance;
        Ok(())
    }

    /// Empties the ledger, returning what it held.
    pub(crate) fn drain(&mut self) -> (Vec<Entry>, Amount) {
        let balance = std::mem::replace(&mut self.balance, Amount::ZERO);
        (std::mem::take(&mut self.entries), balance)
    }

    /// Checks that the balance is the sum of the recorded payments.
    pub fn verify(&self) -> Result<()> {
        let sum = self
            .entries
            .iter()
            .try_fold(Amount::ZERO, |acc, e| acc.checked_add(e.paid))
            .ok_or_else(|| RaffleError::invalid_state("Entry payments overflow"))?;

        if sum != self.balance {
            return Err(RaffleError::invalid_state(format!(
                "Pot balance {} does not match entry payments {}",
                self.balance, sum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accumulates_in_order() {
        let mut ledger = PotLedger::new();
        let now = Utc::now();
        ledger.record("alice".into(), Amount::from_wei(10), now).unwrap();
        ledger.record("bob".into(), Amount::from_wei(15), now).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.balance(), Amount::from_wei(25));
        assert_eq!(ledger.participant(1), Some(&ParticipantId::new("bob")));
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_overflow_leaves_ledger_untouched() {
        let mut ledger = PotLedger::new();
        let now = Utc::now();
        ledger
            .record("alice".into(), Amount::from_wei(u128::MAX), now)
            .unwrap();

        let err = ledger.record("bob".into(), Amount::from_wei(1), now);
        assert!(matches!(err, Err(RaffleError::Internal(_))));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.balance(), Amount::from_wei(u128::MAX));
    }

    #[test]
    fn test_drain_resets_both() {
        let mut ledger = PotLedger::new();
        ledger
            .record("alice".into(), Amount::from_wei(10), Utc::now())
            .unwrap();

        let (entries, balance) = ledger.drain();
        assert_eq!(entries.len(), 1);
        assert_eq!(balance, Amount::from_wei(10));
        assert!(ledger.is_empty());
        assert_eq!(ledger.balance(), Amount::ZERO);
    }

    #[test]
    fn test_verify_detects_mismatch() {
        let json = r#"{"entries":[],"balance":5}"#;
        let ledger: PotLedger = serde_json::from_str(json).unwrap();
        assert!(matches!(ledger.verify(), Err(RaffleError::InvalidState(_))));
    }
}
