pub mod ledger;

pub use ledger::{Entry, PotLedger};

use crate::clock::interval_elapsed;
use crate::error::{RaffleError, Result};
use crate::types::{Amount, ParticipantId, RandomWord, RequestId};
use crate::upkeep::UpkeepDiagnostic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    /// Accepting entries.
    Open,
    /// Settlement in flight, entries rejected.
    Calculating,
}

/// The single, reset-in-place unit of play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    state: RoundState,
    ledger: PotLedger,
    last_settled_at: DateTime<Utc>,
    pending_request: Option<RequestId>,
    recent_winner: Option<ParticipantId>,
    round_number: u64,
    /// Winner chosen for the pending request whose payout has not gone through yet.
    locked_winner: Option<usize>,
}

/// Outcome of a completed settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub round_number: u64,
    pub request_id: RequestId,
    pub winner: ParticipantId,
    pub winner_index: usize,
    pub payout: Amount,
    pub entrants: usize,
    pub settled_at: DateTime<Utc>,
}

/// Scalar state of a round, cheap to copy on every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    pub state: RoundState,
    pub players: usize,
    pub balance: Amount,
    pub last_settled_at: DateTime<Utc>,
    pub pending_request: Option<RequestId>,
    pub recent_winner: Option<ParticipantId>,
    pub round_number: u64,
    pub payout_retry_pending: bool,
}

impl RoundSummary {
    pub fn upkeep_diagnostic(&self, now: DateTime<Utc>, interval: Duration) -> UpkeepDiagnostic {
        UpkeepDiagnostic {
            time_passed: interval_elapsed(self.last_settled_at, now, interval),
            is_open: self.state == RoundState::Open && self.pending_request.is_none(),
            has_players: self.players > 0,
            has_balance: !self.balance.is_zero(),
        }
    }
}

impl Round {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: RoundState::Open,
            ledger: PotLedger::new(),
            last_settled_at: now,
            pending_request: None,
            recent_winner: None,
            round_number: 1,
            locked_winner: None,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn ledger(&self) -> &PotLedger {
        &self.ledger
    }

    pub fn last_settled_at(&self) -> DateTime<Utc> {
        self.last_settled_at
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending_request
    }

    pub fn recent_winner(&self) -> Option<&ParticipantId> {
        self.recent_winner.as_ref()
    }

    pub fn round_number(&self) -> u64 {
        self.round_number
    }

    pub fn locked_winner(&self) -> Option<usize> {
        self.locked_winner
    }

    pub fn upkeep_diagnostic(&self, now: DateTime<Utc>, interval: Duration) -> UpkeepDiagnostic {
        self.summary().upkeep_diagnostic(now, interval)
    }

    /// Constant-size view of the round; does not copy the entries.
    pub fn summary(&self) -> RoundSummary {
        RoundSummary {
            state: self.state,
            players: self.ledger.len(),
            balance: self.ledger.balance(),
            last_settled_at: self.last_settled_at,
            pending_request: self.pending_request,
            recent_winner: self.recent_winner.clone(),
            round_number: self.round_number,
            payout_retry_pending: self.locked_winner.is_some(),
        }
    }

    pub(crate) fn enter(
        &mut self,
        participant: ParticipantId,
        paid: Amount,
        entrance_fee: Amount,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if paid < entrance_fee {
            return Err(RaffleError::InsufficientPayment {
                required: entrance_fee,
                paid,
            });
        }

        if self.state != RoundState::Open {
            return Err(RaffleError::RoundNotOpen);
        }

        self.ledger.record(participant, paid, now)
    }

    pub(crate) fn begin_calculating(&mut self, request_id: RequestId) {
        self.state = RoundState::Calculating;
        self.pending_request = Some(request_id);
        self.locked_winner = None;
    }

    /// Picks the winner index for a callback, or rejects the callback.
    ///
    /// Once a winner has been locked for the pending request the words are
    /// ignored so a redelivery cannot re-roll the draw.
    pub(crate) fn resolve_winner(&self, request_id: RequestId, words: &[RandomWord]) -> Result<usize> {
        if self.state != RoundState::Calculating || self.pending_request != Some(request_id) {
            return Err(RaffleError::UnknownRequest(request_id));
        }

        if let Some(index) = self.locked_winner {
            return Ok(index);
        }

        let word = words
            .first()
            .ok_or(RaffleError::MissingRandomWords(request_id))?;

        word.reduce(self.ledger.len())
            .ok_or_else(|| RaffleError::internal("Calculating round has no entrants"))
    }

    pub(crate) fn lock_winner(&mut self, index: usize) {
        self.locked_winner = Some(index);
    }

    /// Resets the round after the pot has been delivered to `winner_index`.
    pub(crate) fn finish_settlement(&mut self, winner_index: usize, now: DateTime<Utc>) -> Result<Settlement> {
        let request_id = self
            .pending_request
            .ok_or_else(|| RaffleError::internal("Settling without a pending request"))?;
        let winner = self
            .ledger
            .participant(winner_index)
            .cloned()
            .ok_or(RaffleError::PlayerIndexOutOfRange(winner_index))?;

        let (entries, payout) = self.ledger.drain();
        let settlement = Settlement {
            round_number: self.round_number,
            request_id,
            winner: winner.clone(),
            winner_index,
            payout,
            entrants: entries.len(),
            settled_at: now,
        };

        self.recent_winner = Some(winner);
        self.last_settled_at = now;
        self.pending_request = None;
        self.locked_winner = None;
        self.state = RoundState::Open;
        self.round_number += 1;

        Ok(settlement)
    }

    /// Checks the structural invariants of a round, e.g. one loaded from a snapshot.
    pub fn validate(&self) -> Result<()> {
        self.ledger.verify()?;

        match (self.state, self.pending_request) {
            (RoundState::Open, Some(id)) => {
                return Err(RaffleError::invalid_state(format!(
                    "Open round has pending request {}",
                    id
                )))
            }
            (RoundState::Calculating, None) => {
                return Err(RaffleError::invalid_state(
                    "Calculating round has no pending request",
                ))
            }
            _ => {}
        }

        if self.state == RoundState::Calculating && self.ledger.is_empty() {
            return Err(RaffleError::invalid_state(
                "Calculating round has no entrants",
            ));
        }

        match self.locked_winner {
            Some(_) if self.state != RoundState::Calculating => Err(RaffleError::invalid_state(
                "Locked winner outside of settlement",
            )),
            Some(index) if index >= self.ledger.len() => Err(RaffleError::invalid_state(
                format!("Locked winner {} out of range", index),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee() -> Amount {
        Amount::from_wei(10)
    }

    fn calculating_round(players: &[&str]) -> Round {
        let mut round = Round::new(Utc::now());
        for p in players {
            round.enter((*p).into(), fee(), fee(), Utc::now()).unwrap();
        }
        round.begin_calculating(RequestId(1));
        round
    }

    #[test]
    fn test_enter_checks_fee_then_state() {
        let mut round = Round::new(Utc::now());
        let err = round.enter("alice".into(), Amount::from_wei(9), fee(), Utc::now());
        assert!(matches!(err, Err(RaffleError::InsufficientPayment { .. })));
        assert!(round.ledger().is_empty());

        round.enter("alice".into(), fee(), fee(), Utc::now()).unwrap();
        round.begin_calculating(RequestId(1));

        let err = round.enter("bob".into(), fee(), fee(), Utc::now());
        assert!(matches!(err, Err(RaffleError::RoundNotOpen)));
        assert_eq!(round.ledger().len(), 1);
    }

    #[test]
    fn test_resolve_rejects_unknown_request() {
        let round = calculating_round(&["alice", "bob"]);
        let err = round.resolve_winner(RequestId(2), &[RandomWord::from(1)]);
        assert!(matches!(err, Err(RaffleError::UnknownRequest(RequestId(2)))));

        let open = Round::new(Utc::now());
        let err = open.resolve_winner(RequestId(1), &[RandomWord::from(1)]);
        assert!(matches!(err, Err(RaffleError::UnknownRequest(_))));
    }

    #[test]
    fn test_resolve_requires_words() {
        let round = calculating_round(&["alice"]);
        let err = round.resolve_winner(RequestId(1), &[]);
        assert!(matches!(err, Err(RaffleError::MissingRandomWords(RequestId(1)))));
    }

    #[test]
    fn test_locked_winner_ignores_new_words() {
        let mut round = calculating_round(&["alice", "bob", "carol"]);
        assert_eq!(round.resolve_winner(RequestId(1), &[RandomWord::from(37)]).unwrap(), 1);

        round.lock_winner(1);
        assert_eq!(round.resolve_winner(RequestId(1), &[RandomWord::from(2)]).unwrap(), 1);
    }

    #[test]
    fn test_finish_settlement_resets_round() {
        let mut round = calculating_round(&["alice", "bob", "carol"]);
        let later = Utc::now() + chrono::Duration::seconds(90);

        let settlement = round.finish_settlement(1, later).unwrap();
        assert_eq!(settlement.winner, ParticipantId::new("bob"));
        assert_eq!(settlement.payout, Amount::from_wei(30));
        assert_eq!(settlement.round_number, 1);

        assert_eq!(round.state(), RoundState::Open);
        assert!(round.ledger().is_empty());
        assert_eq!(round.ledger().balance(), Amount::ZERO);
        assert_eq!(round.pending_request(), None);
        assert_eq!(round.recent_winner(), Some(&ParticipantId::new("bob")));
        assert_eq!(round.last_settled_at(), later);
        assert_eq!(round.round_number(), 2);
        assert!(round.validate().is_ok());
    }

    #[test]
    fn test_validate_flags_broken_invariants() {
        let mut round = Round::new(Utc::now());
        round.pending_request = Some(RequestId(3));
        assert!(round.validate().is_err());

        let mut round = Round::new(Utc::now());
        round.state = RoundState::Calculating;
        round.pending_request = Some(RequestId(3));
        assert!(round.validate().is_err());
    }

    #[test]
    fn test_summary_matches_round() {
        let mut round = calculating_round(&["alice", "bob"]);
        round.lock_winner(0);
        let later = Utc::now() + chrono::Duration::seconds(120);

        let summary = round.summary();
        assert_eq!(summary.state, RoundState::Calculating);
        assert_eq!(summary.players, 2);
        assert_eq!(summary.balance, Amount::from_wei(20));
        assert_eq!(summary.pending_request, Some(RequestId(1)));
        assert!(summary.payout_retry_pending);
        assert_eq!(
            summary.upkeep_diagnostic(later, Duration::from_secs(60)),
            round.upkeep_diagnostic(later, Duration::from_secs(60))
        );
        assert_eq!(
            round.ledger().participants(),
            vec![ParticipantId::new("alice"), ParticipantId::new("bob")]
        );
    }

    #[test]
    fn test_diagnostic_requires_all_conditions() {
        let start = Utc::now();
        let mut round = Round::new(start);
        let interval = Duration::from_secs(60);
        let later = start + chrono::Duration::seconds(61);

        assert!(!round.upkeep_diagnostic(later, interval).is_ready());

        round.enter("alice".into(), fee(), fee(), start).unwrap();
        assert!(!round.upkeep_diagnostic(start, interval).is_ready());
        assert!(round.upkeep_diagnostic(later, interval).is_ready());

        round.begin_calculating(RequestId(1));
        let diagnostic = round.upkeep_diagnostic(later, interval);
        assert!(!diagnostic.is_open);
        assert!(!diagnostic.is_ready());
    }
}
