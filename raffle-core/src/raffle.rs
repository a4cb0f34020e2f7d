use crate::clock::Clock;
use crate::config::RaffleConfig;
use crate::error::{RaffleError, Result};
use crate::events::RaffleEvent;
use crate::oracle::{RandomnessConsumer, RandomnessOracle, RandomnessRequest};
use crate::payout::PayoutSink;
use crate::round::{Round, RoundState, RoundSummary, Settlement};
use crate::types::{Amount, ParticipantId, RandomWord, RequestId};
use crate::upkeep::UpkeepCheck;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;

/// The self-operating lottery.
///
/// Every mutating operation holds `round` for its whole duration, including
/// the oracle request and the payout transfer. A summary of the last committed
/// round is kept in `published`, which is what `check_upkeep` and the scalar
/// getters read.
pub struct Raffle {
    id: Uuid,
    config: RaffleConfig,
    oracle: Arc<dyn RandomnessOracle>,
    payouts: Arc<dyn PayoutSink>,
    clock: Arc<dyn Clock>,
    round: Mutex<Round>,
    published: RwLock<RoundSummary>,
    events: broadcast::Sender<RaffleEvent>,
}

impl Raffle {
    pub fn new(
        config: RaffleConfig,
        oracle: Arc<dyn RandomnessOracle>,
        payouts: Arc<dyn PayoutSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let round = Round::new(clock.now());
        Ok(Self::assemble(Uuid::new_v4(), config, round, oracle, payouts, clock))
    }

    /// Rebuilds a raffle from a previously exported snapshot, keeping its id.
    pub fn restore(
        config: RaffleConfig,
        snapshot: RaffleSnapshot,
        oracle: Arc<dyn RandomnessOracle>,
        payouts: Arc<dyn PayoutSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let RaffleSnapshot { raffle_id, round } = snapshot;
        round.validate()?;

        tracing::info!(
            "Restoring raffle {} at round {} ({:?}, {} players)",
            raffle_id,
            round.round_number(),
            round.state(),
            round.ledger().len()
        );
        Ok(Self::assemble(raffle_id, config, round, oracle, payouts, clock))
    }

    fn assemble(
        id: Uuid,
        config: RaffleConfig,
        round: Round,
        oracle: Arc<dyn RandomnessOracle>,
        payouts: Arc<dyn PayoutSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            config,
            oracle,
            payouts,
            clock,
            published: RwLock::new(round.summary()),
            round: Mutex::new(round),
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RaffleConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaffleEvent> {
        self.events.subscribe()
    }

    /// Buys one entry into the current round for `participant`.
    pub async fn enter(&self, participant: ParticipantId, paid: Amount) -> Result<()> {
        let mut round = self.round.lock().await;

        if let Err(e) = round.enter(
            participant.clone(),
            paid,
            self.config.entrance_fee,
            self.clock.now(),
        ) {
            tracing::debug!("Rejected entry from {}: {}", participant, e);
            return Err(e);
        }
        self.publish(&round);

        tracing::info!(
            "{} entered round {} with {} wei (pot {} wei, {} players)",
            participant,
            round.round_number(),
            paid,
            round.ledger().balance(),
            round.ledger().len()
        );
        self.emit(RaffleEvent::Entered {
            round_number: round.round_number(),
            participant,
            amount: paid,
        });
        Ok(())
    }

    /// Read-only automation check. Never waits on a mutating operation.
    pub fn check_upkeep(&self, _check_data: &[u8]) -> UpkeepCheck {
        let diagnostic = self
            .published
            .read()
            .upkeep_diagnostic(self.clock.now(), self.config.interval);
        UpkeepCheck::from_diagnostic(diagnostic)
    }

    /// Closes the round and requests a draw, if the upkeep conditions hold now.
    pub async fn perform_upkeep(&self, perform_data: &[u8]) -> Result<RequestId> {
        let mut round = self.round.lock().await;

        let diagnostic = round.upkeep_diagnostic(self.clock.now(), self.config.interval);
        if !diagnostic.is_ready() {
            tracing::debug!("Upkeep not needed: {:?}", diagnostic);
            return Err(RaffleError::UpkeepNotNeeded {
                balance: round.ledger().balance(),
                players: round.ledger().len(),
                state: round.state(),
            });
        }

        tracing::debug!("Performing upkeep ({} bytes of perform data)", perform_data.len());

        let request = RandomnessRequest::new(self.id, round.round_number(), &self.config.oracle);
        let request_id = match self.oracle.request_random_words(request).await {
            Ok(request_id) => request_id,
            Err(e) => {
                tracing::warn!(
                    "Randomness request for round {} failed, round stays open: {}",
                    round.round_number(),
                    e
                );
                return Err(match e {
                    RaffleError::OracleUnavailable(_) => e,
                    other => RaffleError::oracle_unavailable(other.to_string()),
                });
            }
        };

        round.begin_calculating(request_id);
        self.publish(&round);

        tracing::info!(
            "Round {} closed with {} players, requested winner: request {}",
            round.round_number(),
            round.ledger().len(),
            request_id
        );
        self.emit(RaffleEvent::RequestedWinner {
            round_number: round.round_number(),
            request_id,
        });
        Ok(request_id)
    }

    /// Re-attempts a payout that failed, paying the winner already drawn.
    pub async fn retry_payout(&self) -> Result<Settlement> {
        let mut round = self.round.lock().await;

        let (Some(request_id), Some(winner_index)) =
            (round.pending_request(), round.locked_winner())
        else {
            return Err(RaffleError::invalid_state(
                "No failed payout awaiting retry",
            ));
        };

        tracing::info!(
            "Retrying payout for round {} (request {})",
            round.round_number(),
            request_id
        );
        self.settle(&mut round, request_id, winner_index).await
    }

    async fn settle(
        &self,
        round: &mut Round,
        request_id: RequestId,
        winner_index: usize,
    ) -> Result<Settlement> {
        let winner = round
            .ledger()
            .participant(winner_index)
            .cloned()
            .ok_or(RaffleError::PlayerIndexOutOfRange(winner_index))?;
        let payout = round.ledger().balance();

        if let Err(e) = self.payouts.transfer(&winner, payout).await {
            round.lock_winner(winner_index);
            self.publish(round);

            tracing::error!(
                "Payout of {} wei to {} for round {} failed, pot held for retry: {}",
                payout,
                winner,
                round.round_number(),
                e
            );
            return Err(match e {
                RaffleError::TransferFailed(_) => e,
                other => RaffleError::transfer_failed(other.to_string()),
            });
        }

        let settlement = round.finish_settlement(winner_index, self.clock.now())?;
        self.publish(round);
        self.oracle.acknowledge(request_id);

        tracing::info!(
            "Round {} settled: {} won {} wei ({} entrants, request {})",
            settlement.round_number,
            settlement.winner,
            settlement.payout,
            settlement.entrants,
            request_id
        );
        self.emit(RaffleEvent::WinnerPicked {
            round_number: settlement.round_number,
            winner: settlement.winner.clone(),
            payout: settlement.payout,
            timestamp: settlement.settled_at,
        });
        Ok(settlement)
    }

    fn publish(&self, round: &Round) {
        let summary = round.summary();
        // the replaced summary drops after the write guard is released
        let _previous = std::mem::replace(&mut *self.published.write(), summary);
    }

    fn emit(&self, event: RaffleEvent) {
        // no listeners is fine
        let _ = self.events.send(event);
    }

    pub fn state(&self) -> RoundState {
        self.published.read().state
    }

    pub fn entrance_fee(&self) -> Amount {
        self.config.entrance_fee
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn num_words(&self) -> u32 {
        self.config.oracle.num_words
    }

    pub fn request_confirmations(&self) -> u16 {
        self.config.oracle.request_confirmations
    }

    pub fn number_of_players(&self) -> usize {
        self.published.read().players
    }

    /// Entrant at `index` in the current round. Waits for any in-flight mutation.
    pub async fn player(&self, index: usize) -> Result<ParticipantId> {
        self.round
            .lock()
            .await
            .ledger()
            .participant(index)
            .cloned()
            .ok_or(RaffleError::PlayerIndexOutOfRange(index))
    }

    pub fn pot_balance(&self) -> Amount {
        self.published.read().balance
    }

    pub fn recent_winner(&self) -> Option<ParticipantId> {
        self.published.read().recent_winner.clone()
    }

    pub fn last_settled_at(&self) -> DateTime<Utc> {
        self.published.read().last_settled_at
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.published.read().pending_request
    }

    pub fn round_number(&self) -> u64 {
        self.published.read().round_number
    }

    pub fn info(&self) -> RaffleInfo {
        let summary = self.published.read().clone();
        RaffleInfo {
            id: self.id,
            network: self.config.network.to_string(),
            state: summary.state,
            round_number: summary.round_number,
            entrance_fee: self.config.entrance_fee,
            interval_secs: self.config.interval.as_secs(),
            players: summary.players,
            pot_balance: summary.balance,
            recent_winner: summary.recent_winner,
            last_settled_at: summary.last_settled_at,
            pending_request: summary.pending_request,
            payout_retry_pending: summary.payout_retry_pending,
        }
    }

    /// Full copy of the current round. Waits for any in-flight mutation.
    pub async fn snapshot(&self) -> RaffleSnapshot {
        RaffleSnapshot {
            raffle_id: self.id,
            round: self.round.lock().await.clone(),
        }
    }

    pub async fn export_snapshot(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.snapshot().await)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, content).await?;

        tracing::info!("Exported raffle snapshot to {}", path.display());
        Ok(())
    }

    pub async fn load_snapshot(path: &Path) -> Result<RaffleSnapshot> {
        let content = tokio::fs::read_to_string(path).await?;
        let snapshot: RaffleSnapshot = serde_json::from_str(&content)?;
        snapshot.round.validate()?;
        Ok(snapshot)
    }
}

/// Persisted form of a raffle: its id and the full round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaffleSnapshot {
    pub raffle_id: Uuid,
    pub round: Round,
}

#[async_trait]
impl RandomnessConsumer for Raffle {
    async fn raw_fulfill_random_words(
        &self,
        caller: &str,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Settlement> {
        if caller != self.config.oracle.coordinator {
            tracing::warn!("Rejected randomness for request {} from {}", request_id, caller);
            return Err(RaffleError::Unauthorized(caller.to_string()));
        }

        let mut round = self.round.lock().await;

        let winner_index = match round.resolve_winner(request_id, words) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Rejected randomness for request {}: {}", request_id, e);
                return Err(e);
            }
        };

        if round.locked_winner().is_some() {
            tracing::info!(
                "Request {} redelivered, retrying payout to drawn winner #{}",
                request_id,
                winner_index
            );
        }

        self.settle(&mut round, request_id, winner_index).await
    }
}

/// Raffle status for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaffleInfo {
    pub id: Uuid,
    pub network: String,
    pub state: RoundState,
    pub round_number: u64,
    pub entrance_fee: Amount,
    pub interval_secs: u64,
    pub players: usize,
    pub pot_balance: Amount,
    pub recent_winner: Option<ParticipantId>,
    pub last_settled_at: DateTime<Utc>,
    pub pending_request: Option<RequestId>,
    pub payout_retry_pending: bool,
}
