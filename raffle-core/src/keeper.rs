use crate::error::RaffleError;
use crate::raffle::Raffle;
use crate::types::RequestId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What a single automation poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeeperOutcome {
    /// Check said no upkeep needed.
    Idle,
    Performed(RequestId),
    /// Check passed but the round changed before the commit.
    LostRace,
    Failed(String),
}

/// Periodic automation caller: polls the check and commits when it passes.
pub struct Keeper {
    raffle: Arc<Raffle>,
    poll_interval: Duration,
}

impl Keeper {
    pub fn new(raffle: Arc<Raffle>, poll_interval: Duration) -> Self {
        Self {
            raffle,
            poll_interval,
        }
    }

    pub async fn poll_once(&self) -> KeeperOutcome {
        let check = self.raffle.check_upkeep(&[]);
        if !check.upkeep_needed {
            return KeeperOutcome::Idle;
        }

        match self.raffle.perform_upkeep(&check.perform_data).await {
            Ok(request_id) => KeeperOutcome::Performed(request_id),
            Err(RaffleError::UpkeepNotNeeded { .. }) => {
                tracing::debug!("Upkeep no longer needed at commit time");
                KeeperOutcome::LostRace
            }
            Err(e) => {
                tracing::warn!("Upkeep failed: {}", e);
                KeeperOutcome::Failed(e.to_string())
            }
        }
    }

    /// Polls until `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            "Keeper started for raffle {} (poll every {:?})",
            self.raffle.id(),
            self.poll_interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let KeeperOutcome::Performed(request_id) = self.poll_once().await {
                        tracing::info!("Keeper closed round, request {}", request_id);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Keeper stopped for raffle {}", self.raffle.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{RaffleConfig, LOCAL_COORDINATOR};
    use crate::oracle::MockCoordinator;
    use crate::payout::InMemoryBank;
    use crate::round::RoundState;
    use crate::types::Amount;
    use chrono::Duration as ChronoDuration;

    fn setup() -> (Arc<Raffle>, Arc<MockCoordinator>, Arc<ManualClock>) {
        let coordinator = Arc::new(MockCoordinator::with_seed(LOCAL_COORDINATOR, [3u8; 32]));
        let clock = Arc::new(ManualClock::default());
        let mut config = RaffleConfig::default();
        config.entrance_fee = Amount::from_wei(10);
        config.interval = Duration::from_secs(60);

        let raffle = Raffle::new(
            config,
            coordinator.clone(),
            Arc::new(InMemoryBank::new()),
            clock.clone(),
        )
        .unwrap();
        (Arc::new(raffle), coordinator, clock)
    }

    #[tokio::test]
    async fn test_poll_once_waits_for_conditions() {
        let (raffle, _coordinator, clock) = setup();
        let keeper = Keeper::new(raffle.clone(), Duration::from_millis(10));

        assert_eq!(keeper.poll_once().await, KeeperOutcome::Idle);

        raffle.enter("alice".into(), Amount::from_wei(10)).await.unwrap();
        assert_eq!(keeper.poll_once().await, KeeperOutcome::Idle);

        clock.advance(ChronoDuration::seconds(61));
        assert_eq!(
            keeper.poll_once().await,
            KeeperOutcome::Performed(RequestId(1))
        );
        assert_eq!(keeper.poll_once().await, KeeperOutcome::Idle);
    }

    #[tokio::test]
    async fn test_poll_once_reports_oracle_failure() {
        let (raffle, coordinator, clock) = setup();
        let keeper = Keeper::new(raffle.clone(), Duration::from_millis(10));

        raffle.enter("alice".into(), Amount::from_wei(10)).await.unwrap();
        clock.advance(ChronoDuration::seconds(61));
        coordinator.set_available(false);

        assert!(matches!(keeper.poll_once().await, KeeperOutcome::Failed(_)));
        assert_eq!(raffle.state(), RoundState::Open);
    }

    #[tokio::test]
    async fn test_run_closes_round_and_stops() {
        let (raffle, coordinator, clock) = setup();
        raffle.enter("alice".into(), Amount::from_wei(10)).await.unwrap();
        clock.advance(ChronoDuration::seconds(61));

        let (tx, rx) = watch::channel(false);
        let keeper = Keeper::new(raffle.clone(), Duration::from_millis(5));
        let handle = tokio::spawn(async move { keeper.run(rx).await });

        for _ in 0..100 {
            if raffle.state() == RoundState::Calculating {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(raffle.state(), RoundState::Calculating);
        assert_eq!(coordinator.pending_requests(), vec![RequestId(1)]);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
