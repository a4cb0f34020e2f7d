//! Self-operating lottery
//!
//! Participants pay a fixed entry fee into the current round. Once the
//! configured interval has passed with at least one paid entry, an automation
//! caller closes the round and requests a random word from an oracle; the
//! oracle's callback picks the winner, pays the pot and reopens the round.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod keeper;
pub mod oracle;
pub mod payout;
pub mod raffle;
pub mod round;
pub mod types;
pub mod upkeep;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Network, OracleConfig, RaffleConfig};
pub use error::{ErrorClass, RaffleError, Result};
pub use events::RaffleEvent;
pub use keeper::{Keeper, KeeperOutcome};
pub use oracle::{MockCoordinator, RandomnessConsumer, RandomnessOracle, RandomnessRequest};
pub use payout::{InMemoryBank, PayoutSink};
pub use raffle::{Raffle, RaffleInfo, RaffleSnapshot};
pub use round::{Entry, PotLedger, Round, RoundState, RoundSummary, Settlement};
pub use types::{Amount, ParticipantId, RandomWord, RequestId};
pub use upkeep::{UpkeepCheck, UpkeepDiagnostic};

use std::sync::Arc;

/// Raffle wired to a local mock coordinator, an in-memory bank and wall time.
pub fn create_local_raffle(
    config: RaffleConfig,
) -> Result<(Arc<Raffle>, Arc<MockCoordinator>, Arc<InMemoryBank>)> {
    let coordinator = Arc::new(MockCoordinator::with_seed(
        config.oracle.coordinator.clone(),
        rand::random(),
    ));
    let bank = Arc::new(InMemoryBank::new());
    let raffle = Raffle::new(config, coordinator.clone(), bank.clone(), Arc::new(SystemClock))?;
    Ok((Arc::new(raffle), coordinator, bank))
}
