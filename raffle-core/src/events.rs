use crate::types::{Amount, ParticipantId, RequestId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notifications for external listeners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaffleEvent {
    Entered {
        round_number: u64,
        participant: ParticipantId,
        amount: Amount,
    },
    /// The round closed and a draw was requested.
    RequestedWinner {
        round_number: u64,
        request_id: RequestId,
    },
    WinnerPicked {
        round_number: u64,
        winner: ParticipantId,
        payout: Amount,
        timestamp: DateTime<Utc>,
    },
}

impl RaffleEvent {
    pub fn round_number(&self) -> u64 {
        match self {
            RaffleEvent::Entered { round_number, .. }
            | RaffleEvent::RequestedWinner { round_number, .. }
            | RaffleEvent::WinnerPicked { round_number, .. } => *round_number,
        }
    }
}
