use crate::types::{Amount, RequestId};
use crate::RoundState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RaffleError>;

#[derive(Error, Debug)]
pub enum RaffleError {
    #[error("Insufficient payment: need {required} wei, paid {paid} wei")]
    InsufficientPayment { required: Amount, paid: Amount },

    #[error("Round is not open for entries")]
    RoundNotOpen,

    #[error("Upkeep not needed: balance {balance} wei, {players} players, state {state:?}")]
    UpkeepNotNeeded {
        balance: Amount,
        players: usize,
        state: RoundState,
    },

    #[error("Unknown randomness request: {0}")]
    UnknownRequest(RequestId),

    #[error("Unauthorized caller: {0}")]
    Unauthorized(String),

    #[error("Randomness response for request {0} carried no words")]
    MissingRandomWords(RequestId),

    #[error("Player index out of range: {0}")]
    PlayerIndexOutOfRange(usize),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Invalid raffle state: {0}")]
    InvalidState(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Recovery class of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected input; retry with corrected arguments.
    Input,
    /// The round moved on; re-check before retrying.
    PreconditionRace,
    /// An external collaborator failed; the round is left continuable.
    Infrastructure,
    Internal,
}

impl RaffleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn oracle_unavailable(msg: impl Into<String>) -> Self {
        Self::OracleUnavailable(msg.into())
    }

    pub fn transfer_failed(msg: impl Into<String>) -> Self {
        Self::TransferFailed(msg.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InsufficientPayment { .. }
            | Self::RoundNotOpen
            | Self::MissingRandomWords(_)
            | Self::PlayerIndexOutOfRange(_)
            | Self::Config(_) => ErrorClass::Input,
            Self::UpkeepNotNeeded { .. }
            | Self::UnknownRequest(_)
            | Self::Unauthorized(_)
            | Self::InvalidState(_) => ErrorClass::PreconditionRace,
            Self::OracleUnavailable(_) | Self::TransferFailed(_) | Self::Io(_) => {
                ErrorClass::Infrastructure
            }
            Self::Serialization(_) | Self::Internal(_) => ErrorClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let err = RaffleError::InsufficientPayment {
            required: Amount::from_wei(10),
            paid: Amount::from_wei(9),
        };
        assert_eq!(err.class(), ErrorClass::Input);
        assert_eq!(
            RaffleError::UnknownRequest(RequestId(7)).class(),
            ErrorClass::PreconditionRace
        );
        assert_eq!(
            RaffleError::transfer_failed("bounced").class(),
            ErrorClass::Infrastructure
        );
    }

    #[test]
    fn test_upkeep_not_needed_message() {
        let err = RaffleError::UpkeepNotNeeded {
            balance: Amount::ZERO,
            players: 0,
            state: RoundState::Open,
        };
        assert_eq!(
            err.to_string(),
            "Upkeep not needed: balance 0 wei, 0 players, state Open"
        );
    }
}
