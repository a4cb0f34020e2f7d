//! Consumer side of the randomness oracle protocol.
//!
//! A request goes out from `perform_upkeep`; the answer arrives later, out of
//! band, through [`RandomnessConsumer::raw_fulfill_random_words`]. The two are
//! tied together only by the [`RequestId`].

pub mod coordinator;

pub use coordinator::MockCoordinator;

use crate::config::OracleConfig;
use crate::error::Result;
use crate::round::Settlement;
use crate::types::{RandomWord, RequestId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything the oracle needs to serve one draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub raffle_id: Uuid,
    pub round_number: u64,
    pub key_hash: String,
    pub subscription_id: u64,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

impl RandomnessRequest {
    pub fn new(raffle_id: Uuid, round_number: u64, config: &OracleConfig) -> Self {
        Self {
            raffle_id,
            round_number,
            key_hash: config.key_hash.clone(),
            subscription_id: config.subscription_id,
            request_confirmations: config.request_confirmations,
            callback_gas_limit: config.callback_gas_limit,
            num_words: config.num_words,
        }
    }
}

/// Outbound half: an oracle that accepts randomness requests.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    /// Submits a request; fails with `OracleUnavailable` when it cannot be taken.
    async fn request_random_words(&self, request: RandomnessRequest) -> Result<RequestId>;

    /// Called once the consumer has settled `request_id` and will never accept it again.
    fn acknowledge(&self, _request_id: RequestId) {}
}

/// Inbound half: something the oracle calls back into.
#[async_trait]
pub trait RandomnessConsumer: Send + Sync {
    async fn raw_fulfill_random_words(
        &self,
        caller: &str,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Settlement>;
}
