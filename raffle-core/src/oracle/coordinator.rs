use super::{RandomnessConsumer, RandomnessOracle, RandomnessRequest};
use crate::config::LOCAL_COORDINATOR;
use crate::error::{ErrorClass, RaffleError, Result};
use crate::round::Settlement;
use crate::types::{RandomWord, RequestId};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-process coordinator for local networks.
///
/// Requests are parked until [`MockCoordinator::fulfill_random_words`] is
/// called, so the callback never runs inside the requesting operation.
pub struct MockCoordinator {
    id: String,
    seed: [u8; 32],
    state: Mutex<CoordinatorState>,
    available: AtomicBool,
}

#[derive(Default)]
struct CoordinatorState {
    next_request_id: u64,
    pending: BTreeMap<RequestId, RandomnessRequest>,
}

impl MockCoordinator {
    pub fn new() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::with_seed(LOCAL_COORDINATOR, seed)
    }

    pub fn with_seed(id: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            id: id.into(),
            seed,
            state: Mutex::new(CoordinatorState {
                next_request_id: 1,
                pending: BTreeMap::new(),
            }),
            available: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Simulates an outage: requests fail until set back to `true`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn pending_requests(&self) -> Vec<RequestId> {
        self.state.lock().pending.keys().copied().collect()
    }

    pub fn request(&self, request_id: RequestId) -> Option<RandomnessRequest> {
        self.state.lock().pending.get(&request_id).cloned()
    }

    /// Words the coordinator would deliver for `request_id`.
    pub fn derive_words(&self, request_id: RequestId, num_words: u32) -> Vec<RandomWord> {
        (0..num_words)
            .map(|index| {
                let mut hasher = Sha256::new();
                hasher.update(self.seed);
                hasher.update(request_id.0.to_be_bytes());
                hasher.update(index.to_be_bytes());
                RandomWord::from_bytes(hasher.finalize().into())
            })
            .collect()
    }

    pub async fn fulfill_random_words<C: RandomnessConsumer + ?Sized>(
        &self,
        request_id: RequestId,
        consumer: &C,
    ) -> Result<Settlement> {
        let request = self.take(request_id)?;
        let words = self.derive_words(request_id, request.num_words);
        self.deliver(request_id, request, consumer, &words).await
    }

    /// Delivers caller-chosen words instead of derived ones.
    pub async fn fulfill_random_words_with_override<C: RandomnessConsumer + ?Sized>(
        &self,
        request_id: RequestId,
        consumer: &C,
        words: &[RandomWord],
    ) -> Result<Settlement> {
        let request = self.take(request_id)?;
        self.deliver(request_id, request, consumer, words).await
    }

    fn take(&self, request_id: RequestId) -> Result<RandomnessRequest> {
        self.state
            .lock()
            .pending
            .remove(&request_id)
            .ok_or(RaffleError::UnknownRequest(request_id))
    }

    async fn deliver<C: RandomnessConsumer + ?Sized>(
        &self,
        request_id: RequestId,
        request: RandomnessRequest,
        consumer: &C,
        words: &[RandomWord],
    ) -> Result<Settlement> {
        match consumer
            .raw_fulfill_random_words(&self.id, request_id, words)
            .await
        {
            Ok(settlement) => {
                tracing::debug!("Coordinator fulfilled request {}", request_id);
                Ok(settlement)
            }
            Err(e) if e.class() == ErrorClass::PreconditionRace => {
                // the consumer no longer knows this request; keeping it would leak
                tracing::warn!("Consumer dropped request {}: {}", request_id, e);
                Err(e)
            }
            Err(e) => {
                // a failed callback leaves the request open, as a reverted fulfilment would
                tracing::warn!("Consumer rejected request {}: {}", request_id, e);
                self.state.lock().pending.insert(request_id, request);
                Err(e)
            }
        }
    }
}

impl Default for MockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RandomnessOracle for MockCoordinator {
    async fn request_random_words(&self, request: RandomnessRequest) -> Result<RequestId> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(RaffleError::oracle_unavailable(format!(
                "Coordinator {} is not accepting requests",
                self.id
            )));
        }

        let mut state = self.state.lock();
        let request_id = RequestId(state.next_request_id);
        state.next_request_id += 1;

        tracing::debug!(
            "Coordinator accepted request {} for round {} ({} words)",
            request_id,
            request.round_number,
            request.num_words
        );
        state.pending.insert(request_id, request);
        Ok(request_id)
    }

    fn acknowledge(&self, request_id: RequestId) {
        if self.state.lock().pending.remove(&request_id).is_some() {
            tracing::debug!("Coordinator closed request {} after settlement", request_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::OracleConfig;
    use crate::payout::InMemoryBank;
    use crate::{Raffle, RaffleConfig};
    use std::sync::Arc;
    use uuid::Uuid;

    fn oracle_config() -> OracleConfig {
        RaffleConfig::default().oracle
    }

    #[tokio::test]
    async fn test_request_ids_start_at_one() {
        let coordinator = MockCoordinator::with_seed(LOCAL_COORDINATOR, [7u8; 32]);
        let request = RandomnessRequest::new(Uuid::new_v4(), 1, &oracle_config());

        let first = coordinator.request_random_words(request.clone()).await.unwrap();
        let second = coordinator.request_random_words(request).await.unwrap();

        assert_eq!(first, RequestId(1));
        assert_eq!(second, RequestId(2));
        assert_eq!(coordinator.pending_requests(), vec![RequestId(1), RequestId(2)]);
    }

    #[tokio::test]
    async fn test_outage_rejects_requests() {
        let coordinator = MockCoordinator::new();
        coordinator.set_available(false);

        let request = RandomnessRequest::new(Uuid::new_v4(), 1, &oracle_config());
        let err = coordinator.request_random_words(request).await;
        assert!(matches!(err, Err(RaffleError::OracleUnavailable(_))));
        assert!(coordinator.pending_requests().is_empty());
    }

    #[tokio::test]
    async fn test_request_unknown_to_consumer_is_dropped() {
        let coordinator = Arc::new(MockCoordinator::with_seed(LOCAL_COORDINATOR, [5u8; 32]));
        let raffle = Raffle::new(
            RaffleConfig::default(),
            coordinator.clone(),
            Arc::new(InMemoryBank::new()),
            Arc::new(ManualClock::default()),
        )
        .unwrap();

        // issued for some other raffle; this one has nothing pending
        let request = RandomnessRequest::new(Uuid::new_v4(), 1, &oracle_config());
        let request_id = coordinator.request_random_words(request).await.unwrap();

        let err = coordinator.fulfill_random_words(request_id, &raffle).await;
        assert!(matches!(err, Err(RaffleError::UnknownRequest(_))));
        assert!(coordinator.pending_requests().is_empty());
    }

    #[tokio::test]
    async fn test_acknowledge_closes_request() {
        let coordinator = MockCoordinator::new();
        let request = RandomnessRequest::new(Uuid::new_v4(), 1, &oracle_config());
        let request_id = coordinator.request_random_words(request).await.unwrap();

        coordinator.acknowledge(request_id);
        assert!(coordinator.request(request_id).is_none());
        assert!(matches!(
            coordinator.take(request_id),
            Err(RaffleError::UnknownRequest(_))
        ));
    }

    #[test]
    fn test_derived_words_are_deterministic() {
        let a = MockCoordinator::with_seed(LOCAL_COORDINATOR, [1u8; 32]);
        let b = MockCoordinator::with_seed(LOCAL_COORDINATOR, [1u8; 32]);

        assert_eq!(a.derive_words(RequestId(1), 1), b.derive_words(RequestId(1), 1));
        assert_ne!(a.derive_words(RequestId(1), 1), a.derive_words(RequestId(2), 1));
        assert_eq!(a.derive_words(RequestId(1), 3).len(), 3);
    }
}
