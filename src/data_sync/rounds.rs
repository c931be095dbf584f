use crate::data_sync::polling::PollingTask;
use crate::error::FetchError;
use crate::logic::rewards::apply_rewards;
use crate::state::{PredictionsStore, Round};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketData {
    pub current_epoch: u64,
    pub paused: bool,
}

/// Read-only source of round records keyed by epoch.
#[async_trait]
pub trait RoundDataProvider: Send + Sync {
    async fn fetch_market(&self) -> Result<MarketData, FetchError>;

    /// Most recent `first` rounds at or below `up_to_epoch`, newest first.
    async fn fetch_latest_rounds(&self, first: usize, up_to_epoch: u64) -> Result<Vec<Round>, FetchError>;

    async fn fetch_rounds(&self, epochs: &[u64]) -> Result<Vec<Round>, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub current_epoch: u64,
    pub fetched: usize,
    pub merged: usize,
}

/// Keeps the shared round map in step with a [`RoundDataProvider`].
///
/// Every refresh fetches first and only then writes, so a failed fetch leaves the store
/// exactly as it was.
pub struct RoundSynchronizer {
    provider: Arc<dyn RoundDataProvider>,
    store: Arc<PredictionsStore>,
    rounds_to_fetch: usize,
    treasury_fee_bps: u64,
}

impl RoundSynchronizer {
    pub fn new(
        provider: Arc<dyn RoundDataProvider>,
        store: Arc<PredictionsStore>,
        rounds_to_fetch: usize,
        treasury_fee_bps: u64,
    ) -> Self {
        Self {
            provider,
            store,
            rounds_to_fetch,
            treasury_fee_bps,
        }
    }

    fn prepare(&self, mut rounds: Vec<Round>) -> Vec<Round> {
        for round in rounds.iter_mut() {
            apply_rewards(round, self.treasury_fee_bps);
        }
        rounds
    }

    /// Pull market status and the latest rounds, then merge them.
    pub async fn refresh(&self) -> Result<RefreshOutcome, FetchError> {
        let market = self.provider.fetch_market().await?;
        let rounds = self
            .provider
            .fetch_latest_rounds(self.rounds_to_fetch, market.current_epoch)
            .await?;
        let fetched = rounds.len();

        let merged = self
            .store
            .apply_refresh(self.prepare(rounds), market.current_epoch, market.paused)
            .await;

        debug!(
            current_epoch = market.current_epoch,
            fetched, merged, "Round data refreshed"
        );
        Ok(RefreshOutcome {
            current_epoch: market.current_epoch,
            fetched,
            merged,
        })
    }

    /// Refresh only the given epochs; `currentEpoch` is left alone.
    pub async fn refresh_epochs(&self, epochs: &[u64]) -> Result<usize, FetchError> {
        let rounds = self.provider.fetch_rounds(epochs).await?;
        Ok(self.store.merge_rounds(self.prepare(rounds)).await)
    }

    /// First load. On failure the store stays in its initial state and the periodic refresh retries.
    pub async fn initialize(&self) -> Result<RefreshOutcome, FetchError> {
        let outcome = self.refresh().await?;
        info!(
            "Predictions initialized at epoch {} with {} rounds",
            outcome.current_epoch, outcome.merged
        );
        Ok(outcome)
    }

    pub fn spawn(self: Arc<Self>, period: Duration) -> PollingTask {
        PollingTask::spawn("round-sync", period, move || {
            let synchronizer = Arc::clone(&self);
            async move {
                if let Err(e) = synchronizer.refresh().await {
                    warn!("Round refresh failed, keeping previous rounds: {}", e);
                }
            }
        })
    }

    pub fn store(&self) -> &Arc<PredictionsStore> {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::state::{PredictionStatus, PredictionsState, RoundStatus};
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory provider; flip `failing` to simulate an unreachable source.
    pub(crate) struct MockRoundProvider {
        pub market: Mutex<MarketData>,
        pub rounds: Mutex<BTreeMap<u64, Round>>,
        pub failing: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl MockRoundProvider {
        pub(crate) fn new(current_epoch: u64, rounds: Vec<Round>) -> Self {
            Self {
                market: Mutex::new(MarketData { current_epoch, paused: false }),
                rounds: Mutex::new(rounds.into_iter().map(|r| (r.epoch, r)).collect()),
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn check(&self) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(FetchError::Graph("provider unavailable".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RoundDataProvider for MockRoundProvider {
        async fn fetch_market(&self) -> Result<MarketData, FetchError> {
            self.check()?;
            Ok(*self.market.lock().unwrap())
        }

        async fn fetch_latest_rounds(&self, first: usize, up_to_epoch: u64) -> Result<Vec<Round>, FetchError> {
            self.check()?;
            let rounds = self.rounds.lock().unwrap();
            Ok(rounds.range(..=up_to_epoch).rev().take(first).map(|(_, round)| round.clone()).collect())
        }

        async fn fetch_rounds(&self, epochs: &[u64]) -> Result<Vec<Round>, FetchError> {
            self.check()?;
            let rounds = self.rounds.lock().unwrap();
            Ok(epochs.iter().filter_map(|epoch| rounds.get(epoch).cloned()).collect())
        }
    }

    fn closed_round(epoch: u64) -> Round {
        let mut round = Round::new(epoch, epoch * 100);
        round.lock_price = Some(300.0);
        round.close_price = Some(305.0);
        round.oracle_called = true;
        round.total_amount = 10.0;
        round.bull_amount = 7.0;
        round.bear_amount = 3.0;
        round
    }

    fn synchronizer(provider: Arc<MockRoundProvider>) -> RoundSynchronizer {
        let store = Arc::new(PredictionsStore::new(PredictionsState::new(100, 20, "0".to_string())));
        RoundSynchronizer::new(provider, store, 5, 300)
    }

    #[tokio::test]
    async fn test_refresh_populates_store() {
        let provider = Arc::new(MockRoundProvider::new(5, vec![closed_round(3), closed_round(4), Round::new(5, 500)]));
        let sync = synchronizer(Arc::clone(&provider));

        let outcome = sync.initialize().await.unwrap();
        assert_eq!(outcome, RefreshOutcome { current_epoch: 5, fetched: 3, merged: 3 });

        let state = sync.store().snapshot().await;
        assert_eq!(state.status, PredictionStatus::Live);
        assert_eq!(state.current_epoch, 5);
        assert_eq!(state.current_round_start_block, 500);
        assert_eq!(state.rounds[&4].reward_base_cal_amount, 7.0);
        assert!((state.rounds[&4].reward_amount - 9.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_refresh_skips_rounds_past_market_epoch() {
        let provider = Arc::new(MockRoundProvider::new(5, vec![closed_round(4), Round::new(5, 500), Round::new(6, 600)]));
        let sync = synchronizer(Arc::clone(&provider));

        let outcome = sync.refresh().await.unwrap();
        assert_eq!(outcome.fetched, 2);
        assert!(sync.store().round(6).await.is_none());
        assert_eq!(sync.store().current_round().await.unwrap().epoch, 5);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_rounds() {
        let provider = Arc::new(MockRoundProvider::new(5, vec![closed_round(4), Round::new(5, 500)]));
        let sync = synchronizer(Arc::clone(&provider));
        sync.refresh().await.unwrap();
        let before = sync.store().snapshot().await;

        provider.failing.store(true, Ordering::SeqCst);
        assert!(sync.refresh().await.is_err());
        assert!(sync.refresh_epochs(&[4]).await.is_err());

        assert_eq!(sync.store().snapshot().await, before);
    }

    #[tokio::test]
    async fn test_refresh_epoch_does_not_touch_others() {
        let provider = Arc::new(MockRoundProvider::new(5, vec![closed_round(4), Round::new(5, 500)]));
        let sync = synchronizer(Arc::clone(&provider));
        sync.refresh().await.unwrap();
        let round4 = sync.store().round(4).await.unwrap();

        {
            let mut rounds = provider.rounds.lock().unwrap();
            let live = rounds.get_mut(&5).unwrap();
            live.lock_price = Some(301.0);
            live.total_amount = 4.0;
        }
        assert_eq!(sync.refresh_epochs(&[5]).await.unwrap(), 1);

        assert_eq!(sync.store().round(4).await.unwrap(), round4);
        assert_eq!(sync.store().round(5).await.unwrap().total_amount, 4.0);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes() {
        let provider = Arc::new(MockRoundProvider::new(5, (1..=5).map(closed_round).collect()));
        let sync = Arc::new(synchronizer(Arc::clone(&provider)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sync = Arc::clone(&sync);
                tokio::spawn(async move { sync.refresh().await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let state = sync.store().snapshot().await;
        assert_eq!(state.rounds.len(), 5);
        assert_eq!(state.current_epoch, 5);
    }

    /// First market fetch is slow and reports an older epoch than every later one.
    struct LaggingMarketProvider {
        calls: AtomicUsize,
        rounds: Vec<Round>,
    }

    #[async_trait]
    impl RoundDataProvider for LaggingMarketProvider {
        async fn fetch_market(&self) -> Result<MarketData, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                return Ok(MarketData { current_epoch: 5, paused: false });
            }
            Ok(MarketData { current_epoch: 6, paused: false })
        }

        async fn fetch_latest_rounds(&self, first: usize, up_to_epoch: u64) -> Result<Vec<Round>, FetchError> {
            Ok(self
                .rounds
                .iter()
                .rev()
                .filter(|round| round.epoch <= up_to_epoch)
                .take(first)
                .cloned()
                .collect())
        }

        async fn fetch_rounds(&self, epochs: &[u64]) -> Result<Vec<Round>, FetchError> {
            Ok(self.rounds.iter().filter(|round| epochs.contains(&round.epoch)).cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_slow_refresh_does_not_rewind_epoch() {
        let provider = Arc::new(LaggingMarketProvider {
            calls: AtomicUsize::new(0),
            rounds: vec![closed_round(4), closed_round(5), Round::new(6, 600)],
        });
        let store = Arc::new(PredictionsStore::new(PredictionsState::new(100, 20, "0".to_string())));
        let sync = Arc::new(RoundSynchronizer::new(provider, Arc::clone(&store), 5, 300));

        let slow = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh().await }
        });
        // let the slow refresh take the first market call
        tokio::time::sleep(Duration::from_millis(20)).await;

        sync.refresh().await.unwrap();
        assert_eq!(store.current_epoch().await, 6);

        slow.await.unwrap().unwrap();
        let state = store.snapshot().await;
        assert_eq!(state.current_epoch, 6);
        assert_eq!(state.current_round_start_block, 600);
        assert_eq!(state.round_status(6), RoundStatus::Live);
        assert_eq!(state.round_status(5), RoundStatus::Expired);
    }

    #[tokio::test]
    async fn test_periodic_refresh_recovers() {
        let provider = Arc::new(MockRoundProvider::new(2, vec![closed_round(1), Round::new(2, 200)]));
        provider.failing.store(true, Ordering::SeqCst);
        let sync = Arc::new(synchronizer(Arc::clone(&provider)));

        let mut task = Arc::clone(&sync).spawn(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(sync.store().snapshot().await.rounds.is_empty());

        provider.failing.store(false, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while sync.store().current_epoch().await != 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        task.stop().await;

        assert_eq!(sync.store().current_epoch().await, 2);
        assert_eq!(sync.store().snapshot().await.rounds.len(), 2);
    }
}
