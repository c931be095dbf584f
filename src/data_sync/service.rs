use crate::data_sync::{
    block_clock::{BlockClock, BlockHeightProvider},
    config::SyncConfig,
    graph::GraphRoundProvider,
    polling::PollingTask,
    rounds::{RefreshOutcome, RoundDataProvider, RoundSynchronizer},
    rpc::JsonRpcBlockProvider,
    websocket::TickerConnectionManager,
};
use crate::error::SyncError;
use crate::logic::countdown::round_countdown;
use crate::state::{AppState, PredictionsState};
use eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Main data synchronization service
///
/// Owns the ticker sockets, the block clock and the round synchronizer, all writing into one
/// shared [`AppState`].
pub struct DataSyncService {
    config: SyncConfig,
    state: AppState,
    ticker_manager: Arc<TickerConnectionManager>,
    block_clock: Arc<BlockClock>,
    round_sync: Arc<RoundSynchronizer>,

    // Task handles
    block_task: Option<PollingTask>,
    round_task: Option<PollingTask>,
}

impl DataSyncService {
    pub fn new(
        config: SyncConfig,
        block_provider: Arc<dyn BlockHeightProvider>,
        round_provider: Arc<dyn RoundDataProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let state = AppState::new(PredictionsState::new(
            config.interval_blocks,
            config.buffer_blocks,
            config.min_bet_amount.clone(),
        ));

        let ticker_manager = Arc::new(TickerConnectionManager::new(
            config.stream_base_url.clone(),
            config.ws_connection_timeout(),
            Arc::clone(&state.ticker),
        ));

        let block_clock = Arc::new(BlockClock::new(
            block_provider,
            Arc::clone(&state.block),
            config.block_poll_interval(),
        ));

        let round_sync = Arc::new(RoundSynchronizer::new(
            round_provider,
            Arc::clone(&state.predictions),
            config.rounds_to_fetch,
            config.treasury_fee_bps,
        ));

        Ok(Self {
            config,
            state,
            ticker_manager,
            block_clock,
            round_sync,
            block_task: None,
            round_task: None,
        })
    }

    /// Start the data synchronization service
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(eyre::eyre!("DataSyncService already started"));
        }
        info!("Starting DataSyncService");

        for symbol in &self.config.symbols {
            self.ticker_manager.connect(symbol).await?;
        }

        self.block_task = Some(Arc::clone(&self.block_clock).spawn());

        if let Err(e) = self.round_sync.initialize().await {
            warn!("Initial round load failed, will retry on next refresh: {}", e);
        }
        self.round_task = Some(Arc::clone(&self.round_sync).spawn(self.config.round_refresh_interval()));

        info!("DataSyncService started successfully");
        Ok(())
    }

    /// Stop the data synchronization service
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping DataSyncService");

        if let Some(mut task) = self.block_task.take() {
            task.stop().await;
        }

        if let Some(mut task) = self.round_task.take() {
            task.stop().await;
        }

        self.ticker_manager.shutdown().await;

        info!("DataSyncService stopped");
        Ok(())
    }

    /// Poll the block height and refresh rounds once, outside the periodic tasks.
    ///
    /// Unlike the background loops, failures are returned to the caller. The stores are left
    /// untouched by whichever step failed.
    pub async fn sync_now(&self) -> Result<RefreshOutcome, SyncError> {
        let block_number = self.block_clock.tick().await?;
        let outcome = self.round_sync.refresh().await?;
        info!(block_number, current_epoch = outcome.current_epoch, "Manual sync complete");
        Ok(outcome)
    }

    pub fn is_running(&self) -> bool {
        self.block_task.as_ref().is_some_and(PollingTask::is_running)
            || self.round_task.as_ref().is_some_and(PollingTask::is_running)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn ticker_manager(&self) -> &Arc<TickerConnectionManager> {
        &self.ticker_manager
    }

    pub fn round_synchronizer(&self) -> &Arc<RoundSynchronizer> {
        &self.round_sync
    }

    /// Seconds until the round `intervals_ahead` after the live one starts.
    pub async fn next_round_countdown(&self, intervals_ahead: u64) -> i64 {
        let predictions = self.state.predictions.snapshot().await;
        round_countdown(
            &predictions,
            self.state.block.current_block(),
            self.config.seconds_per_block,
            intervals_ahead,
        )
    }

    pub fn get_config(&self) -> &SyncConfig {
        &self.config
    }
}

impl Drop for DataSyncService {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("DataSyncService dropped while running, tasks will be aborted");
        }
    }
}

/// Builder for DataSyncService to make creation more ergonomic
#[derive(Default)]
pub struct DataSyncServiceBuilder {
    config: Option<SyncConfig>,
    block_provider: Option<Arc<dyn BlockHeightProvider>>,
    round_provider: Option<Arc<dyn RoundDataProvider>>,
}

impl DataSyncServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_block_provider(mut self, provider: Arc<dyn BlockHeightProvider>) -> Self {
        self.block_provider = Some(provider);
        self
    }

    pub fn with_round_provider(mut self, provider: Arc<dyn RoundDataProvider>) -> Self {
        self.round_provider = Some(provider);
        self
    }

    pub fn build(self) -> Result<DataSyncService> {
        let config = match self.config {
            Some(config) => config,
            None => SyncConfig::from_env()?,
        };

        let block_provider = match self.block_provider {
            Some(provider) => provider,
            None => Arc::new(JsonRpcBlockProvider::new(config.rpc_http_url.clone(), config.http_timeout())?),
        };

        let round_provider = match self.round_provider {
            Some(provider) => provider,
            None => Arc::new(GraphRoundProvider::new(config.graph_api_url.clone(), config.http_timeout())?),
        };

        DataSyncService::new(config, block_provider, round_provider)
    }
}
