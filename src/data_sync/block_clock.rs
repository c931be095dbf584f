use crate::data_sync::polling::PollingTask;
use crate::error::FetchError;
use crate::state::BlockStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of the current chain height.
#[async_trait]
pub trait BlockHeightProvider: Send + Sync {
    async fn block_number(&self) -> Result<u64, FetchError>;
}

/// Polls a [`BlockHeightProvider`] and publishes the height into the [`BlockStore`].
pub struct BlockClock {
    provider: Arc<dyn BlockHeightProvider>,
    store: Arc<BlockStore>,
    poll_interval: Duration,
}

impl BlockClock {
    pub fn new(provider: Arc<dyn BlockHeightProvider>, store: Arc<BlockStore>, poll_interval: Duration) -> Self {
        Self {
            provider,
            store,
            poll_interval,
        }
    }

    /// One poll. On failure the stored height is left as it was.
    pub async fn tick(&self) -> Result<u64, FetchError> {
        let block_number = self.provider.block_number().await?;
        if self.store.set_block(block_number) {
            debug!("Block clock advanced to {}", block_number);
        }
        Ok(block_number)
    }

    /// Start polling. Failed fetches are logged and retried on the next tick.
    pub fn spawn(self: Arc<Self>) -> PollingTask {
        let period = self.poll_interval;
        PollingTask::spawn("block-clock", period, move || {
            let clock = Arc::clone(&self);
            async move {
                if let Err(e) = clock.tick().await {
                    warn!("Failed to fetch block number: {}", e);
                }
            }
        })
    }

    pub fn store(&self) -> &Arc<BlockStore> {
        &self.store
    }
}
