use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockState {
    pub current_block: u64,
    pub initial_block: u64,
}

/// Current chain height, written by the block clock.
///
/// Backed by a watch channel so consumers can either read the latest value or await changes.
#[derive(Debug)]
pub struct BlockStore {
    state: watch::Sender<BlockState>,
}

impl Default for BlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(BlockState::default());
        Self { state }
    }

    /// Publish a height. Returns false when the value was not applied (no change or a regression).
    pub fn set_block(&self, block_number: u64) -> bool {
        self.state.send_if_modified(|state| {
            if state.initial_block == 0 {
                state.initial_block = block_number;
            }
            if block_number <= state.current_block {
                if block_number < state.current_block {
                    debug!(current = state.current_block, received = block_number, "Ignoring regressed block height");
                }
                return false;
            }
            state.current_block = block_number;
            true
        })
    }

    pub fn snapshot(&self) -> BlockState {
        *self.state.borrow()
    }

    pub fn current_block(&self) -> u64 {
        self.state.borrow().current_block
    }

    pub fn initial_block(&self) -> u64 {
        self.state.borrow().initial_block
    }

    pub fn subscribe(&self) -> watch::Receiver<BlockState> {
        self.state.subscribe()
    }
}
