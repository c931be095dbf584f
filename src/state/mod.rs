/// Shared Application State
///
/// One instance per process, passed by reference to every component that reads or writes it.
/// Each store has a single writer:
///
/// - `ticker`: the ticker connection manager
/// - `block`: the block clock
/// - `predictions`: the round synchronizer

pub mod block;
pub mod predictions;
pub mod ticker;

pub use block::{BlockState, BlockStore};
pub use predictions::{
    BetPosition, PredictionStatus, PredictionsState, PredictionsStore, Round, RoundPhase, RoundStatus,
};
pub use ticker::{TickerEntry, TickerStore};

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppState {
    pub ticker: Arc<TickerStore>,
    pub block: Arc<BlockStore>,
    pub predictions: Arc<PredictionsStore>,
}

impl AppState {
    pub fn new(predictions: PredictionsState) -> Self {
        Self {
            ticker: Arc::new(TickerStore::new()),
            block: Arc::new(BlockStore::new()),
            predictions: Arc::new(PredictionsStore::new(predictions)),
        }
    }
}
